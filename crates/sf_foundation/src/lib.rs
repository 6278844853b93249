// crates/sf_foundation/src/lib.rs

//! SedFlow Foundation Layer
//!
//! 河网输沙引擎的基础层，提供整个项目共用的基础抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型与 `ensure!` / `require!` 宏
//! - [`index`]: 强类型 Arena 索引
//! - [`tolerance`]: 近零阈值
//! - [`validation`]: 构造期验证报告
//!
//! # 设计原则
//!
//! 1. **最少依赖**: 仅依赖 serde 和 thiserror
//! 2. **类型安全**: 编译期防止索引误用
//! 3. **构造期失败**: 配置与拓扑错误在构造时发现，运行时不再出现
//!
//! # 示例
//!
//! ```
//! use sf_foundation::prelude::*;
//!
//! let idx = ReachIndex::from_usize(0);
//! assert!(idx.is_valid());
//! let err: SfResult<()> = Err(SfError::config("缺少河段"));
//! assert!(err.is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod index;
pub mod tolerance;
pub mod validation;

// 重导出常用类型
pub use error::{SfError, SfResult};
pub use index::{Idx, ReachIndex};
pub use tolerance::{is_empty_volume, SEDIMENT_VOLUME_EPS, SUBSURFACE_VOLUME_EPS};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{SfError, SfResult};
    pub use crate::index::{reach, Idx, ReachIndex};
    pub use crate::tolerance::{is_empty_volume, SEDIMENT_VOLUME_EPS, SUBSURFACE_VOLUME_EPS};
    pub use crate::validation::{ValidationError, ValidationReport, ValidationWarning};
    pub use crate::{ensure, require};
}
