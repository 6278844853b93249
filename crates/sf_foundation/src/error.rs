// crates/sf_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `SfError` 枚举和 `SfResult` 类型别名，用于整个项目的错误处理。
//!
//! # 设计原则
//!
//! 1. **分类明确**: 配置错误、拓扑错误在构造期致命；数值边界情况不是错误
//! 2. **易用性**: 提供便捷的构造方法和 `ensure!` / `require!` 宏
//! 3. **可追溯**: 错误信息携带键名、取值和原因
//!
//! # 示例
//!
//! ```
//! use sf_foundation::error::{SfError, SfResult};
//!
//! fn check_increment(increment: f64) -> SfResult<()> {
//!     if increment <= 0.0 {
//!         return Err(SfError::invalid_config("increment", increment, "必须为正"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_increment(-1.0).is_err());
//! ```

use std::fmt::Display;
use thiserror::Error;

/// 统一结果类型
pub type SfResult<T> = Result<T, SfError>;

/// SedFlow 错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SfError {
    // ========================================================================
    // 配置错误
    // ========================================================================

    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },

    /// 配置值无效
    #[error("配置值无效: {key}={value}, 原因: {reason}")]
    InvalidConfig {
        /// 配置键名
        key: String,
        /// 配置值
        value: String,
        /// 无效原因说明
        reason: String,
    },

    /// 数据超出范围
    #[error("数据超出范围: {field}={value}, 期望范围=[{min}, {max}]")]
    OutOfRange {
        /// 字段名
        field: &'static str,
        /// 实际值
        value: f64,
        /// 最小允许值
        min: f64,
        /// 最大允许值
        max: f64,
    },

    // ========================================================================
    // 拓扑错误
    // ========================================================================

    /// 河网拓扑错误
    #[error("无效的河网拓扑: {message}")]
    Topology {
        /// 具体错误信息
        message: String,
    },

    // ========================================================================
    // 数据访问错误
    // ========================================================================

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别描述
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界（长度）
        len: usize,
    },

    /// 资源未找到
    #[error("资源未找到: {resource}")]
    NotFound {
        /// 资源名称
        resource: String,
    },

    // ========================================================================
    // 其他
    // ========================================================================

    /// 验证失败
    #[error("验证失败: {0}")]
    Validation(String),

    /// 内部错误
    #[error("内部错误: {message}")]
    Internal {
        /// 内部错误描述
        message: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl SfError {
    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 配置值无效
    pub fn invalid_config(
        key: impl Into<String>,
        value: impl Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// 数据超出范围
    pub fn out_of_range(field: &'static str, value: f64, min: f64, max: f64) -> Self {
        Self::OutOfRange {
            field,
            value,
            min,
            max,
        }
    }

    /// 拓扑错误
    pub fn topology(message: impl Into<String>) -> Self {
        Self::Topology {
            message: message.into(),
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 索引越界
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 资源未找到
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// 验证失败
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// 内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// 是否为构造期致命错误（配置或拓扑）
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. }
                | Self::InvalidConfig { .. }
                | Self::OutOfRange { .. }
                | Self::Topology { .. }
        )
    }

    // ========================================================================
    // 检查辅助
    // ========================================================================

    /// 检查数组大小
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> SfResult<()> {
        if expected != actual {
            return Err(Self::size_mismatch(name, expected, actual));
        }
        Ok(())
    }

    /// 检查索引
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> SfResult<()> {
        if index >= len {
            return Err(Self::index_out_of_bounds(index_type, index, len));
        }
        Ok(())
    }

    /// 检查闭区间
    pub fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> SfResult<()> {
        if !(value >= min && value <= max) {
            return Err(Self::out_of_range(field, value, min, max));
        }
        Ok(())
    }
}

// ========================================================================
// 宏
// ========================================================================

/// 条件不满足时返回错误
///
/// ```
/// use sf_foundation::{ensure, error::{SfError, SfResult}};
///
/// fn positive(x: f64) -> SfResult<f64> {
///     ensure!(x > 0.0, SfError::invalid_config("x", x, "必须为正"));
///     Ok(x)
/// }
/// assert!(positive(1.0).is_ok());
/// assert!(positive(0.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr $(,)?) => {
        if !($cond) {
            return Err(($err).into());
        }
    };
}

/// 取出 `Option` 中的值，为 `None` 时返回错误
///
/// ```
/// use sf_foundation::{require, error::{SfError, SfResult}};
///
/// fn first(v: &[f64]) -> SfResult<f64> {
///     let x = require!(v.first(), SfError::not_found("第一个元素"));
///     Ok(*x)
/// }
/// assert!(first(&[]).is_err());
/// ```
#[macro_export]
macro_rules! require {
    ($opt:expr, $err:expr $(,)?) => {
        match $opt {
            Some(value) => value,
            None => return Err(($err).into()),
        }
    };
}
