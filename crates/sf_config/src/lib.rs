// crates/sf_config/src/lib.rs

//! SedFlow Config Layer
//!
//! 配置层，提供模拟的声明式配置、JSON 读写以及配置与模拟之间的往返。
//!
//! # 模块概览
//!
//! - [`simulation_config`]: SimulationConfig 模拟配置
//! - [`error`]: 配置错误类型
//!
//! # 层级架构
//!
//! ```text
//! sf_config     ─> SimulationConfig (本层)
//! sf_physics    ─> Simulation, RiverNetwork, 策略与修正器
//! sf_foundation ─> SfError, ReachIndex
//! ```
//!
//! # 设计原则
//!
//! 1. **声明式**: 配置只描述输入，不持有运行状态
//! 2. **构造期失败**: 数值、拓扑与分选参数错误在 `build` 时报告
//! 3. **可往返**: `from_simulation` 导出的快照可再次 `build`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod simulation_config;

// 重导出核心类型
pub use error::ConfigError;
pub use simulation_config::{LayerConfig, ModifierGroupConfig, ReachConfig, SimulationConfig};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::ConfigError;
    pub use crate::simulation_config::{
        LayerConfig, ModifierGroupConfig, ReachConfig, SimulationConfig,
    };
}
