// crates/sf_physics/src/lib.rs

//! SedFlow 河网更新引擎
//!
//! 模拟山区河网中的推移质与水流演进，按离散时间步推进。
//!
//! # 模块概览
//!
//! - [`grains`]: 按粒径分级与泥沙种类划分的体积向量
//! - [`strata`]: 地层柱与地层分选策略
//! - [`reach`]: 河段状态
//! - [`network`]: 河网图、边界与扫描顺序
//! - [`hydraulics`]: 流动阻力、河道几何与依赖参数
//! - [`capacity`]: 输沙能力策略与上游旁通
//! - [`modifiers`]: 变化率修正器及其四阶段协议
//! - [`flow`]: 水流与泥沙的变化率阶段
//! - [`simulation`]: 时间步驱动器
//!
//! # 每步流程
//!
//! 水流阶段 → 泥沙阶段 → 变化量计算、下传与应用 → 地层分选 → 推进时间。
//!
//! # 示例
//!
//! ```
//! use sf_physics::prelude::*;
//!
//! let reach = |id: i64, down: Option<i64>, z: f64| {
//!     let strata = LayerStack::new(vec![Grains::from_fractions(GrainKind::Normal, vec![0.1])])?;
//!     Ok::<_, SfError>(Reach::new(id, down, 100.0, z, strata).with_discharge(1.0))
//! };
//! let network = RiverNetwork::new(vec![reach(1, Some(2), 1.0)?, reach(2, None, 0.0)?])?;
//! let mut params = OverallParameters::with_diameters(vec![0.01])?;
//! params.end_time = 120.0;
//!
//! let mut sim = Simulation::new(
//!     params,
//!     network,
//!     FlowMethods::default(),
//!     vec![StrataSortingMethod::default(); 2],
//!     ChangeRateModifiers::default(),
//! )?;
//! sim.run_until_end()?;
//! assert!(sim.is_finished());
//! # Ok::<(), SfError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capacity;
pub mod flow;
pub mod grains;
pub mod hydraulics;
pub mod modifiers;
pub mod network;
pub mod parameters;
pub mod reach;
pub mod simulation;
pub mod strata;

// 重导出常用类型
pub use capacity::{BedloadCapacity, CapacityContext, CapacityMethod, TraversalMode};
pub use flow::{
    modify_change_rates, BedloadParams, BedloadTransport, FlowContext, FlowMethods, FlowProcess,
    UniformDischarge,
};
pub use grains::{GrainKind, Grains};
pub use hydraulics::{ChannelGeometry, EnergySlopeMethod, FlowResistance, HydraulicsMethods};
pub use modifiers::{
    ChangeRateModifier, ChangeRateModifiers, FlowCategory, ModifierContext, ModifierGroup,
    ModifierKind, ModifierParams, ModifierSlot,
};
pub use network::RiverNetwork;
pub use parameters::OverallParameters;
pub use reach::Reach;
pub use simulation::{Simulation, StepReport};
pub use strata::{LayerStack, StrataSorting, StrataSortingMethod, StrataSortingParams};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::capacity::{
        BedloadCapacity, CapacityMethod, FractionalExcessShear, HidingFunction,
        InitiationThreshold, TraversalMode, WilcockCrowe,
    };
    pub use crate::flow::{BedloadParams, FlowMethods};
    pub use crate::grains::{GrainKind, Grains};
    pub use crate::hydraulics::{
        ChannelGeometry, EnergySlopeMethod, FlowResistance, HydraulicsMethods,
    };
    pub use crate::modifiers::{
        ChangeRateModifiers, FlowCategory, InputSeries, InputTimeSeries, ModifierGroup,
        ModifierParams, RecirculateSediment, RecirculateWater, SlopeClamp,
    };
    pub use crate::network::RiverNetwork;
    pub use crate::parameters::OverallParameters;
    pub use crate::reach::Reach;
    pub use crate::simulation::{Simulation, StepReport};
    pub use crate::strata::{
        ConstantThresholdParams, LayerStack, StrataSorting, StrataSortingMethod,
        StrataSortingParams, ThresholdSortingParams, TwoLayerParams,
    };
    pub use sf_foundation::prelude::*;
}
