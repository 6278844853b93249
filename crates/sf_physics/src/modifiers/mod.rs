// crates/sf_physics/src/modifiers/mod.rs

//! 变化率修正器
//!
//! 修正器在主物理计算之外调整变化率或边界量（边界坡度约束、循环回流、
//! 强制时间序列）。每个修正器绑定一个流动类别，按四阶段协议参与每个时间步：
//!
//! 1. `input_modification`: 可选前置阶段，仅当修正器配置为"对其他修正器保证"时调用
//! 2. `modification_before_updates`: 主效果，每轮收敛循环对每个河段调用一次
//! 3. `further_iteration_necessary`: 本轮结束后是否需要再来一轮
//! 4. `final_modification`: 主计算之后的收尾阶段，与阶段 1 同受"保证"标志控制
//!
//! # 状态
//!
//! 修正器本身只保存构造参数；水位线、出口缓存、双代缓存等可变状态放在
//! 独立的状态记录中，由 [`Slot`] 与修正器并列持有，并通过参数显式传入。
//!
//! # 模块结构
//!
//! - `slope_clamp`: 边界河段床面坡度与水面坡度约束
//! - `recirculation`: 出口到入口的循环回流（水流与泥沙）
//! - `time_series`: 线性插值的输入时间序列
//! - `group`: 按流动类别组织的修正器组与编排

pub mod group;
pub mod recirculation;
pub mod slope_clamp;
pub mod time_series;

pub use group::{ChangeRateModifiers, ModifierGroup};
pub use recirculation::{
    RecirculateSediment, RecirculateWater, RecirculationState, RecirculationTarget,
};
pub use slope_clamp::{SlopeClamp, SlopeClampState};
pub use time_series::{InputSeries, InputTimeSeries, TimeSeriesState};

use crate::network::RiverNetwork;
use serde::{Deserialize, Serialize};
use sf_foundation::{ReachIndex, SfResult};
use std::fmt;

// ============================================================================
// 基本类型
// ============================================================================

/// 流动类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FlowCategory {
    /// 水流
    Water,
    /// 泥沙
    Sediment,
}

impl FlowCategory {
    /// 名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Water => "WaterFlowMethodsInGeneral",
            Self::Sediment => "SedimentFlowMethodsInGeneral",
        }
    }
}

impl fmt::Display for FlowCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 修正器种类（同一组内不得重复）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKind {
    /// 边界坡度约束
    SlopeClamp,
    /// 水流循环回流
    RecirculateWater,
    /// 泥沙循环回流
    RecirculateSediment,
    /// 输入时间序列
    InputTimeSeries,
}

/// 修正器调用上下文
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModifierContext {
    /// 已模拟时长 [s]，用于识别新时间步
    pub elapsed_seconds: f64,
    /// 当前收敛轮次（从 0 开始）
    pub round: usize,
}

impl ModifierContext {
    /// 创建上下文
    pub fn new(elapsed_seconds: f64, round: usize) -> Self {
        Self {
            elapsed_seconds,
            round,
        }
    }
}

// ============================================================================
// 修正器协议
// ============================================================================

/// 变化率修正器
pub trait ChangeRateModifier: fmt::Debug + Send + Sync {
    /// 独立的可变状态记录
    type State: fmt::Debug + Clone + Default + Send + Sync;

    /// 种类
    fn kind(&self) -> ModifierKind;

    /// 所属流动类别
    fn category(&self) -> FlowCategory;

    /// 是否对其他修正器保证（启用前置与收尾阶段）
    fn ensures_against_others(&self) -> bool;

    /// 前置阶段
    fn input_modification(
        &self,
        _state: &mut Self::State,
        _network: &mut RiverNetwork,
        _idx: ReachIndex,
        _ctx: &ModifierContext,
    ) -> SfResult<()> {
        Ok(())
    }

    /// 主效果
    fn modification_before_updates(
        &self,
        state: &mut Self::State,
        network: &mut RiverNetwork,
        idx: ReachIndex,
        ctx: &ModifierContext,
    ) -> SfResult<()>;

    /// 本轮结束后是否需要再来一轮
    fn further_iteration_necessary(&self, state: &Self::State, ctx: &ModifierContext) -> bool;

    /// 收尾阶段
    fn final_modification(
        &self,
        _state: &mut Self::State,
        _network: &mut RiverNetwork,
        _idx: ReachIndex,
        _ctx: &ModifierContext,
    ) -> SfResult<()> {
        Ok(())
    }
}

/// 修正器与其状态记录
#[derive(Debug, Clone)]
pub struct Slot<M: ChangeRateModifier> {
    /// 修正器
    pub modifier: M,
    /// 状态
    pub state: M::State,
}

impl<M: ChangeRateModifier> Slot<M> {
    /// 以初始状态创建
    pub fn new(modifier: M) -> Self {
        Self {
            modifier,
            state: M::State::default(),
        }
    }
}

// ============================================================================
// 封闭修正器集合
// ============================================================================

/// 修正器构造参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ModifierParams {
    /// 边界坡度约束
    AdjustSlopesAtMargins(SlopeClamp),
    /// 水流循环回流
    RecirculateWater(RecirculateWater),
    /// 泥沙循环回流
    RecirculateSediment(RecirculateSediment),
    /// 输入时间序列
    InputPropertyTimeSeries(InputTimeSeries),
}

/// 修正器槽位（封闭变体集合）
#[derive(Debug, Clone)]
pub enum ModifierSlot {
    /// 边界坡度约束
    SlopeClamp(Slot<SlopeClamp>),
    /// 水流循环回流
    RecirculateWater(Slot<RecirculateWater>),
    /// 泥沙循环回流
    RecirculateSediment(Slot<RecirculateSediment>),
    /// 输入时间序列
    TimeSeries(Slot<InputTimeSeries>),
}

macro_rules! dispatch {
    ($self:expr, $slot:ident => $body:expr) => {
        match $self {
            ModifierSlot::SlopeClamp($slot) => $body,
            ModifierSlot::RecirculateWater($slot) => $body,
            ModifierSlot::RecirculateSediment($slot) => $body,
            ModifierSlot::TimeSeries($slot) => $body,
        }
    };
}

impl ModifierSlot {
    /// 由参数构造，参数非法时失败
    pub fn from_params(params: &ModifierParams) -> SfResult<Self> {
        Ok(match params {
            ModifierParams::AdjustSlopesAtMargins(m) => {
                m.validate()?;
                Self::SlopeClamp(Slot::new(m.clone()))
            }
            ModifierParams::RecirculateWater(m) => {
                m.validate()?;
                Self::RecirculateWater(Slot::new(m.clone()))
            }
            ModifierParams::RecirculateSediment(m) => {
                m.validate()?;
                Self::RecirculateSediment(Slot::new(m.clone()))
            }
            ModifierParams::InputPropertyTimeSeries(m) => {
                m.validate()?;
                Self::TimeSeries(Slot::new(m.clone()))
            }
        })
    }

    /// 导出构造参数
    pub fn params(&self) -> ModifierParams {
        match self {
            Self::SlopeClamp(s) => ModifierParams::AdjustSlopesAtMargins(s.modifier.clone()),
            Self::RecirculateWater(s) => ModifierParams::RecirculateWater(s.modifier.clone()),
            Self::RecirculateSediment(s) => ModifierParams::RecirculateSediment(s.modifier.clone()),
            Self::TimeSeries(s) => ModifierParams::InputPropertyTimeSeries(s.modifier.clone()),
        }
    }

    /// 种类
    pub fn kind(&self) -> ModifierKind {
        dispatch!(self, s => s.modifier.kind())
    }

    /// 所属流动类别
    pub fn category(&self) -> FlowCategory {
        dispatch!(self, s => s.modifier.category())
    }

    /// 是否对其他修正器保证
    pub fn ensures_against_others(&self) -> bool {
        dispatch!(self, s => s.modifier.ensures_against_others())
    }

    /// 构造后检查与河网是否相容
    pub fn check_network(&self, network: &RiverNetwork) -> SfResult<()> {
        match self {
            Self::TimeSeries(s) => s.modifier.check_network(network),
            _ => Ok(()),
        }
    }

    /// 前置阶段
    pub fn input_modification(
        &mut self,
        network: &mut RiverNetwork,
        idx: ReachIndex,
        ctx: &ModifierContext,
    ) -> SfResult<()> {
        dispatch!(self, s => s.modifier.input_modification(&mut s.state, network, idx, ctx))
    }

    /// 主效果
    pub fn modification_before_updates(
        &mut self,
        network: &mut RiverNetwork,
        idx: ReachIndex,
        ctx: &ModifierContext,
    ) -> SfResult<()> {
        dispatch!(self, s => s.modifier.modification_before_updates(&mut s.state, network, idx, ctx))
    }

    /// 本轮结束后是否需要再来一轮
    pub fn further_iteration_necessary(&self, ctx: &ModifierContext) -> bool {
        dispatch!(self, s => s.modifier.further_iteration_necessary(&s.state, ctx))
    }

    /// 收尾阶段
    pub fn final_modification(
        &mut self,
        network: &mut RiverNetwork,
        idx: ReachIndex,
        ctx: &ModifierContext,
    ) -> SfResult<()> {
        dispatch!(self, s => s.modifier.final_modification(&mut s.state, network, idx, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_roundtrip_through_slot() {
        let params = ModifierParams::RecirculateSediment(RecirculateSediment::new(2.0, false));
        let slot = ModifierSlot::from_params(&params).unwrap();
        assert_eq!(slot.kind(), ModifierKind::RecirculateSediment);
        assert_eq!(slot.category(), FlowCategory::Sediment);
        assert_eq!(slot.params(), params);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = ModifierParams::RecirculateWater(RecirculateWater::new(0.0, false));
        assert!(ModifierSlot::from_params(&params).is_err());
    }

    #[test]
    fn test_serde_tag() {
        let json = r#"{"type":"AdjustSlopesAtMargins","minimum_bed_slope":0.02,"category":"Sediment"}"#;
        let params: ModifierParams = serde_json::from_str(json).unwrap();
        let slot = ModifierSlot::from_params(&params).unwrap();
        assert_eq!(slot.kind(), ModifierKind::SlopeClamp);
        assert!(!slot.ensures_against_others());
    }
}
