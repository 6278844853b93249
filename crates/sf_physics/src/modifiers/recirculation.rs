// crates/sf_physics/src/modifiers/recirculation.rs

//! 出口到入口的循环回流
//!
//! 用于闭合水槽一类的配置：下游出口的输出在下一个时间步成为上游边界的输入。
//! 同一步内直接回灌会形成因果环，因此状态中保存两代取值：
//!
//! - `current`: 本步写入上游边界的值
//! - `next`: 由出口最近一次状态采样、除以输入分配数得到的下一步取值
//!
//! 每次调用先检测已模拟时长是否变化，变化时 `current ← next`，
//! 随后总是以出口的最新状态刷新 `next`。出口的采样取其全部上游河段的
//! 流量（水流）或冲刷率（泥沙）之和，即出口当前接收的输入。没有上游的
//! 单河段出口取自身流量（水流）或自身淤积率（泥沙），不把自身冲刷率回灌给自己。
//!
//! 出口索引缓存在状态中，每次使用前确认它仍是下游出口，否则重新查找。

use super::{ChangeRateModifier, FlowCategory, ModifierContext, ModifierKind};
use crate::grains::Grains;
use crate::network::RiverNetwork;
use crate::reach::Reach;
use serde::{Deserialize, Serialize};
use sf_foundation::{ensure, ReachIndex, SfError, SfResult};
use std::fmt;

// ============================================================================
// 回流量抽象
// ============================================================================

/// 被回流的物理量
pub trait RecirculationTarget {
    /// 取值类型
    type Value: fmt::Debug + Clone + Send + Sync;

    /// 出口的采样值
    fn sample(network: &RiverNetwork, outlet: ReachIndex) -> Self::Value;

    /// 按输入分配数缩放
    fn divide(value: Self::Value, divisor: f64) -> Self::Value;

    /// 写入上游边界
    fn write(reach: &mut Reach, value: &Self::Value);
}

/// 回流状态记录
#[derive(Debug, Clone, PartialEq)]
pub struct RecirculationState<T> {
    /// 缓存的下游出口
    pub margin: Option<ReachIndex>,
    /// 最近一次观察到的已模拟时长
    pub last_elapsed_seconds: Option<f64>,
    /// 本步输入
    pub current: Option<T>,
    /// 下一步输入
    pub next: Option<T>,
}

impl<T> Default for RecirculationState<T> {
    fn default() -> Self {
        Self {
            margin: None,
            last_elapsed_seconds: None,
            current: None,
            next: None,
        }
    }
}

impl<T: Clone> RecirculationState<T> {
    /// 确认缓存的出口仍有效，否则沿下游链接重新查找
    fn outlet(&mut self, network: &RiverNetwork, from: ReachIndex) -> SfResult<ReachIndex> {
        if let Some(margin) = self.margin {
            if network.get(margin).is_some_and(Reach::is_downstream_margin) {
                return Ok(margin);
            }
        }
        let margin = network.find_downstream_margin(from)?;
        self.margin = Some(margin);
        Ok(margin)
    }

    /// 推进两代缓存
    fn advance(&mut self, elapsed_seconds: f64, sample: T) {
        if self.last_elapsed_seconds != Some(elapsed_seconds) {
            self.last_elapsed_seconds = Some(elapsed_seconds);
            self.current = Some(self.next.take().unwrap_or_else(|| sample.clone()));
        }
        self.next = Some(sample);
    }
}

/// 回流的共同流程
fn recirculate<M: RecirculationTarget>(
    input_divisor: f64,
    state: &mut RecirculationState<M::Value>,
    network: &mut RiverNetwork,
    idx: ReachIndex,
    ctx: &ModifierContext,
) -> SfResult<()> {
    let outlet = state.outlet(network, idx)?;
    let sample = M::divide(M::sample(network, outlet), input_divisor);
    state.advance(ctx.elapsed_seconds, sample);

    let reach = &mut network[idx];
    if reach.is_upstream_margin() {
        if let Some(current) = &state.current {
            M::write(reach, current);
            log::trace!("回流写入上游边界 {}: {:?}", reach.id(), current);
        }
    }
    Ok(())
}

fn validate_divisor(divisor: f64) -> SfResult<()> {
    ensure!(
        divisor.is_finite() && divisor > 0.0,
        SfError::invalid_config("input_divisor", divisor, "必须为正")
    );
    Ok(())
}

fn default_divisor() -> f64 {
    1.0
}

// ============================================================================
// 水流回流
// ============================================================================

/// 水流循环回流：出口流量写入上游边界的流量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecirculateWater {
    /// 输入分配数（并行接收的上游边界数）
    #[serde(default = "default_divisor")]
    pub input_divisor: f64,
    /// 是否对其他修正器保证
    #[serde(default)]
    pub ensure_against_other_modifiers: bool,
}

impl RecirculateWater {
    /// 创建
    pub fn new(input_divisor: f64, ensure_against_other_modifiers: bool) -> Self {
        Self {
            input_divisor,
            ensure_against_other_modifiers,
        }
    }

    /// 验证参数
    pub fn validate(&self) -> SfResult<()> {
        validate_divisor(self.input_divisor)
    }
}

impl RecirculationTarget for RecirculateWater {
    type Value = f64;

    fn sample(network: &RiverNetwork, outlet: ReachIndex) -> f64 {
        if network[outlet].upstream().is_empty() {
            network[outlet].discharge
        } else {
            network.inflow(outlet)
        }
    }

    fn divide(value: f64, divisor: f64) -> f64 {
        value / divisor
    }

    fn write(reach: &mut Reach, value: &f64) {
        reach.discharge = *value;
    }
}

impl ChangeRateModifier for RecirculateWater {
    type State = RecirculationState<f64>;

    fn kind(&self) -> ModifierKind {
        ModifierKind::RecirculateWater
    }

    fn category(&self) -> FlowCategory {
        FlowCategory::Water
    }

    fn ensures_against_others(&self) -> bool {
        self.ensure_against_other_modifiers
    }

    fn input_modification(
        &self,
        state: &mut Self::State,
        network: &mut RiverNetwork,
        idx: ReachIndex,
        ctx: &ModifierContext,
    ) -> SfResult<()> {
        recirculate::<Self>(self.input_divisor, state, network, idx, ctx)
    }

    fn modification_before_updates(
        &self,
        state: &mut Self::State,
        network: &mut RiverNetwork,
        idx: ReachIndex,
        ctx: &ModifierContext,
    ) -> SfResult<()> {
        recirculate::<Self>(self.input_divisor, state, network, idx, ctx)
    }

    fn further_iteration_necessary(&self, _state: &Self::State, _ctx: &ModifierContext) -> bool {
        false
    }

    fn final_modification(
        &self,
        state: &mut Self::State,
        network: &mut RiverNetwork,
        idx: ReachIndex,
        ctx: &ModifierContext,
    ) -> SfResult<()> {
        recirculate::<Self>(self.input_divisor, state, network, idx, ctx)
    }
}

// ============================================================================
// 泥沙回流
// ============================================================================

/// 泥沙循环回流：出口接收的输沙写入上游边界的冲刷率
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecirculateSediment {
    /// 输入分配数（并行接收的上游边界数）
    #[serde(default = "default_divisor")]
    pub input_divisor: f64,
    /// 是否对其他修正器保证
    #[serde(default)]
    pub ensure_against_other_modifiers: bool,
}

impl RecirculateSediment {
    /// 创建
    pub fn new(input_divisor: f64, ensure_against_other_modifiers: bool) -> Self {
        Self {
            input_divisor,
            ensure_against_other_modifiers,
        }
    }

    /// 验证参数
    pub fn validate(&self) -> SfResult<()> {
        validate_divisor(self.input_divisor)
    }
}

impl RecirculationTarget for RecirculateSediment {
    type Value = Grains;

    fn sample(network: &RiverNetwork, outlet: ReachIndex) -> Grains {
        let reach = &network[outlet];
        if reach.upstream().is_empty() {
            return reach.deposition_rate.clone();
        }
        let mut total = Grains::zeros_like(&reach.erosion_rate);
        for &up in reach.upstream() {
            total += &network[up].erosion_rate;
        }
        total
    }

    fn divide(value: Grains, divisor: f64) -> Grains {
        value * (1.0 / divisor)
    }

    fn write(reach: &mut Reach, value: &Grains) {
        reach.erosion_rate = value.clone();
    }
}

impl ChangeRateModifier for RecirculateSediment {
    type State = RecirculationState<Grains>;

    fn kind(&self) -> ModifierKind {
        ModifierKind::RecirculateSediment
    }

    fn category(&self) -> FlowCategory {
        FlowCategory::Sediment
    }

    fn ensures_against_others(&self) -> bool {
        self.ensure_against_other_modifiers
    }

    fn input_modification(
        &self,
        state: &mut Self::State,
        network: &mut RiverNetwork,
        idx: ReachIndex,
        ctx: &ModifierContext,
    ) -> SfResult<()> {
        recirculate::<Self>(self.input_divisor, state, network, idx, ctx)
    }

    fn modification_before_updates(
        &self,
        state: &mut Self::State,
        network: &mut RiverNetwork,
        idx: ReachIndex,
        ctx: &ModifierContext,
    ) -> SfResult<()> {
        recirculate::<Self>(self.input_divisor, state, network, idx, ctx)
    }

    fn further_iteration_necessary(&self, _state: &Self::State, _ctx: &ModifierContext) -> bool {
        false
    }

    fn final_modification(
        &self,
        state: &mut Self::State,
        network: &mut RiverNetwork,
        idx: ReachIndex,
        ctx: &ModifierContext,
    ) -> SfResult<()> {
        recirculate::<Self>(self.input_divisor, state, network, idx, ctx)
    }
}
