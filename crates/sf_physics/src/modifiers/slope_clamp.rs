// crates/sf_physics/src/modifiers/slope_clamp.rs

//! 边界河段坡度约束
//!
//! 在上游边界以下游河段为参照、在下游出口以第一个上游河段为参照，
//! 用下游两河段差分（距离取两河段长度的平均）计算床面坡度与水面坡度：
//!
//! 1. 床面坡度低于下限时调整本河段高程使坡度恰为下限；设置了上限
//!    （下限 ≤ 上限）且坡度超过上限时调整到恰为上限
//! 2. 以调整后的高程重新计算水位，对水面坡度做同样的双侧约束，
//!    结果写回为水深 = 约束后水位 − 高程，水深不小于 0。参照水位过低时
//!    水深截断为 0，此时水面坡度约束不再能满足
//!
//! 上游边界只改自身、下游出口也只改自身，参照河段不动。
//! 既是上游边界又是下游出口、且没有任何邻居的单河段不做处理。
//!
//! 新时间步开始的那一轮请求再来一轮，让依赖几何的其他修正器看到调整结果。
//!
//! 水流过程每轮末尾按阻力关系重算全部河段的水深，会覆盖这里写入的水深。
//! 只有打开 `ensure_against_other_modifiers` 时，收尾阶段重新施加的水面约束
//! 才会保留到本步结束。

use super::{ChangeRateModifier, FlowCategory, ModifierContext, ModifierKind};
use crate::network::RiverNetwork;
use crate::reach::Reach;
use serde::{Deserialize, Serialize};
use sf_foundation::{ReachIndex, SfError, SfResult};

/// 坡度约束参数与行为
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlopeClamp {
    /// 床面坡度下限
    #[serde(default)]
    pub minimum_bed_slope: f64,
    /// 床面坡度上限；小于下限时视为不设上限
    #[serde(default)]
    pub maximum_bed_slope: Option<f64>,
    /// 水面坡度下限
    #[serde(default)]
    pub minimum_water_surface_slope: Option<f64>,
    /// 水面坡度上限；小于下限时视为不设上限
    #[serde(default)]
    pub maximum_water_surface_slope: Option<f64>,
    /// 是否对其他修正器保证
    #[serde(default)]
    pub ensure_against_other_modifiers: bool,
    /// 所属流动类别
    #[serde(default = "default_category")]
    pub category: FlowCategory,
}

fn default_category() -> FlowCategory {
    FlowCategory::Water
}

/// 坡度约束的状态记录
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlopeClampState {
    /// 最近一次观察到的已模拟时长
    pub last_elapsed_seconds: Option<f64>,
    /// 检测到新时间步的轮次
    pub step_started_round: Option<usize>,
}

impl SlopeClampState {
    fn observe(&mut self, ctx: &ModifierContext) {
        if self.last_elapsed_seconds != Some(ctx.elapsed_seconds) {
            self.last_elapsed_seconds = Some(ctx.elapsed_seconds);
            self.step_started_round = Some(ctx.round);
        }
    }
}

/// 双侧约束的上下界
#[derive(Debug, Clone, Copy)]
struct Bounds {
    lower: Option<f64>,
    upper: Option<f64>,
}

impl Bounds {
    fn new(lower: Option<f64>, upper: Option<f64>) -> Self {
        let upper = match (lower, upper) {
            (Some(lo), Some(hi)) if lo > hi => None,
            (_, hi) => hi,
        };
        Self { lower, upper }
    }

    /// 返回需要写回的坡度；已在界内时返回 `None`
    fn violated(&self, slope: f64) -> Option<f64> {
        if let Some(lo) = self.lower {
            if slope < lo {
                return Some(lo);
            }
        }
        if let Some(hi) = self.upper {
            if slope > hi {
                return Some(hi);
            }
        }
        None
    }
}

impl SlopeClamp {
    /// 仅约束床面坡度下限
    pub fn with_minimum_bed_slope(minimum_bed_slope: f64, category: FlowCategory) -> Self {
        Self {
            minimum_bed_slope,
            maximum_bed_slope: None,
            minimum_water_surface_slope: None,
            maximum_water_surface_slope: None,
            ensure_against_other_modifiers: false,
            category,
        }
    }

    /// 验证参数
    pub fn validate(&self) -> SfResult<()> {
        let values = [
            ("minimum_bed_slope", Some(self.minimum_bed_slope)),
            ("maximum_bed_slope", self.maximum_bed_slope),
            ("minimum_water_surface_slope", self.minimum_water_surface_slope),
            ("maximum_water_surface_slope", self.maximum_water_surface_slope),
        ];
        for (key, value) in values {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(SfError::invalid_config(key, v, "必须为有限值"));
                }
            }
        }
        Ok(())
    }

    fn bed_bounds(&self) -> Bounds {
        Bounds::new(Some(self.minimum_bed_slope), self.maximum_bed_slope)
    }

    fn water_bounds(&self) -> Bounds {
        Bounds::new(
            self.minimum_water_surface_slope,
            self.maximum_water_surface_slope,
        )
    }

    /// 对一个河段执行约束
    pub fn adjust_slopes(&self, network: &mut RiverNetwork, idx: ReachIndex) {
        let reach = &network[idx];
        if !reach.is_margin() {
            return;
        }
        let downstream = reach.downstream();
        let upstream = reach.upstream().first().copied();
        let is_upstream_margin = reach.is_upstream_margin();
        let is_downstream_margin = reach.is_downstream_margin();

        if is_upstream_margin {
            if let Some(d) = downstream {
                let (local, reference) = network.pair_mut(idx, d);
                self.adjust_against_downstream(local, reference);
            }
        }
        if is_downstream_margin {
            if let Some(u) = upstream {
                let (local, reference) = network.pair_mut(idx, u);
                self.adjust_against_upstream(local, reference);
            }
        }
    }

    fn adjust_against_downstream(&self, local: &mut Reach, downstream: &Reach) {
        let distance = local.center_distance(downstream);
        if distance <= 0.0 {
            return;
        }
        let slope = (local.elevation - downstream.elevation) / distance;
        if let Some(target) = self.bed_bounds().violated(slope) {
            local.elevation = target * distance + downstream.elevation;
            log::trace!(
                "河段 {} 床面坡度 {:.6} 约束为 {:.6}",
                local.id(),
                slope,
                target
            );
        }
        let reference_level = downstream.water_level();
        let slope = (local.water_level() - reference_level) / distance;
        if let Some(target) = self.water_bounds().violated(slope) {
            set_water_level(local, target * distance + reference_level);
            log::trace!(
                "河段 {} 水面坡度 {:.6} 约束为 {:.6}",
                local.id(),
                slope,
                target
            );
        }
    }

    fn adjust_against_upstream(&self, local: &mut Reach, upstream: &Reach) {
        let distance = local.center_distance(upstream);
        if distance <= 0.0 {
            return;
        }
        let slope = (upstream.elevation - local.elevation) / distance;
        if let Some(target) = self.bed_bounds().violated(slope) {
            local.elevation = upstream.elevation - target * distance;
            log::trace!(
                "出口河段 {} 床面坡度 {:.6} 约束为 {:.6}",
                local.id(),
                slope,
                target
            );
        }
        let reference_level = upstream.water_level();
        let slope = (reference_level - local.water_level()) / distance;
        if let Some(target) = self.water_bounds().violated(slope) {
            set_water_level(local, reference_level - target * distance);
            log::trace!(
                "出口河段 {} 水面坡度 {:.6} 约束为 {:.6}",
                local.id(),
                slope,
                target
            );
        }
    }
}

fn set_water_level(local: &mut Reach, level: f64) {
    let depth = level - local.elevation;
    if depth < 0.0 {
        log::trace!(
            "河段 {} 约束水位 {:.6} 低于床面 {:.6}，水深取 0",
            local.id(),
            level,
            local.elevation
        );
    }
    local.max_water_depth = depth.max(0.0);
}

impl ChangeRateModifier for SlopeClamp {
    type State = SlopeClampState;

    fn kind(&self) -> ModifierKind {
        ModifierKind::SlopeClamp
    }

    fn category(&self) -> FlowCategory {
        self.category
    }

    fn ensures_against_others(&self) -> bool {
        self.ensure_against_other_modifiers
    }

    fn input_modification(
        &self,
        state: &mut SlopeClampState,
        network: &mut RiverNetwork,
        idx: ReachIndex,
        ctx: &ModifierContext,
    ) -> SfResult<()> {
        state.observe(ctx);
        self.adjust_slopes(network, idx);
        Ok(())
    }

    fn modification_before_updates(
        &self,
        state: &mut SlopeClampState,
        network: &mut RiverNetwork,
        idx: ReachIndex,
        ctx: &ModifierContext,
    ) -> SfResult<()> {
        state.observe(ctx);
        self.adjust_slopes(network, idx);
        Ok(())
    }

    fn further_iteration_necessary(&self, state: &SlopeClampState, ctx: &ModifierContext) -> bool {
        state.step_started_round == Some(ctx.round)
    }

    fn final_modification(
        &self,
        _state: &mut SlopeClampState,
        network: &mut RiverNetwork,
        idx: ReachIndex,
        _ctx: &ModifierContext,
    ) -> SfResult<()> {
        self.adjust_slopes(network, idx);
        Ok(())
    }
}
