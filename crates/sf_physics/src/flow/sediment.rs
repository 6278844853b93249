// crates/sf_physics/src/flow/sediment.rs

//! 推移质输运
//!
//! # 变化率
//!
//! 冲刷率由输沙能力策略给出（含上游旁通），淤积率为全部上游河段冲刷率之和。
//! 边界河段默认保留原有冲刷率，上游边界的来沙由初始状态或修正器决定。
//!
//! # 时间步长
//!
//! 取以下各项的最小值：
//!
//! - 最大时间步长与距结束时刻的剩余时间
//! - 非边界河段：活动层体积 × 允许侵蚀比例 / 冲刷率（次表层有泥沙时）
//! - 启用坡度保护时：相对床面坡度变化上限 × 坡度 / 坡度变化率
//!
//! # 变化量
//!
//! 变化量 = 变化率 × 步长，按扫描顺序换算为单位床面面积。非边界河段的冲刷
//! 不得超过先淤积后活动层中可用的量，未兑现的冲刷从下游河段的淤积中扣除。
//! 只有非边界河段的地层与高程发生变化：
//!
//! ```text
//! Δz = (淤积 - 冲刷) / (1 - 孔隙率)      （单位床面面积）
//! ```

use super::{FlowContext, FlowMethods, FlowProcess};
use crate::capacity::{compute_erosion_rates, CapacityContext, CapacityMethod, TraversalMode};
use crate::grains::Grains;
use crate::modifiers::FlowCategory;
use crate::network::RiverNetwork;
use crate::parameters::OverallParameters;
use crate::reach::Reach;
use serde::{Deserialize, Serialize};
use sf_foundation::{ensure, ReachIndex, SfError, SfResult, SUBSURFACE_VOLUME_EPS};

/// 推移质输运参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BedloadParams {
    /// 边界河段是否也由输沙能力更新冲刷率
    #[serde(default)]
    pub update_erosion_rates_in_margins: bool,
    /// 是否限制步长以避免床面坡度变为零或负
    #[serde(default)]
    pub prevent_zero_or_negative_bed_slopes: bool,
    /// 每步允许的相对床面坡度变化
    #[serde(default = "default_max_relative_slope_change")]
    pub maximum_relative_bed_slope_change: f64,
}

fn default_max_relative_slope_change() -> f64 {
    0.5
}

impl Default for BedloadParams {
    fn default() -> Self {
        Self {
            update_erosion_rates_in_margins: false,
            prevent_zero_or_negative_bed_slopes: false,
            maximum_relative_bed_slope_change: default_max_relative_slope_change(),
        }
    }
}

impl BedloadParams {
    /// 验证参数
    pub fn validate(&self) -> SfResult<()> {
        ensure!(
            self.maximum_relative_bed_slope_change > 0.0,
            SfError::invalid_config(
                "maximum_relative_bed_slope_change",
                self.maximum_relative_bed_slope_change,
                "必须为正"
            )
        );
        Ok(())
    }
}

/// 推移质输运过程
#[derive(Debug, Clone, PartialEq)]
pub struct BedloadTransport {
    capacity: CapacityMethod,
    traversal: TraversalMode,
    params: BedloadParams,
}

impl BedloadTransport {
    /// 创建
    pub fn new(capacity: CapacityMethod, traversal: TraversalMode, params: BedloadParams) -> Self {
        Self {
            capacity,
            traversal,
            params,
        }
    }

    /// 由流动方法组合创建
    pub fn from_methods(methods: &FlowMethods) -> Self {
        Self::new(methods.capacity.clone(), methods.traversal, methods.bedload.clone())
    }

    /// 输沙能力方法
    #[inline]
    pub fn capacity(&self) -> &CapacityMethod {
        &self.capacity
    }

    /// 遍历方式
    #[inline]
    pub fn traversal(&self) -> TraversalMode {
        self.traversal
    }

    /// 输运参数
    #[inline]
    pub fn params(&self) -> &BedloadParams {
        &self.params
    }

    // ========================================================================
    // 时间步长
    // ========================================================================

    /// 计算本步时间步长
    pub fn time_step(&self, network: &RiverNetwork, params: &OverallParameters) -> f64 {
        let remaining = params.end_time - params.elapsed_seconds;
        let mut dt = params.max_time_step.min(remaining);

        for reach in network.reaches().iter().filter(|r| !r.is_margin()) {
            if let Some(limit) = active_layer_limit(reach, params.max_fraction_of_active_layer_eroded) {
                dt = dt.min(limit);
            }
            if self.params.prevent_zero_or_negative_bed_slopes {
                if let Some(d) = reach.downstream() {
                    let limit = slope_change_limit(
                        reach,
                        &network[d],
                        params.pore_volume_fraction,
                        self.params.maximum_relative_bed_slope_change,
                    );
                    if let Some(limit) = limit {
                        dt = dt.min(limit);
                    }
                }
            }
        }
        dt
    }

    // ========================================================================
    // 变化量
    // ========================================================================

    /// 变化量 = 变化率 × 步长（体积）
    pub fn compute_changes(&self, network: &mut RiverNetwork, time_step: f64) {
        for reach in network.reaches_mut() {
            reach.erosion = &reach.erosion_rate * time_step;
            reach.deposition = &reach.deposition_rate * time_step;
        }
    }

    /// 按扫描顺序换算为单位床面面积并限制冲刷
    pub fn hand_down_changes(&self, network: &mut RiverNetwork) {
        let order = network.flow_order().to_vec();
        for idx in order {
            let unfulfilled = limit_erosion(&mut network[idx]);
            if let Some(d) = network[idx].downstream() {
                network[d].deposition.subtract(&unfulfilled);
            }
        }
    }

    /// 把变化量应用到非边界河段
    pub fn apply_changes(&self, network: &mut RiverNetwork, params: &OverallParameters) {
        let solid = 1.0 - params.pore_volume_fraction;
        for reach in network.reaches_mut().iter_mut().filter(|r| !r.is_margin()) {
            reach.strata.deposit(&reach.deposition);
            let eroded = reach.strata.erode(&reach.erosion);
            let increment = reach.deposition.overall_volume() - eroded.overall_volume();
            reach.elevation += increment / solid;
        }
    }
}

impl FlowProcess for BedloadTransport {
    fn category(&self) -> FlowCategory {
        FlowCategory::Sediment
    }

    fn calculate_change_rates(
        &self,
        network: &mut RiverNetwork,
        ctx: &FlowContext<'_>,
    ) -> SfResult<()> {
        let capacity_ctx = CapacityContext::new(ctx.params, self.traversal);
        compute_erosion_rates(
            &self.capacity,
            network,
            &capacity_ctx,
            self.params.update_erosion_rates_in_margins,
        )
    }

    fn hand_down_change_rate(&self, network: &mut RiverNetwork, idx: ReachIndex) {
        let mut rate = Grains::zeros_like(&network[idx].deposition_rate);
        for &up in network[idx].upstream() {
            rate += &network[up].erosion_rate;
        }
        network[idx].deposition_rate = rate;
    }
}

// ============================================================================
// 辅助函数
// ============================================================================

/// 体积换算为单位床面面积；面积为零时为零
fn per_unit_bed_surface(volume: &Grains, bed_area: f64) -> Grains {
    if bed_area > 0.0 {
        volume * (1.0 / bed_area)
    } else {
        Grains::zeros_like(volume)
    }
}

/// 换算河段变化量并限制冲刷，返回未兑现的冲刷体积
fn limit_erosion(reach: &mut Reach) -> Grains {
    let area = reach.bed_area();
    let requested = reach.erosion.clone();
    reach.deposition = per_unit_bed_surface(&reach.deposition, area);
    reach.erosion = per_unit_bed_surface(&reach.erosion, area);

    if reach.is_margin() {
        return Grains::zeros_like(&requested);
    }
    reach.erosion = reach
        .strata
        .potential_erosion(&reach.deposition, &reach.erosion);
    let mut unfulfilled = requested;
    unfulfilled.subtract(&(&reach.erosion * area));
    unfulfilled
}

/// 活动层侵蚀限制的步长
fn active_layer_limit(reach: &Reach, max_fraction: f64) -> Option<f64> {
    let below = reach.strata.layer(1)?.overall_volume();
    if below <= SUBSURFACE_VOLUME_EPS {
        return None;
    }
    let rate = reach.erosion_rate.overall_volume();
    let area = reach.bed_area();
    if rate <= 0.0 || area <= 0.0 {
        return None;
    }
    Some(reach.strata.active_thickness() * max_fraction / (rate / area))
}

/// 床面坡度保护限制的步长
fn slope_change_limit(
    reach: &Reach,
    downstream: &Reach,
    porosity: f64,
    max_relative_change: f64,
) -> Option<f64> {
    let slope = (reach.elevation - downstream.elevation) / reach.length;
    if slope <= 0.0 {
        return None;
    }
    let (local_area, down_area) = (reach.bed_area(), downstream.bed_area());
    if local_area <= 0.0 || down_area <= 0.0 {
        return None;
    }
    let net = |r: &Reach| r.deposition_rate.overall_volume() - r.erosion_rate.overall_volume();
    let rate = ((net(reach) / local_area - net(downstream) / down_area) / reach.length).abs()
        / (1.0 - porosity);
    if rate <= 0.0 {
        return None;
    }
    Some(max_relative_change * slope / rate)
}
