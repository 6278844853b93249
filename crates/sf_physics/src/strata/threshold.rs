// crates/sf_physics/src/strata/threshold.rs

//! 基于阈值带的地层更新
//!
//! 活动层厚度目标为阈值带 (lower, upper) 的中点。阈值带可以在构造时固定
//! （静态），也可以每次调用时由活动层的参考百分位粒径乘以系数重新计算
//! （动态）。两种情况都要满足下限不小于 `minimum_lower`，上下限之差不小于
//! `minimum_gap`，而 `minimum_gap` 严格大于一次交换的增量，防止来回振荡。

use super::{LayerStack, StrataSorting, StrataSortingParams};
use serde::{Deserialize, Serialize};
use sf_foundation::{ensure, SfError, SfResult};

/// 单次调用内交换趟数的上限
const MAX_PASSES: usize = 16;

/// 阈值带
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBand {
    /// 下限 [m]
    pub lower: f64,
    /// 上限 [m]
    pub upper: f64,
}

impl ThresholdBand {
    /// 应用下限与最小间距约束
    pub fn clamped(lower: f64, upper: f64, minimum_lower: f64, minimum_gap: f64) -> Self {
        let lower = lower.max(minimum_lower);
        let upper = upper.max(lower + minimum_gap);
        Self { lower, upper }
    }

    /// 中点（目标活动层厚度）
    #[inline]
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.lower + self.upper)
    }

    /// 是否包含给定厚度
    #[inline]
    pub fn contains(&self, thickness: f64) -> bool {
        thickness >= self.lower && thickness <= self.upper
    }
}

/// 阈值带地层更新参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSortingParams {
    /// 每次交换的增量厚度 [m]
    pub increment: f64,
    /// 是否按粒径动态计算阈值
    #[serde(default)]
    pub dynamic_thresholds: bool,
    /// 参考百分位（动态模式必需）
    #[serde(default)]
    pub reference_percentile: Option<f64>,
    /// 下限值（静态）或系数（动态）
    pub lower_value_or_factor: f64,
    /// 上限值（静态）或系数（动态）
    pub upper_value_or_factor: f64,
    /// 下限的最小值，缺省为 `minimum_gap * lower / (upper - lower)`
    #[serde(default)]
    pub minimum_lower: Option<f64>,
    /// 上下限最小间距，缺省为 1.1 倍增量
    #[serde(default)]
    pub minimum_gap: Option<f64>,
}

/// 基于阈值带的地层更新
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdBasedStratigraphy {
    increment: f64,
    dynamic_thresholds: bool,
    reference_percentile: Option<f64>,
    lower_value_or_factor: f64,
    upper_value_or_factor: f64,
    minimum_lower: f64,
    minimum_gap: f64,
    band: ThresholdBand,
}

impl ThresholdBasedStratigraphy {
    /// 由参数创建并验证
    pub fn new(params: ThresholdSortingParams) -> SfResult<Self> {
        let ThresholdSortingParams {
            increment,
            dynamic_thresholds,
            reference_percentile,
            lower_value_or_factor: lower,
            upper_value_or_factor: upper,
            minimum_lower,
            minimum_gap,
        } = params;

        ensure!(
            increment > 0.0,
            SfError::invalid_config("increment", increment, "增量厚度必须为正")
        );
        if dynamic_thresholds {
            ensure!(
                reference_percentile.is_some(),
                SfError::config("动态阈值需要参考百分位 reference_percentile")
            );
        }
        if let Some(p) = reference_percentile {
            ensure!(
                (0.0..=100.0).contains(&p),
                SfError::invalid_config("reference_percentile", p, "必须在 0 到 100 之间")
            );
        }
        ensure!(
            lower > 0.0,
            SfError::invalid_config("lower_value_or_factor", lower, "必须为正")
        );
        ensure!(
            upper > lower,
            SfError::invalid_config("upper_value_or_factor", upper, "必须大于下限")
        );
        let minimum_gap = minimum_gap.unwrap_or(1.1 * increment);
        let minimum_lower = minimum_lower.unwrap_or(minimum_gap * lower / (upper - lower));
        ensure!(
            minimum_lower > 0.0,
            SfError::invalid_config("minimum_lower", minimum_lower, "必须为正")
        );
        ensure!(
            minimum_gap > increment,
            SfError::invalid_config("minimum_gap", minimum_gap, "必须大于增量厚度")
        );

        let band = if dynamic_thresholds {
            // 首次调用前的占位，随后由活动层粒径覆盖
            ThresholdBand::clamped(0.0, 0.0, minimum_lower, minimum_gap)
        } else {
            let mut static_lower = lower;
            if upper - lower < minimum_gap {
                static_lower = 0.5 * (lower + upper - minimum_gap);
            }
            ThresholdBand::clamped(static_lower, upper, minimum_lower, minimum_gap)
        };

        Ok(Self {
            increment,
            dynamic_thresholds,
            reference_percentile,
            lower_value_or_factor: lower,
            upper_value_or_factor: upper,
            minimum_lower,
            minimum_gap,
            band,
        })
    }

    /// 当前阈值带
    pub fn band(&self) -> ThresholdBand {
        self.band
    }

    /// 增量厚度
    pub fn increment(&self) -> f64 {
        self.increment
    }

    fn update_band(&mut self, strata: &LayerStack, diameters: &[f64]) {
        if !self.dynamic_thresholds || strata.active_thickness() <= 0.0 {
            return;
        }
        let percentile = match self.reference_percentile {
            Some(p) => p,
            None => return,
        };
        if let Some(d) = strata.active().percentile_diameter(diameters, percentile) {
            self.band = ThresholdBand::clamped(
                d * self.lower_value_or_factor,
                d * self.upper_value_or_factor,
                self.minimum_lower,
                self.minimum_gap,
            );
        }
    }

    /// 自底层逐增量上移，直到活动层达到目标厚度附近或底层耗尽
    fn lift_pass(&self, strata: &mut LayerStack) {
        let target = self.band.midpoint();
        let increment = self.increment;
        loop {
            strata.lift_one_layer(|base| {
                let volume = base.overall_volume();
                let share = if volume > 0.0 {
                    (increment / volume).min(1.0)
                } else {
                    0.0
                };
                base * share
            });
            if strata.active_thickness() >= target - 0.5 * increment
                || strata.volume_below_active() <= 0.0
            {
                break;
            }
        }
    }

    /// 按本趟开始时的活动层组成逐增量下移，直到活动层回到目标厚度附近
    fn lower_pass(&self, strata: &mut LayerStack) {
        let target = self.band.midpoint();
        let active = strata.active_thickness();
        let update = strata.active() * (self.increment / active);
        loop {
            strata.lower_one_layer(&update);
            let thickness = strata.active_thickness();
            if thickness <= target + 0.5 * self.increment || thickness <= 0.0 {
                break;
            }
        }
    }
}

impl StrataSorting for ThresholdBasedStratigraphy {
    fn name(&self) -> &'static str {
        "StratigraphyWithThresholdBasedUpdate"
    }

    fn sort_strata(&mut self, strata: &mut LayerStack, diameters: &[f64]) -> SfResult<bool> {
        ensure!(
            strata.len() >= 2,
            SfError::config(format!("{} 至少需要两层, 实际 {} 层", self.name(), strata.len()))
        );
        let initial = strata.active_thickness();
        let mut moved = false;
        // 动态阈值带随活动层组成变化，每趟交换后重新计算，直到厚度落在带内
        for _ in 0..MAX_PASSES {
            self.update_band(strata, diameters);
            let active = strata.active_thickness();
            if active < self.band.lower {
                if strata.volume_below_active() <= 0.0 {
                    break;
                }
                self.lift_pass(strata);
            } else if active > self.band.upper {
                self.lower_pass(strata);
            } else {
                break;
            }
            moved = true;
        }
        if moved {
            log::trace!(
                "{}: 活动层 {:.4e} → {:.4e}",
                self.name(),
                initial,
                strata.active_thickness()
            );
        }
        Ok(moved)
    }

    fn layer_thickness(&self) -> f64 {
        self.band.midpoint()
    }

    fn required_layers(&self) -> super::LayerRequirement {
        super::LayerRequirement::AtLeast(2)
    }

    fn params(&self) -> StrataSortingParams {
        StrataSortingParams::ThresholdBased(ThresholdSortingParams {
            increment: self.increment,
            dynamic_thresholds: self.dynamic_thresholds,
            reference_percentile: self.reference_percentile,
            lower_value_or_factor: self.lower_value_or_factor,
            upper_value_or_factor: self.upper_value_or_factor,
            minimum_lower: Some(self.minimum_lower),
            minimum_gap: Some(self.minimum_gap),
        })
    }
}
