// crates/sf_physics/src/modifiers/time_series.rs

//! 输入时间序列
//!
//! 按河段与属性给出 (时刻, 值) 序列，在当前已模拟时长处线性插值后写入河段：
//! 第一个时刻之前取第一个值，最后一个时刻之后取最后一个值。
//! 每个序列至少两项，时刻严格递增，值非负。只支持绝对值。

use super::{ChangeRateModifier, FlowCategory, ModifierContext, ModifierKind};
use crate::grains::Grains;
use crate::network::RiverNetwork;
use crate::reach::Reach;
use serde::{Deserialize, Serialize};
use sf_foundation::{ensure, require, ReachIndex, SfError, SfResult};

/// 单个河段单个属性的时间序列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "property")]
pub enum InputSeries {
    /// 流量 [m³/s]
    Discharge {
        /// 河段编号
        reach_id: i64,
        /// (时刻 [s], 值)
        entries: Vec<(f64, f64)>,
    },
    /// 最大水深 [m]
    MaximumWaterDepth {
        /// 河段编号
        reach_id: i64,
        /// (时刻 [s], 值)
        entries: Vec<(f64, f64)>,
    },
    /// 冲刷率 [m³/s]
    ErosionRate {
        /// 河段编号
        reach_id: i64,
        /// (时刻 [s], 值)
        entries: Vec<(f64, Grains)>,
    },
}

impl InputSeries {
    /// 所属河段编号
    pub fn reach_id(&self) -> i64 {
        match self {
            Self::Discharge { reach_id, .. }
            | Self::MaximumWaterDepth { reach_id, .. }
            | Self::ErosionRate { reach_id, .. } => *reach_id,
        }
    }

    /// 属性名
    pub fn property(&self) -> &'static str {
        match self {
            Self::Discharge { .. } => "Discharge",
            Self::MaximumWaterDepth { .. } => "MaximumWaterDepth",
            Self::ErosionRate { .. } => "ErosionRate",
        }
    }

    fn times(&self) -> Vec<f64> {
        match self {
            Self::Discharge { entries, .. } | Self::MaximumWaterDepth { entries, .. } => {
                entries.iter().map(|(t, _)| *t).collect()
            }
            Self::ErosionRate { entries, .. } => entries.iter().map(|(t, _)| *t).collect(),
        }
    }

    /// 验证序列本身
    pub fn validate(&self) -> SfResult<()> {
        let times = self.times();
        ensure!(
            times.len() >= 2,
            SfError::invalid_config(
                format!("{} 时间序列（河段 {}）", self.property(), self.reach_id()),
                times.len(),
                "至少需要两项"
            )
        );
        for (i, &t) in times.iter().enumerate() {
            ensure!(
                t.is_finite() && (i == 0 || t > times[i - 1]),
                SfError::invalid_config("time", t, "时刻必须有限且严格递增")
            );
        }
        match self {
            Self::Discharge { entries, .. } | Self::MaximumWaterDepth { entries, .. } => {
                for &(_, v) in entries {
                    ensure!(
                        v.is_finite() && v >= 0.0,
                        SfError::invalid_config(self.property(), v, "值必须为非负有限值")
                    );
                }
            }
            Self::ErosionRate { entries, .. } => {
                let first = &entries[0].1;
                for (_, g) in entries {
                    g.validate()?;
                    ensure!(
                        g.matches(first),
                        SfError::config("冲刷率时间序列各项形状不一致")
                    );
                }
            }
        }
        Ok(())
    }

    /// 定位包含 `t` 的区间，`cursor` 为上次结果；返回 (区间起点, 插值系数)
    fn locate(times: &[f64], cursor: &mut usize, t: f64) -> (usize, f64) {
        let last = times.len() - 1;
        if t <= times[0] {
            *cursor = 0;
            return (0, 0.0);
        }
        if t >= times[last] {
            *cursor = last - 1;
            return (last - 1, 1.0);
        }
        let mut k = (*cursor).min(last - 1);
        while t < times[k] {
            k -= 1;
        }
        while t > times[k + 1] {
            k += 1;
        }
        *cursor = k;
        (k, (t - times[k]) / (times[k + 1] - times[k]))
    }

    /// 在时刻 `t` 写入河段
    fn apply(&self, reach: &mut Reach, cursor: &mut usize, t: f64) {
        let (k, w) = Self::locate(&self.times(), cursor, t);
        match self {
            Self::Discharge { entries, .. } => {
                reach.discharge = lerp(entries[k].1, entries[k + 1].1, w);
            }
            Self::MaximumWaterDepth { entries, .. } => {
                reach.max_water_depth = lerp(entries[k].1, entries[k + 1].1, w);
            }
            Self::ErosionRate { entries, .. } => {
                reach.erosion_rate = Grains::interpolate_linearly(&entries[k].1, &entries[k + 1].1, w);
            }
        }
    }
}

#[inline]
fn lerp(a: f64, b: f64, w: f64) -> f64 {
    a + (b - a) * w
}

/// 输入时间序列修正器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputTimeSeries {
    /// 全部序列
    pub series: Vec<InputSeries>,
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

/// 时间序列状态：每个序列上次所在的区间
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeriesState {
    /// 区间游标
    pub cursors: Vec<usize>,
}

impl InputTimeSeries {
    /// 验证参数
    pub fn validate(&self) -> SfResult<()> {
        self.series.iter().try_for_each(InputSeries::validate)
    }

    /// 检查河段存在且冲刷率形状与河段一致
    pub fn check_network(&self, network: &RiverNetwork) -> SfResult<()> {
        for series in &self.series {
            let idx = require!(
                network.index_of(series.reach_id()),
                SfError::not_found(format!("时间序列引用的河段 {}", series.reach_id()))
            );
            if let InputSeries::ErosionRate { entries, .. } = series {
                let template = &network[idx].erosion_rate;
                ensure!(
                    entries.iter().all(|(_, g)| g.matches(template)),
                    SfError::config(format!(
                        "河段 {} 的冲刷率时间序列与地层形状不一致",
                        series.reach_id()
                    ))
                );
            }
        }
        Ok(())
    }

    fn write(
        &self,
        state: &mut TimeSeriesState,
        network: &mut RiverNetwork,
        idx: ReachIndex,
        ctx: &ModifierContext,
    ) {
        state.cursors.resize(self.series.len(), 0);
        let reach = &mut network[idx];
        for (series, cursor) in self.series.iter().zip(state.cursors.iter_mut()) {
            if series.reach_id() == reach.id() {
                series.apply(reach, cursor, ctx.elapsed_seconds);
            }
        }
    }
}

impl ChangeRateModifier for InputTimeSeries {
    type State = TimeSeriesState;

    fn kind(&self) -> ModifierKind {
        ModifierKind::InputTimeSeries
    }

    fn category(&self) -> FlowCategory {
        self.category
    }

    fn ensures_against_others(&self) -> bool {
        self.ensure_against_other_modifiers
    }

    fn input_modification(
        &self,
        state: &mut TimeSeriesState,
        network: &mut RiverNetwork,
        idx: ReachIndex,
        ctx: &ModifierContext,
    ) -> SfResult<()> {
        self.write(state, network, idx, ctx);
        Ok(())
    }

    fn modification_before_updates(
        &self,
        state: &mut TimeSeriesState,
        network: &mut RiverNetwork,
        idx: ReachIndex,
        ctx: &ModifierContext,
    ) -> SfResult<()> {
        self.write(state, network, idx, ctx);
        Ok(())
    }

    fn further_iteration_necessary(&self, _state: &TimeSeriesState, _ctx: &ModifierContext) -> bool {
        false
    }

    fn final_modification(
        &self,
        state: &mut TimeSeriesState,
        network: &mut RiverNetwork,
        idx: ReachIndex,
        ctx: &ModifierContext,
    ) -> SfResult<()> {
        self.write(state, network, idx, ctx);
        Ok(())
    }
}
