// crates/sf_physics/src/parameters.rs

//! 全局参数
//!
//! 粒径分级列表在整个模拟中共享且递增；时间控制（已模拟时长、当前步长）
//! 由模拟驱动器推进，修正器通过已模拟时长检测新时间步。

use serde::{Deserialize, Serialize};
use sf_foundation::{ensure, SfError, SfResult};

/// 全局物理与时间参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallParameters {
    /// 各粒径分级的代表粒径 [m]，严格递增
    pub fractional_grain_diameters: Vec<f64>,
    /// 重力加速度 [m/s²]
    #[serde(default = "default_gravity")]
    pub gravity: f64,
    /// 水密度 [kg/m³]
    #[serde(default = "default_water_density")]
    pub water_density: f64,
    /// 泥沙密度 [kg/m³]
    #[serde(default = "default_sediment_density")]
    pub sediment_density: f64,
    /// 孔隙率
    #[serde(default = "default_pore_volume_fraction")]
    pub pore_volume_fraction: f64,
    /// 已模拟时长 [s]
    #[serde(default)]
    pub elapsed_seconds: f64,
    /// 当前时间步长 [s]
    #[serde(default)]
    pub current_time_step: f64,
    /// 最大时间步长 [s]
    #[serde(default = "default_max_time_step")]
    pub max_time_step: f64,
    /// 结束时刻 [s]
    #[serde(default = "default_end_time")]
    pub end_time: f64,
    /// 每步最多侵蚀活动层的比例
    #[serde(default = "default_max_active_layer_erosion")]
    pub max_fraction_of_active_layer_eroded: f64,
    /// 修正器收敛循环的最大轮数
    #[serde(default = "default_max_modifier_rounds")]
    pub max_modifier_rounds: usize,
}

fn default_gravity() -> f64 {
    9.81
}
fn default_water_density() -> f64 {
    1000.0
}
fn default_sediment_density() -> f64 {
    2650.0
}
fn default_pore_volume_fraction() -> f64 {
    0.35
}
fn default_max_time_step() -> f64 {
    60.0
}
fn default_end_time() -> f64 {
    3600.0
}
fn default_max_active_layer_erosion() -> f64 {
    0.5
}
fn default_max_modifier_rounds() -> usize {
    16
}

impl Default for OverallParameters {
    fn default() -> Self {
        Self {
            fractional_grain_diameters: vec![0.002, 0.008, 0.032, 0.128],
            gravity: default_gravity(),
            water_density: default_water_density(),
            sediment_density: default_sediment_density(),
            pore_volume_fraction: default_pore_volume_fraction(),
            elapsed_seconds: 0.0,
            current_time_step: 0.0,
            max_time_step: default_max_time_step(),
            end_time: default_end_time(),
            max_fraction_of_active_layer_eroded: default_max_active_layer_erosion(),
            max_modifier_rounds: default_max_modifier_rounds(),
        }
    }
}

impl OverallParameters {
    /// 以给定粒径分级创建
    pub fn with_diameters(diameters: Vec<f64>) -> SfResult<Self> {
        let params = Self {
            fractional_grain_diameters: diameters,
            ..Default::default()
        };
        params.validate()?;
        Ok(params)
    }

    /// 验证参数
    pub fn validate(&self) -> SfResult<()> {
        let d = &self.fractional_grain_diameters;
        ensure!(
            !d.is_empty(),
            SfError::config("粒径分级列表不能为空")
        );
        for (i, &di) in d.iter().enumerate() {
            ensure!(
                di.is_finite() && di > 0.0,
                SfError::invalid_config("fractional_grain_diameters", di, "粒径必须为正")
            );
            if i > 0 {
                ensure!(
                    di > d[i - 1],
                    SfError::invalid_config("fractional_grain_diameters", di, "粒径必须严格递增")
                );
            }
        }
        ensure!(
            self.gravity > 0.0,
            SfError::invalid_config("gravity", self.gravity, "必须为正")
        );
        ensure!(
            self.sediment_density > self.water_density && self.water_density > 0.0,
            SfError::invalid_config(
                "sediment_density",
                self.sediment_density,
                "泥沙密度必须大于水密度"
            )
        );
        SfError::check_range("pore_volume_fraction", self.pore_volume_fraction, 0.0, 0.99)?;
        ensure!(
            self.max_time_step > 0.0,
            SfError::invalid_config("max_time_step", self.max_time_step, "必须为正")
        );
        ensure!(
            self.end_time >= self.elapsed_seconds,
            SfError::invalid_config("end_time", self.end_time, "结束时刻早于当前时刻")
        );
        SfError::check_range(
            "max_fraction_of_active_layer_eroded",
            self.max_fraction_of_active_layer_eroded,
            f64::MIN_POSITIVE,
            1.0,
        )?;
        ensure!(
            self.max_modifier_rounds >= 1,
            SfError::invalid_config("max_modifier_rounds", self.max_modifier_rounds, "至少为 1")
        );
        Ok(())
    }

    /// 粒径分级数
    #[inline]
    pub fn n_fractions(&self) -> usize {
        self.fractional_grain_diameters.len()
    }

    /// 相对水下密度 s - 1
    #[inline]
    pub fn submerged_specific_gravity(&self) -> f64 {
        self.sediment_density / self.water_density - 1.0
    }

    /// 是否已到达结束时刻
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.elapsed_seconds >= self.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(OverallParameters::default().validate().is_ok());
    }

    #[test]
    fn test_diameters_must_increase() {
        assert!(OverallParameters::with_diameters(vec![0.01, 0.005]).is_err());
        assert!(OverallParameters::with_diameters(vec![]).is_err());
        assert!(OverallParameters::with_diameters(vec![-0.01]).is_err());
        assert!(OverallParameters::with_diameters(vec![0.001, 0.01]).is_ok());
    }

    #[test]
    fn test_submerged_specific_gravity() {
        let p = OverallParameters::default();
        assert!((p.submerged_specific_gravity() - 1.65).abs() < 1e-12);
    }
}
