// crates/sf_physics/src/strata/constant_threshold.rs

//! 固定参考层厚的旧版阈值地层更新
//!
//! 上下限表示为固定参考层厚的倍数。活动层过薄时每次调用只上移一层；
//! 过厚时按超出的整层数一次性下移若干层。

use super::{LayerRequirement, LayerStack, StrataSorting, StrataSortingParams};
use serde::{Deserialize, Serialize};
use sf_foundation::{ensure, SfError, SfResult};

/// 旧版阈值地层更新参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantThresholdParams {
    /// 参考层厚 [m]
    pub layer_thickness: f64,
    /// 下限系数，取值 [0, 1]
    pub minimum_factor: f64,
    /// 上限系数，不小于 1 且不小于下限系数 + 1
    pub maximum_factor: f64,
}

/// 旧版阈值地层更新
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantThresholdStratigraphy {
    layer_thickness: f64,
    minimum_factor: f64,
    maximum_factor: f64,
}

impl ConstantThresholdStratigraphy {
    /// 创建并验证
    pub fn new(layer_thickness: f64, minimum_factor: f64, maximum_factor: f64) -> SfResult<Self> {
        ensure!(
            layer_thickness > 0.0,
            SfError::invalid_config("layer_thickness", layer_thickness, "必须为正")
        );
        ensure!(
            maximum_factor >= 1.0,
            SfError::invalid_config("maximum_factor", maximum_factor, "上限系数小于 1")
        );
        ensure!(
            minimum_factor >= 0.0,
            SfError::invalid_config("minimum_factor", minimum_factor, "下限系数为负")
        );
        ensure!(
            minimum_factor <= 1.0,
            SfError::invalid_config("minimum_factor", minimum_factor, "下限系数大于 1")
        );
        // 一次修正后不能越过另一侧阈值
        ensure!(
            minimum_factor + 1.0 <= maximum_factor,
            SfError::invalid_config(
                "maximum_factor",
                maximum_factor,
                format!("下限系数 {} 加 1 大于上限系数", minimum_factor)
            )
        );
        Ok(Self {
            layer_thickness,
            minimum_factor,
            maximum_factor,
        })
    }

    /// 由参数创建
    pub fn from_params(params: &ConstantThresholdParams) -> SfResult<Self> {
        Self::new(
            params.layer_thickness,
            params.minimum_factor,
            params.maximum_factor,
        )
    }
}

impl StrataSorting for ConstantThresholdStratigraphy {
    fn name(&self) -> &'static str {
        "StratigraphyWithOLDConstantThresholdBasedUpdate"
    }

    fn sort_strata(&mut self, strata: &mut LayerStack, _diameters: &[f64]) -> SfResult<bool> {
        ensure!(
            strata.len() >= 2,
            SfError::config(format!("{} 至少需要两层, 实际 {} 层", self.name(), strata.len()))
        );
        let lt = self.layer_thickness;
        let active = strata.active_thickness();

        if active < lt * self.minimum_factor {
            strata.lift_one_layer(|base| {
                let per_unit = (base.overall_volume() / lt).max(1.0);
                base * (1.0 / per_unit)
            });
            return Ok(true);
        }

        if active > lt * self.maximum_factor {
            let mut n_layers = (active / lt) as usize;
            if active - n_layers as f64 * lt < self.minimum_factor * lt {
                n_layers = n_layers.saturating_sub(1);
            }
            let update = strata.active() * (lt / active);
            for _ in 0..n_layers {
                strata.lower_one_layer(&update);
            }
            return Ok(true);
        }

        Ok(false)
    }

    fn layer_thickness(&self) -> f64 {
        self.layer_thickness
    }

    fn required_layers(&self) -> LayerRequirement {
        LayerRequirement::AtLeast(2)
    }

    fn params(&self) -> StrataSortingParams {
        StrataSortingParams::ConstantThreshold(ConstantThresholdParams {
            layer_thickness: self.layer_thickness,
            minimum_factor: self.minimum_factor,
            maximum_factor: self.maximum_factor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grains::{GrainKind, Grains};

    fn layer(v: f64) -> Grains {
        Grains::from_fractions(GrainKind::Normal, vec![v])
    }

    #[test]
    fn test_factor_validation() {
        assert!(ConstantThresholdStratigraphy::new(0.1, 1.2, 1.0).is_err());
        assert!(ConstantThresholdStratigraphy::new(0.1, 0.5, 0.9).is_err());
        assert!(ConstantThresholdStratigraphy::new(0.1, -0.1, 2.0).is_err());
        assert!(ConstantThresholdStratigraphy::new(0.1, 0.6, 1.5).is_err());
        assert!(ConstantThresholdStratigraphy::new(0.1, 0.5, 1.5).is_ok());
    }

    #[test]
    fn test_single_lift_per_call() {
        let mut s = ConstantThresholdStratigraphy::new(0.1, 0.5, 2.0).unwrap();
        let mut strata = LayerStack::new(vec![layer(0.01), layer(0.05), layer(1.0)]).unwrap();
        assert!(s.sort_strata(&mut strata, &[0.01]).unwrap());
        let v: Vec<f64> = strata.layers().iter().map(Grains::overall_volume).collect();
        assert!((v[0] - 0.06).abs() < 1e-12);
        assert!((v[1] - 0.1).abs() < 1e-12);
        assert!((v[2] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_lower_by_whole_layers() {
        let mut s = ConstantThresholdStratigraphy::new(0.1, 0.5, 2.0).unwrap();
        let mut strata = LayerStack::new(vec![layer(0.37), layer(1.0)]).unwrap();
        let before = strata.total_volume();
        assert!(s.sort_strata(&mut strata, &[0.01]).unwrap());
        // 0.37 / 0.1 = 3 层, 余 0.07 >= 0.05, 不减
        assert!((strata.active_thickness() - 0.07).abs() < 1e-12);
        assert!((strata.total_volume() - before).abs() < 1e-12);
    }
}
