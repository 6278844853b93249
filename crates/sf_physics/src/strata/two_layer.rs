// crates/sf_physics/src/strata/two_layer.rs

//! 两层连续更新
//!
//! 活动层与底层之间每次交换的量与偏差成正比，使活动层一步落在目标厚度上。
//! 目标厚度可以固定，也可以取参考百分位粒径乘以系数。

use super::{LayerRequirement, LayerStack, StrataSorting, StrataSortingParams};
use serde::{Deserialize, Serialize};
use sf_foundation::{ensure, SfError, SfResult};

/// 动态目标厚度下单次调用的交换次数上限
const MAX_PASSES: usize = 64;

/// 两层连续更新参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoLayerParams {
    /// 活动层目标厚度 [m]（动态模式下为初值）
    pub layer_thickness: f64,
    /// 是否按粒径动态计算目标厚度
    #[serde(default)]
    pub dynamic_layer_thickness: bool,
    /// 动态模式下的粒径系数
    #[serde(default = "default_factor")]
    pub layer_thickness_factor: f64,
    /// 参考百分位
    #[serde(default = "default_percentile")]
    pub reference_percentile: f64,
}

fn default_factor() -> f64 {
    2.0
}
fn default_percentile() -> f64 {
    84.0
}

/// 两层连续更新
#[derive(Debug, Clone, PartialEq)]
pub struct TwoLayerContinuousUpdate {
    layer_thickness: f64,
    dynamic_layer_thickness: bool,
    layer_thickness_factor: f64,
    reference_percentile: f64,
}

impl TwoLayerContinuousUpdate {
    /// 由参数创建并验证
    pub fn new(params: &TwoLayerParams) -> SfResult<Self> {
        ensure!(
            params.layer_thickness > 0.0,
            SfError::invalid_config("layer_thickness", params.layer_thickness, "必须为正")
        );
        ensure!(
            params.layer_thickness_factor > 0.0,
            SfError::invalid_config(
                "layer_thickness_factor",
                params.layer_thickness_factor,
                "必须为正"
            )
        );
        SfError::check_range("reference_percentile", params.reference_percentile, 0.0, 100.0)?;
        Ok(Self {
            layer_thickness: params.layer_thickness,
            dynamic_layer_thickness: params.dynamic_layer_thickness,
            layer_thickness_factor: params.layer_thickness_factor,
            reference_percentile: params.reference_percentile,
        })
    }

    fn update_layer_thickness(&mut self, strata: &LayerStack, diameters: &[f64]) {
        if !self.dynamic_layer_thickness || strata.active_thickness() <= 0.0 {
            return;
        }
        if let Some(d) = strata
            .active()
            .percentile_diameter(diameters, self.reference_percentile)
        {
            self.layer_thickness = self.layer_thickness_factor * d;
        }
    }

    /// 按偏差与当前目标交换一次，返回是否移动了泥沙
    fn exchange(&self, strata: &mut LayerStack) -> bool {
        let active = strata.active_thickness();
        let sublayer = strata.base().overall_volume();
        let target = self.layer_thickness;
        // 浮点误差范围内视为已在目标厚度上
        let tolerance = 1e-12 * target;

        if active < target - tolerance && sublayer > 0.0 {
            let update = strata.base() * ((target - active) / sublayer);
            strata.transfer(1, 0, &update);
            return true;
        }
        if active > target + tolerance {
            let update = strata.active() * ((active - target) / active);
            strata.transfer(0, 1, &update);
            return true;
        }
        false
    }
}

impl StrataSorting for TwoLayerContinuousUpdate {
    fn name(&self) -> &'static str {
        "TwoLayerWithContinuousUpdate"
    }

    fn sort_strata(&mut self, strata: &mut LayerStack, diameters: &[f64]) -> SfResult<bool> {
        ensure!(
            strata.len() == 2,
            SfError::config(format!("{} 需要恰好两层, 实际 {} 层", self.name(), strata.len()))
        );
        let mut moved = false;
        // 动态目标随活动层组成变化，交换后重新计算，直到活动层落在目标上
        for _ in 0..MAX_PASSES {
            self.update_layer_thickness(strata, diameters);
            if !self.exchange(strata) {
                break;
            }
            moved = true;
            if !self.dynamic_layer_thickness {
                break;
            }
        }
        Ok(moved)
    }

    fn layer_thickness(&self) -> f64 {
        self.layer_thickness
    }

    fn required_layers(&self) -> LayerRequirement {
        LayerRequirement::Exactly(2)
    }

    fn params(&self) -> StrataSortingParams {
        StrataSortingParams::TwoLayerContinuous(TwoLayerParams {
            layer_thickness: self.layer_thickness,
            dynamic_layer_thickness: self.dynamic_layer_thickness,
            layer_thickness_factor: self.layer_thickness_factor,
            reference_percentile: self.reference_percentile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grains::{GrainKind, Grains};

    fn params(lt: f64) -> TwoLayerParams {
        TwoLayerParams {
            layer_thickness: lt,
            dynamic_layer_thickness: false,
            layer_thickness_factor: 2.0,
            reference_percentile: 84.0,
        }
    }

    fn layer(v: &[f64]) -> Grains {
        Grains::from_fractions(GrainKind::Normal, v.to_vec())
    }

    #[test]
    fn test_validation() {
        assert!(TwoLayerContinuousUpdate::new(&params(0.0)).is_err());
        let mut p = params(0.1);
        p.layer_thickness_factor = -1.0;
        assert!(TwoLayerContinuousUpdate::new(&p).is_err());
    }

    #[test]
    fn test_lands_on_target_in_one_call() {
        let mut s = TwoLayerContinuousUpdate::new(&params(0.2)).unwrap();
        let mut strata = LayerStack::new(vec![layer(&[0.05, 0.05]), layer(&[0.5, 1.5])]).unwrap();
        let before = strata.total_volume();
        assert!(s.sort_strata(&mut strata, &[0.01, 0.02]).unwrap());
        assert!((strata.active_thickness() - 0.2).abs() < 1e-12);
        assert!((strata.total_volume() - before).abs() < 1e-12);
        // 从底层按组成比例取料
        let a = strata.active();
        assert!((a.get(GrainKind::Normal, 1) - (0.05 + 0.075)).abs() < 1e-12);
        assert!(!s.sort_strata(&mut strata, &[0.01, 0.02]).unwrap());
    }

    #[test]
    fn test_downward_exchange() {
        let mut s = TwoLayerContinuousUpdate::new(&params(0.2)).unwrap();
        let mut strata = LayerStack::new(vec![layer(&[0.5]), layer(&[0.1])]).unwrap();
        assert!(s.sort_strata(&mut strata, &[0.01]).unwrap());
        assert!((strata.active_thickness() - 0.2).abs() < 1e-12);
        assert!((strata.base().overall_volume() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_requires_two_layers() {
        let mut s = TwoLayerContinuousUpdate::new(&params(0.2)).unwrap();
        let mut strata =
            LayerStack::new(vec![layer(&[0.5]), layer(&[0.1]), layer(&[0.1])]).unwrap();
        assert!(s.sort_strata(&mut strata, &[0.01]).is_err());
    }

    #[test]
    fn test_dynamic_target_reached_within_one_call() {
        // 细颗粒活动层自粗颗粒底层取料后 D84 变粗，目标厚度随之增大
        let mut p = params(0.01);
        p.dynamic_layer_thickness = true;
        let mut s = TwoLayerContinuousUpdate::new(&p).unwrap();
        let diameters = [0.004, 0.016];
        let mut strata = LayerStack::new(vec![layer(&[0.002, 0.0]), layer(&[0.0, 1.0])]).unwrap();
        let before = strata.total_volume();
        assert!(s.sort_strata(&mut strata, &diameters).unwrap());
        assert!((strata.active_thickness() - s.layer_thickness()).abs() < 1e-12);
        assert!((strata.total_volume() - before).abs() < 1e-12);

        let snapshot = strata.clone();
        assert!(!s.sort_strata(&mut strata, &diameters).unwrap());
        assert_eq!(strata, snapshot);
    }
}
