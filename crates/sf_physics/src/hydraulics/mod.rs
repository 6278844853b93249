// crates/sf_physics/src/hydraulics/mod.rs

//! 水力学与依赖参数
//!
//! 修正器和流动过程改写高程、水深或流量之后，需要刷新依赖它们的量：
//!
//! 1. 床面坡度：下游两河段差分，下游出口使用其第一个上游河段
//! 2. 水流能坡：床面坡度或水面坡度；泥沙能坡取水流能坡
//! 3. 床面剪切应力 τ = ρ·g·h·S
//! 4. 活动宽度：由河道几何与水深确定
//!
//! 水深与流速由阻力关系单独更新（[`HydraulicsMethods::update_flow_state`]），
//! 只在水流过程的每轮计算之后调用，刷新依赖参数时不覆盖水深。

pub mod geometry;
pub mod resistance;

pub use geometry::ChannelGeometry;
pub use resistance::{FlowResistance, FlowState};

use crate::network::RiverNetwork;
use crate::parameters::OverallParameters;
use crate::reach::Reach;
use serde::{Deserialize, Serialize};
use sf_foundation::{ReachIndex, SfResult};

/// 能坡计算方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnergySlopeMethod {
    /// 取床面坡度
    #[default]
    BedSlope,
    /// 取水面坡度
    WaterSurfaceSlope,
}

/// 水力学方法组合
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HydraulicsMethods {
    /// 流动阻力
    #[serde(default)]
    pub flow_resistance: FlowResistance,
    /// 河道几何
    #[serde(default)]
    pub channel_geometry: ChannelGeometry,
    /// 能坡
    #[serde(default)]
    pub energy_slope: EnergySlopeMethod,
}

impl HydraulicsMethods {
    /// 验证参数
    pub fn validate(&self) -> SfResult<()> {
        self.flow_resistance.validate()?;
        self.channel_geometry.validate()
    }

    /// 由阻力关系更新全部河段的水深与流速
    pub fn update_flow_state(&self, network: &mut RiverNetwork, params: &OverallParameters) {
        let largest = params
            .fractional_grain_diameters
            .last()
            .copied()
            .unwrap_or(0.0);
        for reach in network.reaches_mut() {
            let d84 = reach
                .strata
                .active()
                .percentile_diameter(&params.fractional_grain_diameters, 84.0)
                .unwrap_or(largest);
            let state = self.flow_resistance.flow_state(
                reach.discharge,
                reach.channel_width,
                reach.water_energy_slope,
                d84,
                params.gravity,
            );
            reach.max_water_depth = state.depth;
            reach.flow_velocity = state.velocity;
        }
    }

    /// 刷新依赖参数（坡度、剪切应力、活动宽度）
    pub fn refresh_dependent_parameters(
        &self,
        network: &mut RiverNetwork,
        params: &OverallParameters,
    ) {
        let n = network.len();
        let bed: Vec<f64> = (0..n)
            .map(|i| bed_slope(network, ReachIndex::from_usize(i)))
            .collect();
        let surface: Vec<f64> = (0..n)
            .map(|i| water_surface_slope(network, ReachIndex::from_usize(i)))
            .collect();

        let rho_g = params.water_density * params.gravity;
        for (i, reach) in network.reaches_mut().iter_mut().enumerate() {
            reach.bed_slope = bed[i];
            reach.water_energy_slope = match self.energy_slope {
                EnergySlopeMethod::BedSlope => bed[i],
                EnergySlopeMethod::WaterSurfaceSlope => surface[i],
            };
            reach.sediment_energy_slope = reach.water_energy_slope;
            reach.bed_shear_stress =
                bed_shear_stress(rho_g, reach.max_water_depth, reach.sediment_energy_slope);
            reach.active_width = self
                .channel_geometry
                .active_width(reach.channel_width, reach.max_water_depth);
        }
    }
}

// ============================================================================
// 坡度与剪切应力
// ============================================================================

fn two_cell_gradient(network: &RiverNetwork, idx: ReachIndex, value: fn(&Reach) -> f64) -> f64 {
    let reach = &network[idx];
    let (upper, lower) = match (reach.downstream(), reach.upstream().first()) {
        (Some(d), _) => (reach, &network[d]),
        (None, Some(&u)) => (&network[u], reach),
        (None, None) => return 0.0,
    };
    let distance = upper.center_distance(lower);
    if distance <= 0.0 {
        return 0.0;
    }
    (value(upper) - value(lower)) / distance
}

/// 床面坡度（下游两河段差分）
pub fn bed_slope(network: &RiverNetwork, idx: ReachIndex) -> f64 {
    two_cell_gradient(network, idx, |r| r.elevation)
}

/// 水面坡度（下游两河段差分）
pub fn water_surface_slope(network: &RiverNetwork, idx: ReachIndex) -> f64 {
    two_cell_gradient(network, idx, Reach::water_level)
}

/// 床面剪切应力 τ = ρ·g·h·S，负坡按零处理
#[inline]
pub fn bed_shear_stress(rho_g: f64, depth: f64, slope: f64) -> f64 {
    rho_g * depth.max(0.0) * slope.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grains::{GrainKind, Grains};
    use crate::strata::LayerStack;

    fn reach(id: i64, down: Option<i64>, elevation: f64) -> Reach {
        let strata = LayerStack::new(vec![Grains::from_fractions(
            GrainKind::Normal,
            vec![0.1, 0.1],
        )])
        .unwrap();
        Reach::new(id, down, 100.0, elevation, strata).with_channel_width(4.0)
    }

    fn chain() -> RiverNetwork {
        RiverNetwork::new(vec![
            reach(1, Some(2), 2.0),
            reach(2, Some(3), 1.0),
            reach(3, None, 0.5),
        ])
        .unwrap()
    }

    #[test]
    fn test_bed_slopes() {
        let net = chain();
        assert!((bed_slope(&net, ReachIndex::from_usize(0)) - 0.01).abs() < 1e-12);
        assert!((bed_slope(&net, ReachIndex::from_usize(1)) - 0.005).abs() < 1e-12);
        // 出口使用上游河段
        assert!((bed_slope(&net, ReachIndex::from_usize(2)) - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_single_reach_has_zero_slope() {
        let net = RiverNetwork::new(vec![reach(1, None, 3.0)]).unwrap();
        assert_eq!(bed_slope(&net, ReachIndex::from_usize(0)), 0.0);
    }

    #[test]
    fn test_refresh_then_flow_state() {
        let mut net = chain();
        let params = OverallParameters::with_diameters(vec![0.01, 0.04]).unwrap();
        let methods = HydraulicsMethods::default();
        for r in net.reaches_mut() {
            r.discharge = 2.0;
        }
        methods.refresh_dependent_parameters(&mut net, &params);
        methods.update_flow_state(&mut net, &params);
        methods.refresh_dependent_parameters(&mut net, &params);
        let r = &net.reaches()[0];
        assert!(r.max_water_depth > 0.0);
        let tau = 1000.0 * 9.81 * r.max_water_depth * 0.01;
        assert!((r.bed_shear_stress - tau).abs() < 1e-9);
        assert_eq!(r.active_width, 4.0);
    }
}
