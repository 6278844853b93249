// crates/sf_physics/src/capacity/excess_shear.rs

//! 分级超额剪切输沙公式（Meyer-Peter & Müller 形式）
//!
//! ```text
//! θ_i  = τ / ((s-1)·ρ·g·D_i)
//! θc_i = θc·ξ_i
//! q*_i = α·max(θ_i - θc_i, 0)^β
//! q_bi = F_i·q*_i·sqrt((s-1)·g·D_i³)·W
//! ```

use super::{BedloadCapacity, CapacityContext, HidingFunction, InitiationThreshold};
use crate::grains::Grains;
use crate::reach::Reach;
use serde::{Deserialize, Serialize};
use sf_foundation::{ensure, SfError, SfResult};

/// 分级超额剪切公式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FractionalExcessShear {
    /// 系数 α
    #[serde(default = "default_coefficient")]
    pub coefficient: f64,
    /// 指数 β
    #[serde(default = "default_exponent")]
    pub exponent: f64,
    /// 隐蔽函数
    #[serde(default)]
    pub hiding: HidingFunction,
    /// 起动阈值
    #[serde(default)]
    pub threshold: InitiationThreshold,
}

fn default_coefficient() -> f64 {
    8.0
}
fn default_exponent() -> f64 {
    1.5
}

impl Default for FractionalExcessShear {
    fn default() -> Self {
        Self {
            coefficient: default_coefficient(),
            exponent: default_exponent(),
            hiding: HidingFunction::default(),
            threshold: InitiationThreshold::default(),
        }
    }
}

impl FractionalExcessShear {
    /// 验证参数
    pub fn validate(&self) -> SfResult<()> {
        ensure!(
            self.coefficient >= 0.0,
            SfError::invalid_config("coefficient", self.coefficient, "不能为负")
        );
        ensure!(
            self.exponent > 0.0,
            SfError::invalid_config("exponent", self.exponent, "必须为正")
        );
        self.hiding.validate()?;
        self.threshold.validate()
    }
}

impl BedloadCapacity for FractionalExcessShear {
    fn name(&self) -> &'static str {
        "FractionalExcessShear"
    }

    fn capacity_from_basis(
        &self,
        reach: &Reach,
        basis: &Grains,
        ctx: &CapacityContext<'_>,
    ) -> SfResult<Grains> {
        let params = ctx.params;
        let diameters = &params.fractional_grain_diameters;
        let total = basis.overall_volume();
        let s_minus_one = params.submerged_specific_gravity();
        let tau = reach.bed_shear_stress.max(0.0);
        let theta_c = self.threshold.critical_theta(reach.sediment_energy_slope);
        let hiding = self.hiding.factors(basis, diameters);

        let per_fraction = diameters
            .iter()
            .zip(basis.overall_fractional_abundance())
            .zip(hiding)
            .map(|((&d, volume), xi)| {
                let theta = tau / (s_minus_one * params.water_density * params.gravity * d);
                let excess = (theta - theta_c * xi).max(0.0);
                let q_star = self.coefficient * excess.powf(self.exponent);
                let einstein = (s_minus_one * params.gravity * d.powi(3)).sqrt();
                reach.active_width * q_star * einstein * volume / total
            })
            .collect::<Vec<_>>();

        Grains::distribute_fractional_abundance(&per_fraction, basis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::TraversalMode;
    use crate::grains::GrainKind;
    use crate::parameters::OverallParameters;
    use crate::strata::LayerStack;

    fn reach(tau: f64) -> Reach {
        let strata = LayerStack::new(vec![Grains::from_fractions(
            GrainKind::Normal,
            vec![1.0],
        )])
        .unwrap();
        let mut r = Reach::new(1, None, 100.0, 0.0, strata).with_channel_width(2.0);
        r.bed_shear_stress = tau;
        r
    }

    #[test]
    fn test_below_threshold_is_zero() {
        let params = OverallParameters::with_diameters(vec![0.05]).unwrap();
        let ctx = CapacityContext::new(&params, TraversalMode::Sequential);
        let r = reach(10.0);
        let q = FractionalExcessShear::default()
            .capacity_from_basis(&r, r.strata.active(), &ctx)
            .unwrap();
        assert!(q.is_zero());
    }

    #[test]
    fn test_mpm_single_fraction() {
        let params = OverallParameters::with_diameters(vec![0.01]).unwrap();
        let ctx = CapacityContext::new(&params, TraversalMode::Sequential);
        let r = reach(50.0);
        let q = FractionalExcessShear::default()
            .capacity_from_basis(&r, r.strata.active(), &ctx)
            .unwrap();
        let s1 = 1.65;
        let theta: f64 = 50.0 / (s1 * 1000.0 * 9.81 * 0.01);
        let expected = 2.0 * 8.0 * (theta - 0.047).powf(1.5) * (s1 * 9.81 * 1e-6_f64).sqrt();
        assert!((q.overall_volume() - expected).abs() < 1e-12 * expected.max(1.0));
    }

    #[test]
    fn test_invalid_hiding_rejected() {
        let c = FractionalExcessShear {
            hiding: HidingFunction::PowerLaw {
                reference_percentile: 50.0,
                exponent: 0.5,
            },
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }
}
