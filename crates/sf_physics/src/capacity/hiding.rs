// crates/sf_physics/src/capacity/hiding.rs

//! 隐蔽函数
//!
//! 隐蔽系数 ξ_i 乘在各分级的临界 Shields 数上：细颗粒被粗颗粒遮蔽时
//! 更难起动，粗颗粒更暴露时更易起动。

use crate::grains::Grains;
use serde::{Deserialize, Serialize};
use sf_foundation::{ensure, SfError, SfResult};

/// 幂律隐蔽函数指数的下界
pub const POWER_LAW_MIN_EXPONENT: f64 = -2.5;
/// 幂律隐蔽函数指数的上界
pub const POWER_LAW_MAX_EXPONENT: f64 = 0.0;

/// 隐蔽函数
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HidingFunction {
    /// 无隐蔽效应，ξ_i = 1
    #[default]
    NoHiding,
    /// 幂律：ξ_i = (d_i / d_ref)^exponent
    PowerLaw {
        /// 参考粒径百分位，取值 [0, 100]
        reference_percentile: f64,
        /// 指数，取值 [-2.5, 0]
        exponent: f64,
    },
}

impl HidingFunction {
    /// 创建幂律隐蔽函数，参数越界时失败
    pub fn power_law(reference_percentile: f64, exponent: f64) -> SfResult<Self> {
        let f = Self::PowerLaw {
            reference_percentile,
            exponent,
        };
        f.validate()?;
        Ok(f)
    }

    /// 名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoHiding => "NoHiding",
            Self::PowerLaw { .. } => "PowerLawHidingFunction",
        }
    }

    /// 验证参数
    pub fn validate(&self) -> SfResult<()> {
        if let Self::PowerLaw {
            reference_percentile,
            exponent,
        } = *self
        {
            ensure!(
                (POWER_LAW_MIN_EXPONENT..=POWER_LAW_MAX_EXPONENT).contains(&exponent),
                SfError::out_of_range(
                    "hiding.exponent",
                    exponent,
                    POWER_LAW_MIN_EXPONENT,
                    POWER_LAW_MAX_EXPONENT
                )
            );
            SfError::check_range("hiding.reference_percentile", reference_percentile, 0.0, 100.0)?;
        }
        Ok(())
    }

    /// 各分级的隐蔽系数
    pub fn factors(&self, basis: &Grains, diameters: &[f64]) -> Vec<f64> {
        match *self {
            Self::NoHiding => vec![1.0; diameters.len()],
            Self::PowerLaw {
                reference_percentile,
                exponent,
            } => match basis.percentile_diameter(diameters, reference_percentile) {
                Some(reference) if reference > 0.0 => diameters
                    .iter()
                    .map(|d| (d / reference).powf(exponent))
                    .collect(),
                _ => vec![1.0; diameters.len()],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grains::GrainKind;

    #[test]
    fn test_exponent_range() {
        assert!(HidingFunction::power_law(50.0, 0.5).is_err());
        assert!(HidingFunction::power_law(50.0, -3.0).is_err());
        assert!(HidingFunction::power_law(120.0, -0.5).is_err());
        assert!(HidingFunction::power_law(50.0, -0.8).is_ok());
    }

    #[test]
    fn test_power_law_factors() {
        let basis = Grains::from_fractions(GrainKind::Normal, vec![1.0, 0.0]);
        let h = HidingFunction::power_law(50.0, -1.0).unwrap();
        // 全部位于第一级，参考粒径为 0.01
        let f = h.factors(&basis, &[0.01, 0.04]);
        assert!((f[0] - 1.0).abs() < 1e-12);
        assert!((f[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_empty_basis_has_no_hiding() {
        let basis = Grains::from_fractions(GrainKind::Normal, vec![0.0, 0.0]);
        let h = HidingFunction::power_law(50.0, -1.0).unwrap();
        assert_eq!(h.factors(&basis, &[0.01, 0.04]), vec![1.0, 1.0]);
    }
}
