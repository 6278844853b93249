// crates/sf_physics/src/capacity/threshold.rs

//! 起动阈值（临界 Shields 数）

use serde::{Deserialize, Serialize};
use sf_foundation::{ensure, SfError, SfResult};

/// 起动阈值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InitiationThreshold {
    /// 常数临界 Shields 数
    Constant {
        /// θc
        #[serde(default = "default_critical_theta")]
        critical_theta: f64,
    },
    /// Lamb 等的坡度相关临界 Shields 数：θc = 0.15·S^0.25
    LambEtAl,
}

fn default_critical_theta() -> f64 {
    0.047
}

impl Default for InitiationThreshold {
    fn default() -> Self {
        Self::Constant {
            critical_theta: default_critical_theta(),
        }
    }
}

impl InitiationThreshold {
    /// 名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Constant { .. } => "ConstantThresholdForInitiationOfBedloadMotion",
            Self::LambEtAl => "LambEtAlCriticalTheta",
        }
    }

    /// 验证参数
    pub fn validate(&self) -> SfResult<()> {
        if let Self::Constant { critical_theta } = *self {
            ensure!(
                critical_theta >= 0.0 && critical_theta.is_finite(),
                SfError::invalid_config("critical_theta", critical_theta, "必须为非负有限值")
            );
        }
        Ok(())
    }

    /// 临界 Shields 数
    pub fn critical_theta(&self, slope: f64) -> f64 {
        match *self {
            Self::Constant { critical_theta } => critical_theta,
            Self::LambEtAl => 0.15 * slope.max(0.0).powf(0.25),
        }
    }
}
