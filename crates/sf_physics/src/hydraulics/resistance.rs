// crates/sf_physics/src/hydraulics/resistance.rs

//! 流动阻力
//!
//! 由流量、宽度和能坡反算正常水深与断面平均流速（宽浅矩形断面假定）。
//!
//! - 固定幂律: v/u* = a·(h / (k·D84))^b，u* = sqrt(g·h·S)
//! - Manning: v = h^(2/3)·S^(1/2) / n
//!
//! 无水、平坡或零宽度时水深与流速均为零。

use serde::{Deserialize, Serialize};
use sf_foundation::{ensure, SfError, SfResult};

/// 水深与流速
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlowState {
    /// 水深 [m]
    pub depth: f64,
    /// 断面平均流速 [m/s]
    pub velocity: f64,
}

impl FlowState {
    /// 干河段
    pub const DRY: Self = Self {
        depth: 0.0,
        velocity: 0.0,
    };
}

/// 流动阻力关系
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FlowResistance {
    /// 固定幂律阻力
    FixedPowerLaw {
        /// 系数 a
        #[serde(default = "default_power_law_factor")]
        factor: f64,
        /// 指数 b
        #[serde(default = "default_power_law_exponent")]
        exponent: f64,
        /// 粗糙高度相对 D84 的倍数 k
        #[serde(default = "default_grains_factor")]
        grains_factor: f64,
    },
    /// Manning 公式
    Manning {
        /// 糙率 n [s/m^(1/3)]
        n: f64,
    },
}

fn default_power_law_factor() -> f64 {
    6.5
}
fn default_power_law_exponent() -> f64 {
    1.0 / 6.0
}
fn default_grains_factor() -> f64 {
    1.0
}

impl Default for FlowResistance {
    fn default() -> Self {
        Self::FixedPowerLaw {
            factor: default_power_law_factor(),
            exponent: default_power_law_exponent(),
            grains_factor: default_grains_factor(),
        }
    }
}

impl FlowResistance {
    /// 名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::FixedPowerLaw { .. } => "FixedPowerLawFlowResistance",
            Self::Manning { .. } => "ManningFlowResistance",
        }
    }

    /// 验证参数
    pub fn validate(&self) -> SfResult<()> {
        match *self {
            Self::FixedPowerLaw {
                factor,
                exponent,
                grains_factor,
            } => {
                ensure!(
                    factor > 0.0,
                    SfError::invalid_config("flow_resistance.factor", factor, "必须为正")
                );
                ensure!(
                    exponent > -1.5 && exponent.is_finite(),
                    SfError::invalid_config("flow_resistance.exponent", exponent, "必须大于 -1.5")
                );
                ensure!(
                    grains_factor > 0.0,
                    SfError::invalid_config("flow_resistance.grains_factor", grains_factor, "必须为正")
                );
            }
            Self::Manning { n } => {
                ensure!(
                    n > 0.0,
                    SfError::invalid_config("flow_resistance.n", n, "必须为正")
                );
            }
        }
        Ok(())
    }

    /// 由流量计算水深与流速
    ///
    /// `d84` 为活动层 84% 粒径，仅幂律阻力使用。
    pub fn flow_state(
        &self,
        discharge: f64,
        width: f64,
        slope: f64,
        d84: f64,
        gravity: f64,
    ) -> FlowState {
        if discharge <= 0.0 || width <= 0.0 || slope <= 0.0 {
            return FlowState::DRY;
        }
        let q = discharge / width;
        let depth = match *self {
            Self::FixedPowerLaw {
                factor,
                exponent,
                grains_factor,
            } => {
                let roughness = grains_factor * d84;
                if roughness <= 0.0 {
                    return FlowState::DRY;
                }
                // q = a·sqrt(gS)·(k·D84)^(-b)·h^(1.5+b)
                let coefficient = factor * (gravity * slope).sqrt() * roughness.powf(-exponent);
                (q / coefficient).powf(1.0 / (1.5 + exponent))
            }
            Self::Manning { n } => (q * n / slope.sqrt()).powf(0.6),
        };
        if !depth.is_finite() || depth <= 0.0 {
            return FlowState::DRY;
        }
        FlowState {
            depth,
            velocity: q / depth,
        }
    }
}
