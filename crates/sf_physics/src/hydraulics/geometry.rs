// crates/sf_physics/src/hydraulics/geometry.rs

//! 河道几何：由水深确定活动宽度

use serde::{Deserialize, Serialize};
use sf_foundation::{SfError, SfResult};

/// 河道断面形状
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChannelGeometry {
    /// 无限深矩形河道，活动宽度恒为河道宽度
    #[default]
    Rectangular,
    /// 无限深 V 形河道
    VShaped {
        /// 张角 [度]，取值 (0, 180)
        opening_angle_degrees: f64,
    },
}

impl ChannelGeometry {
    /// 名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rectangular => "InfinitelyDeepRectangularChannel",
            Self::VShaped { .. } => "InfinitelyDeepVShapedChannel",
        }
    }

    /// 验证参数
    pub fn validate(&self) -> SfResult<()> {
        match *self {
            Self::Rectangular => Ok(()),
            Self::VShaped {
                opening_angle_degrees,
            } => {
                if opening_angle_degrees > 0.0 && opening_angle_degrees < 180.0 {
                    Ok(())
                } else {
                    Err(SfError::invalid_config(
                        "opening_angle_degrees",
                        opening_angle_degrees,
                        "必须在 (0, 180) 内",
                    ))
                }
            }
        }
    }

    /// 活动宽度 [m]
    pub fn active_width(&self, channel_width: f64, depth: f64) -> f64 {
        match *self {
            Self::Rectangular => channel_width,
            Self::VShaped {
                opening_angle_degrees,
            } => 2.0 * depth.max(0.0) * (0.5 * opening_angle_degrees.to_radians()).tan(),
        }
    }
}
