// crates/sf_physics/src/strata/mod.rs

//! 地层分选模块
//!
//! 每个河段在泥沙搬运之后调用一次地层分选，使活动层厚度回到目标范围内。
//!
//! # 模块结构
//!
//! - `layer_stack`: 地层柱（活动层在前，底层在后）
//! - `threshold`: 基于阈值带的更新（静态或按粒径动态），循环至收敛
//! - `constant_threshold`: 固定参考层厚的旧版阈值更新，每次最多一步
//! - `two_layer`: 两层连续更新，一步落到目标厚度
//! - `single_layer`: 单层不分选
//!
//! # 共同约定
//!
//! `sort_strata` 返回是否移动了泥沙；任何实现都只在层之间搬运，
//! 不产生也不消灭泥沙。层数不符合实现要求属于配置错误。
//!
//! # 使用示例
//!
//! ```ignore
//! let mut method = StrataSortingMethod::from_params(&params)?;
//! method.check_layers(&strata)?;
//! let moved = method.sort_strata(&mut strata, &diameters)?;
//! ```

pub mod constant_threshold;
pub mod layer_stack;
pub mod single_layer;
pub mod threshold;
pub mod two_layer;

pub use constant_threshold::{ConstantThresholdParams, ConstantThresholdStratigraphy};
pub use layer_stack::LayerStack;
pub use single_layer::SingleLayerNoSorting;
pub use threshold::{ThresholdBand, ThresholdBasedStratigraphy, ThresholdSortingParams};
pub use two_layer::{TwoLayerContinuousUpdate, TwoLayerParams};

use serde::{Deserialize, Serialize};
use sf_foundation::{SfError, SfResult};

/// 层数要求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRequirement {
    /// 至少 n 层
    AtLeast(usize),
    /// 恰好 n 层
    Exactly(usize),
}

impl LayerRequirement {
    /// 检查层数
    pub fn check(&self, name: &str, layers: usize) -> SfResult<()> {
        let ok = match *self {
            Self::AtLeast(n) => layers >= n,
            Self::Exactly(n) => layers == n,
        };
        if ok {
            Ok(())
        } else {
            Err(SfError::invalid_config(
                "strata",
                layers,
                format!("{} 要求层数 {:?}", name, self),
            ))
        }
    }
}

/// 地层分选策略
pub trait StrataSorting: Send + Sync + std::fmt::Debug {
    /// 策略名称
    fn name(&self) -> &'static str;

    /// 分选地层，返回是否移动了泥沙
    fn sort_strata(&mut self, strata: &mut LayerStack, diameters: &[f64]) -> SfResult<bool>;

    /// 当前活动层目标厚度 [m]
    fn layer_thickness(&self) -> f64;

    /// 层数要求
    fn required_layers(&self) -> LayerRequirement;

    /// 导出构造参数
    fn params(&self) -> StrataSortingParams;
}

/// 地层分选构造参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StrataSortingParams {
    /// 基于阈值带
    ThresholdBased(ThresholdSortingParams),
    /// 旧版固定参考层厚
    ConstantThreshold(ConstantThresholdParams),
    /// 两层连续更新
    TwoLayerContinuous(TwoLayerParams),
    /// 单层不分选
    SingleLayerNoSorting,
}

impl Default for StrataSortingParams {
    fn default() -> Self {
        Self::SingleLayerNoSorting
    }
}

/// 地层分选方法（封闭变体集合）
#[derive(Debug, Clone, PartialEq)]
pub enum StrataSortingMethod {
    /// 基于阈值带
    ThresholdBased(ThresholdBasedStratigraphy),
    /// 旧版固定参考层厚
    ConstantThreshold(ConstantThresholdStratigraphy),
    /// 两层连续更新
    TwoLayerContinuous(TwoLayerContinuousUpdate),
    /// 单层不分选
    SingleLayerNoSorting(SingleLayerNoSorting),
}

macro_rules! dispatch {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            StrataSortingMethod::ThresholdBased($s) => $body,
            StrataSortingMethod::ConstantThreshold($s) => $body,
            StrataSortingMethod::TwoLayerContinuous($s) => $body,
            StrataSortingMethod::SingleLayerNoSorting($s) => $body,
        }
    };
}

impl StrataSortingMethod {
    /// 由参数构造，参数非法时构造失败
    pub fn from_params(params: &StrataSortingParams) -> SfResult<Self> {
        Ok(match params {
            StrataSortingParams::ThresholdBased(p) => {
                Self::ThresholdBased(ThresholdBasedStratigraphy::new(p.clone())?)
            }
            StrataSortingParams::ConstantThreshold(p) => {
                Self::ConstantThreshold(ConstantThresholdStratigraphy::from_params(p)?)
            }
            StrataSortingParams::TwoLayerContinuous(p) => {
                Self::TwoLayerContinuous(TwoLayerContinuousUpdate::new(p)?)
            }
            StrataSortingParams::SingleLayerNoSorting => {
                Self::SingleLayerNoSorting(SingleLayerNoSorting)
            }
        })
    }

    /// 检查地层柱层数是否满足要求
    pub fn check_layers(&self, strata: &LayerStack) -> SfResult<()> {
        self.required_layers().check(self.name(), strata.len())
    }
}

impl Default for StrataSortingMethod {
    fn default() -> Self {
        Self::SingleLayerNoSorting(SingleLayerNoSorting)
    }
}

impl StrataSorting for StrataSortingMethod {
    fn name(&self) -> &'static str {
        dispatch!(self, s => s.name())
    }

    fn sort_strata(&mut self, strata: &mut LayerStack, diameters: &[f64]) -> SfResult<bool> {
        dispatch!(self, s => s.sort_strata(strata, diameters))
    }

    fn layer_thickness(&self) -> f64 {
        dispatch!(self, s => s.layer_thickness())
    }

    fn required_layers(&self) -> LayerRequirement {
        dispatch!(self, s => s.required_layers())
    }

    fn params(&self) -> StrataSortingParams {
        dispatch!(self, s => s.params())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_roundtrip_through_method() {
        let params = StrataSortingParams::ConstantThreshold(ConstantThresholdParams {
            layer_thickness: 0.1,
            minimum_factor: 0.5,
            maximum_factor: 2.0,
        });
        let method = StrataSortingMethod::from_params(&params).unwrap();
        assert_eq!(method.name(), "StratigraphyWithOLDConstantThresholdBasedUpdate");
        assert_eq!(method.params(), params);
    }

    #[test]
    fn test_invalid_params_fail_construction() {
        let params = StrataSortingParams::ConstantThreshold(ConstantThresholdParams {
            layer_thickness: 0.1,
            minimum_factor: 1.2,
            maximum_factor: 1.0,
        });
        assert!(StrataSortingMethod::from_params(&params).is_err());
    }

    #[test]
    fn test_serde_tagged() {
        let json = r#"{"type":"TwoLayerContinuous","layer_thickness":0.1}"#;
        let params: StrataSortingParams = serde_json::from_str(json).unwrap();
        match params {
            StrataSortingParams::TwoLayerContinuous(p) => {
                assert_eq!(p.layer_thickness, 0.1);
                assert_eq!(p.reference_percentile, 84.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_layer_requirement() {
        assert!(LayerRequirement::AtLeast(2).check("x", 1).is_err());
        assert!(LayerRequirement::Exactly(1).check("x", 1).is_ok());
    }
}
