// crates/sf_physics/src/strata/single_layer.rs

//! 单层不分选：全部冲积物始终位于同一层

use super::{LayerRequirement, LayerStack, StrataSorting, StrataSortingParams};
use sf_foundation::{ensure, SfError, SfResult};

/// 单层不分选
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SingleLayerNoSorting;

impl StrataSorting for SingleLayerNoSorting {
    fn name(&self) -> &'static str {
        "SingleLayerNoSorting"
    }

    fn sort_strata(&mut self, strata: &mut LayerStack, _diameters: &[f64]) -> SfResult<bool> {
        ensure!(
            strata.len() == 1,
            SfError::config(format!("{} 需要恰好一层, 实际 {} 层", self.name(), strata.len()))
        );
        Ok(false)
    }

    fn layer_thickness(&self) -> f64 {
        f64::INFINITY
    }

    fn required_layers(&self) -> LayerRequirement {
        LayerRequirement::Exactly(1)
    }

    fn params(&self) -> StrataSortingParams {
        StrataSortingParams::SingleLayerNoSorting
    }
}
