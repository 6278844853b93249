// crates/sf_physics/src/flow/water.rs

//! 均匀流量传播
//!
//! 非上游边界河段的流量等于其全部上游河段流量之和（出口也不例外），
//! 按拓扑顺序传播；上游边界的流量由初始状态或修正器给出。

use super::{FlowContext, FlowProcess};
use crate::modifiers::FlowCategory;
use crate::network::RiverNetwork;
use sf_foundation::{ReachIndex, SfResult};

/// 均匀流量传播
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniformDischarge;

impl FlowProcess for UniformDischarge {
    fn category(&self) -> FlowCategory {
        FlowCategory::Water
    }

    fn calculate_change_rates(
        &self,
        network: &mut RiverNetwork,
        _ctx: &FlowContext<'_>,
    ) -> SfResult<()> {
        let order = network.flow_order().to_vec();
        for idx in order {
            self.hand_down_change_rate(network, idx);
        }
        Ok(())
    }

    fn hand_down_change_rate(&self, network: &mut RiverNetwork, idx: ReachIndex) {
        if !network[idx].is_upstream_margin() {
            let inflow = network.inflow(idx);
            network[idx].discharge = inflow;
        }
    }

    fn update_other_parameters(&self, network: &mut RiverNetwork, ctx: &FlowContext<'_>) {
        ctx.hydraulics.update_flow_state(network, ctx.params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grains::{GrainKind, Grains};
    use crate::hydraulics::HydraulicsMethods;
    use crate::parameters::OverallParameters;
    use crate::reach::Reach;
    use crate::strata::LayerStack;

    #[test]
    fn test_confluence_sums_discharge() {
        let reach = |id: i64, down: Option<i64>, q: f64| {
            let strata =
                LayerStack::new(vec![Grains::from_fractions(GrainKind::Normal, vec![0.1])]).unwrap();
            Reach::new(id, down, 50.0, 0.0, strata).with_discharge(q)
        };
        let mut net = RiverNetwork::new(vec![
            reach(1, Some(3), 1.5),
            reach(2, Some(3), 2.5),
            reach(3, Some(4), 0.0),
            reach(4, None, 9.0),
        ])
        .unwrap();
        let params = OverallParameters::default();
        let hydraulics = HydraulicsMethods::default();
        let ctx = FlowContext {
            params: &params,
            hydraulics: &hydraulics,
        };
        UniformDischarge.calculate_change_rates(&mut net, &ctx).unwrap();
        let q: Vec<f64> = net.reaches().iter().map(|r| r.discharge).collect();
        assert_eq!(q, vec![1.5, 2.5, 4.0, 4.0]);
    }
}
