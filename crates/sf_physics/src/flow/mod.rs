// crates/sf_physics/src/flow/mod.rs

//! 流动过程与变化率编排
//!
//! # 模块结构
//!
//! - `water`: 均匀流量传播，水深流速由阻力关系给出
//! - `sediment`: 推移质输运（输沙能力、时间步长限制、变化量下传与应用）
//!
//! # 每个类别的变化率阶段
//!
//! 水流在前，泥沙在后，每个类别依次执行：
//!
//! 1. 前置阶段：只调用"保证"修正器
//! 2. 刷新依赖参数
//! 3. 收敛循环，第 r 轮：
//!    - 计算该类别的变化率
//!    - 按扫描顺序对每个河段：下传变化率，然后调用修正器主效果
//!    - 更新其他参数（水流：水深与流速），刷新依赖参数
//!    - 任一修正器请求时进入下一轮，轮数上限为 `max_modifier_rounds`
//! 4. 收尾阶段：只调用"保证"修正器
//! 5. 刷新依赖参数（不重新计算水深）

pub mod sediment;
pub mod water;

pub use sediment::{BedloadParams, BedloadTransport};
pub use water::UniformDischarge;

use crate::capacity::{CapacityMethod, TraversalMode};
use crate::hydraulics::HydraulicsMethods;
use crate::modifiers::{FlowCategory, ModifierContext, ModifierGroup};
use crate::network::RiverNetwork;
use crate::parameters::OverallParameters;
use serde::{Deserialize, Serialize};
use sf_foundation::{ReachIndex, SfResult};

/// 流动方法组合
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowMethods {
    /// 水力学方法
    #[serde(default)]
    pub hydraulics: HydraulicsMethods,
    /// 输沙能力
    #[serde(default)]
    pub capacity: CapacityMethod,
    /// 遍历方式
    #[serde(default)]
    pub traversal: TraversalMode,
    /// 推移质输运参数
    #[serde(default)]
    pub bedload: BedloadParams,
}

impl FlowMethods {
    /// 验证参数
    pub fn validate(&self) -> SfResult<()> {
        self.hydraulics.validate()?;
        self.capacity.validate()?;
        self.bedload.validate()
    }
}

/// 流动过程共用的只读上下文
#[derive(Debug, Clone, Copy)]
pub struct FlowContext<'a> {
    /// 全局参数
    pub params: &'a OverallParameters,
    /// 水力学方法
    pub hydraulics: &'a HydraulicsMethods,
}

/// 一个流动类别的物理过程
pub trait FlowProcess: std::fmt::Debug + Send + Sync {
    /// 所属类别
    fn category(&self) -> FlowCategory;

    /// 计算全部河段的变化率
    fn calculate_change_rates(
        &self,
        network: &mut RiverNetwork,
        ctx: &FlowContext<'_>,
    ) -> SfResult<()>;

    /// 把上游河段的变化率下传到本河段
    fn hand_down_change_rate(&self, network: &mut RiverNetwork, idx: ReachIndex);

    /// 变化率确定后更新其他参数
    fn update_other_parameters(&self, _network: &mut RiverNetwork, _ctx: &FlowContext<'_>) {}
}

/// 执行一个类别的变化率阶段（含修正器收敛循环），返回轮数
pub fn modify_change_rates<P: FlowProcess + ?Sized>(
    process: &P,
    mut group: Option<&mut ModifierGroup>,
    network: &mut RiverNetwork,
    ctx: &FlowContext<'_>,
) -> SfResult<usize> {
    let elapsed = ctx.params.elapsed_seconds;
    let max_rounds = ctx.params.max_modifier_rounds;

    if let Some(g) = group.as_deref_mut() {
        g.input_pass(network, &ModifierContext::new(elapsed, 0))?;
    }
    ctx.hydraulics.refresh_dependent_parameters(network, ctx.params);

    let mut round = 0;
    let last = loop {
        let modifier_ctx = ModifierContext::new(elapsed, round);
        process.calculate_change_rates(network, ctx)?;
        let order = network.flow_order().to_vec();
        for idx in order {
            process.hand_down_change_rate(network, idx);
            if let Some(g) = group.as_deref_mut() {
                g.before_updates(network, idx, &modifier_ctx)?;
            }
        }
        process.update_other_parameters(network, ctx);
        ctx.hydraulics.refresh_dependent_parameters(network, ctx.params);
        round += 1;

        let again = group
            .as_deref()
            .is_some_and(|g| g.further_iteration_necessary(&modifier_ctx));
        if !again {
            break modifier_ctx;
        }
        if round >= max_rounds {
            log::warn!(
                "{} 修正器在 {} 轮后仍请求迭代，已截断",
                process.category(),
                max_rounds
            );
            break modifier_ctx;
        }
    };

    if let Some(g) = group.as_deref_mut() {
        g.final_pass(network, &last)?;
    }
    ctx.hydraulics.refresh_dependent_parameters(network, ctx.params);
    log::trace!("{} 变化率阶段完成, {} 轮", process.category(), round);
    Ok(round)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grains::{GrainKind, Grains};
    use crate::modifiers::{ModifierParams, SlopeClamp};
    use crate::reach::Reach;
    use crate::strata::LayerStack;

    fn network() -> RiverNetwork {
        let reach = |id: i64, down: Option<i64>, elevation: f64| {
            let strata =
                LayerStack::new(vec![Grains::from_fractions(GrainKind::Normal, vec![0.1])]).unwrap();
            Reach::new(id, down, 100.0, elevation, strata).with_discharge(1.0)
        };
        RiverNetwork::new(vec![
            reach(1, Some(2), 2.0),
            reach(2, Some(3), 1.0),
            reach(3, None, 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_no_modifiers_single_round() {
        let mut net = network();
        let params = OverallParameters::with_diameters(vec![0.01]).unwrap();
        let hydraulics = HydraulicsMethods::default();
        let ctx = FlowContext {
            params: &params,
            hydraulics: &hydraulics,
        };
        let rounds = modify_change_rates(&UniformDischarge, None, &mut net, &ctx).unwrap();
        assert_eq!(rounds, 1);
        assert_eq!(net.reaches()[2].discharge, 1.0);
        assert!(net.reaches()[1].max_water_depth > 0.0);
    }

    #[test]
    fn test_slope_clamp_requests_second_round() {
        let mut net = network();
        let params = OverallParameters::with_diameters(vec![0.01]).unwrap();
        let hydraulics = HydraulicsMethods::default();
        let ctx = FlowContext {
            params: &params,
            hydraulics: &hydraulics,
        };
        let clamp = SlopeClamp::with_minimum_bed_slope(0.02, FlowCategory::Water);
        let mut group = ModifierGroup::from_params(
            FlowCategory::Water,
            &[ModifierParams::AdjustSlopesAtMargins(clamp)],
        )
        .unwrap();
        let rounds =
            modify_change_rates(&UniformDischarge, Some(&mut group), &mut net, &ctx).unwrap();
        assert_eq!(rounds, 2);
        assert!((net.reaches()[0].bed_slope - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_round_cap() {
        let mut net = network();
        let mut params = OverallParameters::with_diameters(vec![0.01]).unwrap();
        params.max_modifier_rounds = 1;
        let hydraulics = HydraulicsMethods::default();
        let ctx = FlowContext {
            params: &params,
            hydraulics: &hydraulics,
        };
        let clamp = SlopeClamp::with_minimum_bed_slope(0.02, FlowCategory::Water);
        let mut group = ModifierGroup::from_params(
            FlowCategory::Water,
            &[ModifierParams::AdjustSlopesAtMargins(clamp)],
        )
        .unwrap();
        let rounds =
            modify_change_rates(&UniformDischarge, Some(&mut group), &mut net, &ctx).unwrap();
        assert_eq!(rounds, 1);
    }
}
