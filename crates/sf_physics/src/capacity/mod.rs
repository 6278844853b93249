// crates/sf_physics/src/capacity/mod.rs

//! 推移质输沙能力
//!
//! # 模块结构
//!
//! - `wilcock_crowe`: Wilcock & Crowe 表层分级公式（自带隐蔽函数）
//! - `excess_shear`: Meyer-Peter & Müller 形式的分级超额剪切公式
//! - `hiding`: 隐蔽函数
//! - `threshold`: 起动阈值
//!
//! # 上游旁通
//!
//! 河段活动层体积不超过 [`SEDIMENT_VOLUME_EPS`](sf_foundation::SEDIMENT_VOLUME_EPS) 时，公式的粒径分布基底改为
//! 全部上游河段的贡献之和：
//!
//! - 顺序遍历且河段编号沿下游递增时，编号较小的上游河段已在本轮扫描中
//!   算过，直接取其冲刷率
//! - 其余情况（并行遍历、编号不单调、上游编号更大）递归计算该上游河段的输沙能力
//!
//! 替代基底仍不超过阈值时结果为零向量，不是错误。

pub mod excess_shear;
pub mod hiding;
pub mod threshold;
pub mod wilcock_crowe;

pub use excess_shear::FractionalExcessShear;
pub use hiding::HidingFunction;
pub use threshold::InitiationThreshold;
pub use wilcock_crowe::WilcockCrowe;

use crate::grains::Grains;
use crate::network::RiverNetwork;
use crate::parameters::OverallParameters;
use crate::reach::Reach;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sf_foundation::{is_empty_volume, ReachIndex, SfResult};

/// 河网遍历方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraversalMode {
    /// 按编号升序单线程扫描，允许取用已算出的上游冲刷率
    #[default]
    Sequential,
    /// 并行计算，旁通时总是递归
    Parallel,
}

/// 输沙能力计算上下文
#[derive(Debug, Clone, Copy)]
pub struct CapacityContext<'a> {
    /// 全局参数
    pub params: &'a OverallParameters,
    /// 遍历方式
    pub mode: TraversalMode,
}

impl<'a> CapacityContext<'a> {
    /// 创建上下文
    pub fn new(params: &'a OverallParameters, mode: TraversalMode) -> Self {
        Self { params, mode }
    }

    /// 是否允许取用已算出的上游冲刷率
    #[inline]
    fn shortcut_allowed(&self, network: &RiverNetwork) -> bool {
        self.mode == TraversalMode::Sequential && network.is_monotonic()
    }
}

/// 输沙能力策略
pub trait BedloadCapacity: Send + Sync + std::fmt::Debug {
    /// 策略名称
    fn name(&self) -> &'static str;

    /// 在给定粒径分布基底上计算输沙能力 [m³/s]
    ///
    /// 调用方保证 `basis` 总体积大于 [`SEDIMENT_VOLUME_EPS`](sf_foundation::SEDIMENT_VOLUME_EPS)。
    fn capacity_from_basis(
        &self,
        reach: &Reach,
        basis: &Grains,
        ctx: &CapacityContext<'_>,
    ) -> SfResult<Grains>;

    /// 计算河段输沙能力（含上游旁通）
    fn calculate(
        &self,
        network: &RiverNetwork,
        idx: ReachIndex,
        ctx: &CapacityContext<'_>,
    ) -> SfResult<Grains> {
        let reach = &network[idx];
        match distribution_basis(self, network, idx, ctx)? {
            Some(basis) => self.capacity_from_basis(reach, &basis, ctx),
            None => Ok(Grains::zeros_like(reach.strata.active())),
        }
    }
}

/// 输沙公式的粒径分布基底
///
/// 本地活动层非空时为活动层本身；否则为上游贡献之和。二者都为空时返回 `None`。
pub fn distribution_basis<C: BedloadCapacity + ?Sized>(
    capacity: &C,
    network: &RiverNetwork,
    idx: ReachIndex,
    ctx: &CapacityContext<'_>,
) -> SfResult<Option<Grains>> {
    let reach = &network[idx];
    let local = reach.strata.active();
    if !is_empty_volume(local.overall_volume()) {
        return Ok(Some(local.clone()));
    }

    let shortcut = ctx.shortcut_allowed(network);
    let mut basis = local.clone();
    for &up in reach.upstream() {
        let upstream = &network[up];
        if shortcut && upstream.id() < reach.id() {
            basis += &upstream.erosion_rate;
        } else {
            basis += capacity.calculate(network, up, ctx)?;
        }
    }

    if !is_empty_volume(basis.overall_volume()) {
        log::trace!("河段 {} 无可冲刷泥沙, 使用上游旁通基底", reach.id());
        Ok(Some(basis))
    } else {
        Ok(None)
    }
}

/// 按遍历方式计算河段的输沙能力并写回冲刷率
///
/// `update_margins` 为 false 时边界河段保留原有冲刷率（由初始状态或修正器给出）。
/// 顺序模式下每算完一个河段立即写回，供后续河段的旁通取用。
pub fn compute_erosion_rates<C: BedloadCapacity + ?Sized>(
    capacity: &C,
    network: &mut RiverNetwork,
    ctx: &CapacityContext<'_>,
    update_margins: bool,
) -> SfResult<()> {
    let selected: Vec<ReachIndex> = network
        .indices()
        .filter(|&idx| update_margins || !network[idx].is_margin())
        .collect();
    match ctx.mode {
        TraversalMode::Sequential => {
            for idx in selected {
                let rate = capacity.calculate(network, idx, ctx)?;
                network[idx].erosion_rate = rate;
            }
        }
        TraversalMode::Parallel => {
            let shared: &RiverNetwork = network;
            let rates = selected
                .par_iter()
                .map(|&idx| capacity.calculate(shared, idx, ctx))
                .collect::<SfResult<Vec<_>>>()?;
            for (idx, rate) in selected.into_iter().zip(rates) {
                network[idx].erosion_rate = rate;
            }
        }
    }
    Ok(())
}

// ============================================================================
// 封闭策略集合
// ============================================================================

/// 输沙能力方法
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CapacityMethod {
    /// Wilcock & Crowe
    WilcockCrowe(WilcockCrowe),
    /// 分级超额剪切
    FractionalExcessShear(FractionalExcessShear),
    /// 无输沙（定床）
    Zero,
}

impl Default for CapacityMethod {
    fn default() -> Self {
        Self::WilcockCrowe(WilcockCrowe::default())
    }
}

impl CapacityMethod {
    /// 验证参数
    pub fn validate(&self) -> SfResult<()> {
        match self {
            Self::WilcockCrowe(c) => c.validate(),
            Self::FractionalExcessShear(c) => c.validate(),
            Self::Zero => Ok(()),
        }
    }
}

impl BedloadCapacity for CapacityMethod {
    fn name(&self) -> &'static str {
        match self {
            Self::WilcockCrowe(c) => c.name(),
            Self::FractionalExcessShear(c) => c.name(),
            Self::Zero => "ZeroCapacity",
        }
    }

    fn capacity_from_basis(
        &self,
        reach: &Reach,
        basis: &Grains,
        ctx: &CapacityContext<'_>,
    ) -> SfResult<Grains> {
        match self {
            Self::WilcockCrowe(c) => c.capacity_from_basis(reach, basis, ctx),
            Self::FractionalExcessShear(c) => c.capacity_from_basis(reach, basis, ctx),
            Self::Zero => Ok(Grains::zeros_like(basis)),
        }
    }

    fn calculate(
        &self,
        network: &RiverNetwork,
        idx: ReachIndex,
        ctx: &CapacityContext<'_>,
    ) -> SfResult<Grains> {
        match self {
            Self::Zero => Ok(Grains::zeros_like(network[idx].strata.active())),
            Self::WilcockCrowe(c) => c.calculate(network, idx, ctx),
            Self::FractionalExcessShear(c) => c.calculate(network, idx, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grains::GrainKind;
    use crate::strata::LayerStack;

    /// 输出等于基底的测试策略
    #[derive(Debug)]
    struct Echo;

    impl BedloadCapacity for Echo {
        fn name(&self) -> &'static str {
            "Echo"
        }

        fn capacity_from_basis(
            &self,
            _reach: &Reach,
            basis: &Grains,
            _ctx: &CapacityContext<'_>,
        ) -> SfResult<Grains> {
            Ok(basis.clone())
        }
    }

    fn reach(id: i64, down: Option<i64>, active: &[f64]) -> Reach {
        let strata = LayerStack::new(vec![
            Grains::from_fractions(GrainKind::Normal, active.to_vec()),
            Grains::from_fractions(GrainKind::Normal, vec![0.0; active.len()]),
        ])
        .unwrap();
        Reach::new(id, down, 100.0, 0.0, strata)
    }

    #[test]
    fn test_local_basis_when_sediment_present() {
        let net = RiverNetwork::new(vec![reach(1, Some(2), &[0.1, 0.2]), reach(2, None, &[0.3, 0.0])])
            .unwrap();
        let params = OverallParameters::with_diameters(vec![0.01, 0.02]).unwrap();
        let ctx = CapacityContext::new(&params, TraversalMode::Sequential);
        let basis = distribution_basis(&Echo, &net, ReachIndex::from_usize(1), &ctx)
            .unwrap()
            .unwrap();
        assert_eq!(basis.kind_volumes(GrainKind::Normal), &[0.3, 0.0]);
    }

    #[test]
    fn test_recursive_bypass_through_empty_chain() {
        let net = RiverNetwork::new(vec![
            reach(1, Some(2), &[0.1, 0.3]),
            reach(2, Some(3), &[0.0, 0.0]),
            reach(3, None, &[0.0, 0.0]),
        ])
        .unwrap();
        let params = OverallParameters::with_diameters(vec![0.01, 0.02]).unwrap();
        for mode in [TraversalMode::Sequential, TraversalMode::Parallel] {
            let mut net = net.clone();
            let ctx = CapacityContext::new(&params, mode);
            compute_erosion_rates(&Echo, &mut net, &ctx, true).unwrap();
            let outlet = &net.reaches()[2].erosion_rate;
            assert_eq!(outlet.kind_volumes(GrainKind::Normal), &[0.1, 0.3]);
        }
    }

    #[test]
    fn test_margins_kept_unless_requested() {
        let mut net = RiverNetwork::new(vec![
            reach(1, Some(2), &[0.1]),
            reach(2, Some(3), &[0.2]),
            reach(3, None, &[0.3]),
        ])
        .unwrap();
        let params = OverallParameters::with_diameters(vec![0.01]).unwrap();
        let ctx = CapacityContext::new(&params, TraversalMode::Sequential);
        compute_erosion_rates(&Echo, &mut net, &ctx, false).unwrap();
        assert!(net.reaches()[0].erosion_rate.is_zero());
        assert_eq!(net.reaches()[1].erosion_rate.kind_volumes(GrainKind::Normal), &[0.2]);
        assert!(net.reaches()[2].erosion_rate.is_zero());
    }

    #[test]
    fn test_empty_everywhere_is_zero() {
        let net = RiverNetwork::new(vec![reach(1, Some(2), &[0.0]), reach(2, None, &[0.0])]).unwrap();
        let params = OverallParameters::with_diameters(vec![0.01]).unwrap();
        let ctx = CapacityContext::new(&params, TraversalMode::Sequential);
        let rate = Echo.calculate(&net, ReachIndex::from_usize(1), &ctx).unwrap();
        assert!(rate.is_zero());
    }

    #[test]
    fn test_zero_method() {
        let net = RiverNetwork::new(vec![reach(1, None, &[1.0])]).unwrap();
        let params = OverallParameters::with_diameters(vec![0.01]).unwrap();
        let ctx = CapacityContext::new(&params, TraversalMode::Sequential);
        let rate = CapacityMethod::Zero
            .calculate(&net, ReachIndex::from_usize(0), &ctx)
            .unwrap();
        assert!(rate.is_zero());
    }
}
