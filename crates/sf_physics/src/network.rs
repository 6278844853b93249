// crates/sf_physics/src/network.rs

//! 河网图
//!
//! 河段按用户编号升序存放在 Arena 中，Arena 下标即 [`ReachIndex`]。
//! 每个河段至多一个下游河段；上游列表由下游链接反推。
//!
//! # 构造期验证
//!
//! 构造时一次性检查全部拓扑与数值错误，并汇总为一个错误返回：
//!
//! - 河网为空、编号重复、悬空或自指的下游链接
//! - 下游出口不是恰好一个
//! - 某条下游链在 n 步内无法到达出口（存在环）
//! - 几何或水力量非有限、长度或宽度不为正
//!
//! 编号沿下游方向不递增只产生警告，此时关闭依赖编号顺序的捷径。
//!
//! # 扫描顺序
//!
//! 按编号升序（即 Arena 顺序）逐河段处理称为扫描顺序；
//! 流量传播使用拓扑顺序（上游先于下游）。

use crate::reach::Reach;
use sf_foundation::validation::{ValidationError, ValidationReport, ValidationWarning};
use sf_foundation::{ReachIndex, SfError, SfResult};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::ops::{Index, IndexMut};

/// 河网
#[derive(Debug, Clone)]
pub struct RiverNetwork {
    reaches: Vec<Reach>,
    downstream_margin: ReachIndex,
    upstream_margins: Vec<ReachIndex>,
    flow_order: Vec<ReachIndex>,
    monotonic: bool,
    warnings: Vec<ValidationWarning>,
}

impl RiverNetwork {
    // ========================================================================
    // 构造
    // ========================================================================

    /// 由河段列表构造，验证失败时返回汇总后的拓扑错误
    pub fn new(mut reaches: Vec<Reach>) -> SfResult<Self> {
        let warnings = Self::validate(&reaches).into_result()?;
        for warning in &warnings {
            log::warn!("{}", warning);
        }

        reaches.sort_by_key(Reach::id);
        let lookup: HashMap<i64, ReachIndex> = reaches
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id(), ReachIndex::from_usize(i)))
            .collect();

        for reach in reaches.iter_mut() {
            reach.upstream.clear();
            reach.downstream = reach.downstream_id().and_then(|d| lookup.get(&d).copied());
        }
        for i in 0..reaches.len() {
            if let Some(d) = reaches[i].downstream {
                reaches[d.as_usize()].upstream.push(ReachIndex::from_usize(i));
            }
        }

        let monotonic = !warnings
            .iter()
            .any(|w| matches!(w, ValidationWarning::NonMonotonicNumbering { .. }));

        let downstream_margin = reaches
            .iter()
            .position(Reach::is_downstream_margin)
            .map(ReachIndex::from_usize)
            .ok_or_else(|| SfError::internal("验证通过的河网缺少下游出口"))?;
        let upstream_margins: Vec<ReachIndex> = reaches
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_upstream_margin())
            .map(|(i, _)| ReachIndex::from_usize(i))
            .collect();

        let flow_order = Self::topological_order(&reaches)?;

        log::debug!(
            "河网构造完成: {} 个河段, {} 个上游边界, 出口 {}",
            reaches.len(),
            upstream_margins.len(),
            reaches[downstream_margin.as_usize()].id()
        );

        Ok(Self {
            reaches,
            downstream_margin,
            upstream_margins,
            flow_order,
            monotonic,
            warnings,
        })
    }

    /// 验证河段列表，不修改任何状态
    pub fn validate(reaches: &[Reach]) -> ValidationReport {
        let mut report = ValidationReport::new();
        if reaches.is_empty() {
            report.add_error(ValidationError::EmptyNetwork);
            return report;
        }

        let mut ids = HashSet::with_capacity(reaches.len());
        for r in reaches {
            if !ids.insert(r.id()) {
                report.add_error(ValidationError::DuplicateId { reach_id: r.id() });
            }
        }

        let mut links_ok = true;
        for r in reaches {
            if let Some(d) = r.downstream_id() {
                if d == r.id() {
                    report.add_error(ValidationError::SelfLink { reach_id: r.id() });
                    links_ok = false;
                } else if !ids.contains(&d) {
                    report.add_error(ValidationError::DanglingLink {
                        reach_id: r.id(),
                        target: d,
                    });
                    links_ok = false;
                } else if d < r.id() {
                    report.add_warning(ValidationWarning::NonMonotonicNumbering {
                        upstream_id: r.id(),
                        downstream_id: d,
                    });
                }
            }
            Self::validate_values(r, &mut report);
        }

        let outlets = reaches.iter().filter(|r| r.downstream_id().is_none()).count();
        if outlets != 1 {
            report.add_error(ValidationError::DownstreamMarginCount { count: outlets });
        }

        if links_ok && !report.has_errors() {
            let next: HashMap<i64, Option<i64>> =
                reaches.iter().map(|r| (r.id(), r.downstream_id())).collect();
            let limit = reaches.len();
            for r in reaches {
                let mut current = r.downstream_id();
                let mut hops = 0;
                while let Some(id) = current {
                    hops += 1;
                    if hops > limit {
                        report.add_error(ValidationError::UnterminatedChain { reach_id: r.id() });
                        break;
                    }
                    current = next.get(&id).copied().flatten();
                }
            }
        }

        report
    }

    fn validate_values(r: &Reach, report: &mut ValidationReport) {
        let id = r.id();
        let finite = [
            ("length", r.length),
            ("elevation", r.elevation),
            ("channel_width", r.channel_width),
            ("max_water_depth", r.max_water_depth),
            ("discharge", r.discharge),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                report.add_error(ValidationError::NonFinite {
                    field,
                    reach_id: id,
                    value,
                });
            }
        }
        for (field, value) in [("length", r.length), ("channel_width", r.channel_width)] {
            if value.is_finite() && value <= 0.0 {
                report.add_error(ValidationError::OutOfRange {
                    field,
                    reach_id: id,
                    value,
                    min: 0.0,
                });
            }
        }
        for (field, value) in [
            ("max_water_depth", r.max_water_depth),
            ("discharge", r.discharge),
        ] {
            if value < 0.0 {
                report.add_error(ValidationError::OutOfRange {
                    field,
                    reach_id: id,
                    value,
                    min: 0.0,
                });
            }
        }
        if r.downstream_id().is_some() && r.strata.total_volume() <= 0.0 {
            report.add_warning(ValidationWarning::EmptyStrata { reach_id: id });
        }
    }

    /// Kahn 拓扑排序，上游先于下游；可选河段中总取下标最小者，
    /// 编号单调时结果与扫描顺序一致
    fn topological_order(reaches: &[Reach]) -> SfResult<Vec<ReachIndex>> {
        let mut pending: Vec<usize> = reaches.iter().map(|r| r.upstream.len()).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = reaches
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_upstream_margin())
            .map(|(i, _)| Reverse(i))
            .collect();
        let mut order = Vec::with_capacity(reaches.len());
        while let Some(Reverse(i)) = ready.pop() {
            order.push(ReachIndex::from_usize(i));
            if let Some(d) = reaches[i].downstream {
                pending[d.as_usize()] -= 1;
                if pending[d.as_usize()] == 0 {
                    ready.push(Reverse(d.as_usize()));
                }
            }
        }
        if order.len() != reaches.len() {
            return Err(SfError::topology("河网存在环，无法确定拓扑顺序"));
        }
        Ok(order)
    }

    // ========================================================================
    // 访问
    // ========================================================================

    /// 河段数量
    #[inline]
    pub fn len(&self) -> usize {
        self.reaches.len()
    }

    /// 是否为空（构造保证非空）
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.reaches.is_empty()
    }

    /// 按扫描顺序的全部河段
    #[inline]
    pub fn reaches(&self) -> &[Reach] {
        &self.reaches
    }

    /// 按扫描顺序的全部河段（可变）
    #[inline]
    pub fn reaches_mut(&mut self) -> &mut [Reach] {
        &mut self.reaches
    }

    /// 按索引获取河段
    #[inline]
    pub fn get(&self, idx: ReachIndex) -> Option<&Reach> {
        idx.to_option().and_then(|i| self.reaches.get(i))
    }

    /// 扫描顺序的索引
    pub fn indices(&self) -> impl Iterator<Item = ReachIndex> + '_ {
        (0..self.reaches.len()).map(ReachIndex::from_usize)
    }

    /// 按用户编号查找索引
    pub fn index_of(&self, id: i64) -> Option<ReachIndex> {
        self.reaches
            .binary_search_by_key(&id, Reach::id)
            .ok()
            .map(ReachIndex::from_usize)
    }

    /// 下游出口
    #[inline]
    pub fn downstream_margin(&self) -> ReachIndex {
        self.downstream_margin
    }

    /// 上游边界
    #[inline]
    pub fn upstream_margins(&self) -> &[ReachIndex] {
        &self.upstream_margins
    }

    /// 拓扑顺序（上游先于下游）
    #[inline]
    pub fn flow_order(&self) -> &[ReachIndex] {
        &self.flow_order
    }

    /// 编号是否沿下游方向递增
    #[inline]
    pub fn is_monotonic(&self) -> bool {
        self.monotonic
    }

    /// 构造期警告
    #[inline]
    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    // ========================================================================
    // 查询
    // ========================================================================

    /// 沿下游链接查找出口，步数上限为河段数
    pub fn find_downstream_margin(&self, from: ReachIndex) -> SfResult<ReachIndex> {
        SfError::check_index("ReachIndex", from.as_usize(), self.len())?;
        let mut current = from;
        for _ in 0..=self.len() {
            match self[current].downstream {
                Some(next) => current = next,
                None => return Ok(current),
            }
        }
        Err(SfError::topology(format!(
            "从河段 {} 出发无法到达下游出口",
            self[from].id()
        )))
    }

    /// 上游河段的流量之和
    pub fn inflow(&self, idx: ReachIndex) -> f64 {
        self[idx]
            .upstream
            .iter()
            .map(|&u| self[u].discharge)
            .sum()
    }

    /// 全河网地层柱总体积 [m³]
    pub fn total_sediment_volume(&self) -> f64 {
        self.reaches.iter().map(Reach::sediment_volume).sum()
    }

    /// 同时可变借用两个不同河段
    pub(crate) fn pair_mut(&mut self, a: ReachIndex, b: ReachIndex) -> (&mut Reach, &mut Reach) {
        let (ai, bi) = (a.as_usize(), b.as_usize());
        assert_ne!(ai, bi, "pair_mut 需要两个不同的河段");
        if ai < bi {
            let (left, right) = self.reaches.split_at_mut(bi);
            (&mut left[ai], &mut right[0])
        } else {
            let (left, right) = self.reaches.split_at_mut(ai);
            (&mut right[0], &mut left[bi])
        }
    }
}

impl Index<ReachIndex> for RiverNetwork {
    type Output = Reach;

    #[inline]
    fn index(&self, idx: ReachIndex) -> &Reach {
        &self.reaches[idx.as_usize()]
    }
}

impl IndexMut<ReachIndex> for RiverNetwork {
    #[inline]
    fn index_mut(&mut self, idx: ReachIndex) -> &mut Reach {
        &mut self.reaches[idx.as_usize()]
    }
}
