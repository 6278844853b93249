// crates/sf_physics/src/modifiers/group.rs

//! 修正器组
//!
//! 同一流动类别的修正器组成一组，共享四阶段协议。组内修正器种类不得重复，
//! 不同组的类别不得重复。收敛循环本身由流动过程的驱动器执行，
//! 组只负责按扫描顺序把每个阶段分发到各修正器。

use super::{FlowCategory, ModifierContext, ModifierParams, ModifierSlot};
use crate::network::RiverNetwork;
use sf_foundation::{ensure, ReachIndex, SfError, SfResult};
use std::collections::HashSet;

/// 一个流动类别的修正器组
#[derive(Debug, Clone)]
pub struct ModifierGroup {
    category: FlowCategory,
    slots: Vec<ModifierSlot>,
}

impl ModifierGroup {
    /// 创建，拒绝类别不符或种类重复的修正器
    pub fn new(category: FlowCategory, slots: Vec<ModifierSlot>) -> SfResult<Self> {
        let mut kinds = HashSet::with_capacity(slots.len());
        for slot in &slots {
            ensure!(
                slot.category() == category,
                SfError::config(format!(
                    "修正器 {:?} 属于 {}，不能放入 {} 组",
                    slot.kind(),
                    slot.category(),
                    category
                ))
            );
            ensure!(
                kinds.insert(slot.kind()),
                SfError::config(format!("{} 组中修正器 {:?} 重复", category, slot.kind()))
            );
        }
        Ok(Self { category, slots })
    }

    /// 由构造参数创建
    pub fn from_params(category: FlowCategory, params: &[ModifierParams]) -> SfResult<Self> {
        let slots = params
            .iter()
            .map(ModifierSlot::from_params)
            .collect::<SfResult<Vec<_>>>()?;
        Self::new(category, slots)
    }

    /// 空组
    pub fn empty(category: FlowCategory) -> Self {
        Self {
            category,
            slots: Vec::new(),
        }
    }

    /// 所属类别
    #[inline]
    pub fn category(&self) -> FlowCategory {
        self.category
    }

    /// 修正器数量
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 全部槽位
    #[inline]
    pub fn slots(&self) -> &[ModifierSlot] {
        &self.slots
    }

    /// 检查与河网是否相容
    pub fn check_network(&self, network: &RiverNetwork) -> SfResult<()> {
        self.slots.iter().try_for_each(|s| s.check_network(network))
    }

    /// 导出构造参数
    pub fn params(&self) -> Vec<ModifierParams> {
        self.slots.iter().map(ModifierSlot::params).collect()
    }

    // ========================================================================
    // 协议阶段
    // ========================================================================

    /// 前置阶段：按扫描顺序对每个河段调用"保证"修正器
    pub fn input_pass(&mut self, network: &mut RiverNetwork, ctx: &ModifierContext) -> SfResult<()> {
        if !self.slots.iter().any(ModifierSlot::ensures_against_others) {
            return Ok(());
        }
        let order = network.flow_order().to_vec();
        for idx in order {
            for slot in self.slots.iter_mut().filter(|s| s.ensures_against_others()) {
                slot.input_modification(network, idx, ctx)?;
            }
        }
        Ok(())
    }

    /// 主效果：对单个河段调用全部修正器
    pub fn before_updates(
        &mut self,
        network: &mut RiverNetwork,
        idx: ReachIndex,
        ctx: &ModifierContext,
    ) -> SfResult<()> {
        for slot in &mut self.slots {
            slot.modification_before_updates(network, idx, ctx)?;
        }
        Ok(())
    }

    /// 是否有任一修正器请求再来一轮
    pub fn further_iteration_necessary(&self, ctx: &ModifierContext) -> bool {
        self.slots.iter().any(|s| s.further_iteration_necessary(ctx))
    }

    /// 收尾阶段：按扫描顺序对每个河段调用"保证"修正器
    pub fn final_pass(&mut self, network: &mut RiverNetwork, ctx: &ModifierContext) -> SfResult<()> {
        if !self.slots.iter().any(ModifierSlot::ensures_against_others) {
            return Ok(());
        }
        let order = network.flow_order().to_vec();
        for idx in order {
            for slot in self.slots.iter_mut().filter(|s| s.ensures_against_others()) {
                slot.final_modification(network, idx, ctx)?;
            }
        }
        Ok(())
    }
}

/// 全部修正器组，每个流动类别至多一组
#[derive(Debug, Clone, Default)]
pub struct ChangeRateModifiers {
    groups: Vec<ModifierGroup>,
}

impl ChangeRateModifiers {
    /// 创建，拒绝重复的类别
    pub fn new(mut groups: Vec<ModifierGroup>) -> SfResult<Self> {
        groups.sort_by_key(ModifierGroup::category);
        for pair in groups.windows(2) {
            ensure!(
                pair[0].category() != pair[1].category(),
                SfError::config(format!("修正器组 {} 重复", pair[0].category()))
            );
        }
        Ok(Self { groups })
    }

    /// 全部组（水流在前）
    #[inline]
    pub fn groups(&self) -> &[ModifierGroup] {
        &self.groups
    }

    /// 指定类别的组
    pub fn group(&self, category: FlowCategory) -> Option<&ModifierGroup> {
        self.groups.iter().find(|g| g.category() == category)
    }

    /// 指定类别的组（可变）
    pub fn group_mut(&mut self, category: FlowCategory) -> Option<&mut ModifierGroup> {
        self.groups.iter_mut().find(|g| g.category() == category)
    }

    /// 检查与河网是否相容
    pub fn check_network(&self, network: &RiverNetwork) -> SfResult<()> {
        self.groups.iter().try_for_each(|g| g.check_network(network))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::{RecirculateSediment, RecirculateWater, SlopeClamp};

    fn slot(params: ModifierParams) -> ModifierSlot {
        ModifierSlot::from_params(&params).unwrap()
    }

    #[test]
    fn test_mixed_categories_rejected() {
        let slots = vec![
            slot(ModifierParams::RecirculateWater(RecirculateWater::new(1.0, false))),
            slot(ModifierParams::RecirculateSediment(RecirculateSediment::new(1.0, false))),
        ];
        assert!(ModifierGroup::new(FlowCategory::Water, slots).is_err());
    }

    #[test]
    fn test_duplicate_kind_rejected() {
        let clamp = SlopeClamp::with_minimum_bed_slope(0.01, FlowCategory::Sediment);
        let params = vec![
            ModifierParams::AdjustSlopesAtMargins(clamp.clone()),
            ModifierParams::AdjustSlopesAtMargins(clamp),
        ];
        assert!(ModifierGroup::from_params(FlowCategory::Sediment, &params).is_err());
    }

    #[test]
    fn test_duplicate_group_rejected() {
        let groups = vec![
            ModifierGroup::empty(FlowCategory::Water),
            ModifierGroup::empty(FlowCategory::Water),
        ];
        assert!(ChangeRateModifiers::new(groups).is_err());
    }

    #[test]
    fn test_groups_ordered_water_first() {
        let groups = vec![
            ModifierGroup::empty(FlowCategory::Sediment),
            ModifierGroup::empty(FlowCategory::Water),
        ];
        let all = ChangeRateModifiers::new(groups).unwrap();
        assert_eq!(all.groups()[0].category(), FlowCategory::Water);
        assert!(all.group(FlowCategory::Sediment).is_some());
    }
}
