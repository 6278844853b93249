// crates/sf_physics/src/strata/layer_stack.rs

//! 单位床面面积上的地层柱
//!
//! 索引 0 为活动层（表层），最后一个为底层。层内体积以单位床面面积计
//! [m³/m²]，即数值上等于层厚。

use crate::grains::Grains;
use serde::{Deserialize, Serialize};
use sf_foundation::{ensure, SfError, SfResult};

/// 地层柱
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Grains>", into = "Vec<Grains>")]
pub struct LayerStack {
    layers: Vec<Grains>,
}

impl LayerStack {
    /// 由自表层向下的层列表创建
    pub fn new(layers: Vec<Grains>) -> SfResult<Self> {
        ensure!(!layers.is_empty(), SfError::config("地层柱至少需要一层"));
        let first = &layers[0];
        for layer in &layers[1..] {
            ensure!(
                layer.matches(first),
                SfError::config("地层柱各层的泥沙种类或分级数不一致")
            );
        }
        Ok(Self { layers })
    }

    /// 层数
    #[inline]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// 是否为空（构造保证至少一层，恒为 false）
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// 全部层
    #[inline]
    pub fn layers(&self) -> &[Grains] {
        &self.layers
    }

    /// 单层
    #[inline]
    pub fn layer(&self, i: usize) -> Option<&Grains> {
        self.layers.get(i)
    }

    /// 活动层
    #[inline]
    pub fn active(&self) -> &Grains {
        &self.layers[0]
    }

    /// 活动层（可变）
    #[inline]
    pub fn active_mut(&mut self) -> &mut Grains {
        &mut self.layers[0]
    }

    /// 底层
    #[inline]
    pub fn base(&self) -> &Grains {
        &self.layers[self.layers.len() - 1]
    }

    /// 底层（可变）
    #[inline]
    pub fn base_mut(&mut self) -> &mut Grains {
        let last = self.layers.len() - 1;
        &mut self.layers[last]
    }

    /// 活动层厚度
    #[inline]
    pub fn active_thickness(&self) -> f64 {
        self.active().overall_volume()
    }

    /// 活动层以下各层的总体积
    pub fn volume_below_active(&self) -> f64 {
        self.layers[1..].iter().map(Grains::overall_volume).sum()
    }

    /// 全部层的总体积
    pub fn total_volume(&self) -> f64 {
        self.layers.iter().map(Grains::overall_volume).sum()
    }

    /// 淤积：加入活动层
    pub fn deposit(&mut self, deposition: &Grains) {
        *self.active_mut() += deposition;
    }

    /// 冲刷：从活动层减去，返回实际冲刷量
    pub fn erode(&mut self, erosion: &Grains) -> Grains {
        self.active_mut().subtract(erosion)
    }

    /// 活动层在先淤积 `deposition` 后最多可冲刷的量
    pub fn potential_erosion(&self, deposition: &Grains, erosion: &Grains) -> Grains {
        let available = self.active() + deposition;
        available.potential_subtraction(erosion)
    }

    /// 向表层方向整体上移一层
    ///
    /// 每个次表层上移一个位置，腾出的最下次表层位置由 `take` 从底层取料填充，
    /// 原活动层并入新的活动层。只有两层时直接把取料并入活动层。
    pub(crate) fn lift_one_layer(&mut self, take: impl FnOnce(&Grains) -> Grains) {
        let n = self.layers.len();
        debug_assert!(n >= 2);
        self.layers[..n - 1].rotate_left(1);
        let update = take(self.base());
        let taken = self.base_mut().subtract(&update);
        let previous_active = std::mem::replace(&mut self.layers[n - 2], taken);
        self.layers[0] += &previous_active;
    }

    /// 向底层方向整体下移一层
    ///
    /// 从活动层剥离 `update`，放到第一个次表层位置；其余次表层下移，
    /// 被挤出的最下次表层与原底层合并。
    pub(crate) fn lower_one_layer(&mut self, update: &Grains) {
        let n = self.layers.len();
        debug_assert!(n >= 2);
        self.layers[1..].rotate_right(1);
        let removed = self.layers[0].subtract(update);
        let previous_base = std::mem::replace(&mut self.layers[1], removed);
        self.layers[n - 1] += &previous_base;
    }

    /// 两层之间直接交换：从 `from` 减去 `update` 并加入 `to`
    pub(crate) fn transfer(&mut self, from: usize, to: usize, update: &Grains) {
        let moved = self.layers[from].subtract(update);
        self.layers[to] += &moved;
    }
}

impl TryFrom<Vec<Grains>> for LayerStack {
    type Error = SfError;

    fn try_from(layers: Vec<Grains>) -> SfResult<Self> {
        Self::new(layers)
    }
}

impl From<LayerStack> for Vec<Grains> {
    fn from(stack: LayerStack) -> Self {
        stack.layers
    }
}
