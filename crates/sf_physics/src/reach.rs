// crates/sf_physics/src/reach.rs

//! 河段状态
//!
//! 河段是河网图的节点，由河网 Arena 独占持有。上下游关系保存为
//! Arena 索引，由 [`RiverNetwork`](crate::network::RiverNetwork) 在构造时解析，
//! 外部只能读取。

use crate::grains::Grains;
use crate::strata::LayerStack;
use sf_foundation::ReachIndex;

/// 河段状态
#[derive(Debug, Clone, PartialEq)]
pub struct Reach {
    id: i64,
    downstream_id: Option<i64>,
    pub(crate) downstream: Option<ReachIndex>,
    pub(crate) upstream: Vec<ReachIndex>,

    // ========================================================================
    // 几何
    // ========================================================================
    /// 河段长度 [m]
    pub length: f64,
    /// 河道宽度（矩形河道）或开口参数 [m]
    pub channel_width: f64,
    /// 河床高程 [m]
    pub elevation: f64,

    // ========================================================================
    // 水力
    // ========================================================================
    /// 最大水深 [m]
    pub max_water_depth: f64,
    /// 流量 [m³/s]
    pub discharge: f64,
    /// 断面平均流速 [m/s]
    pub flow_velocity: f64,
    /// 床面坡度
    pub bed_slope: f64,
    /// 水流能坡
    pub water_energy_slope: f64,
    /// 泥沙能坡
    pub sediment_energy_slope: f64,
    /// 活动宽度 [m]
    pub active_width: f64,
    /// 床面剪切应力 [Pa]
    pub bed_shear_stress: f64,

    // ========================================================================
    // 泥沙
    // ========================================================================
    /// 单位床面面积上的地层柱 [m³/m²]
    pub strata: LayerStack,
    /// 冲刷率 [m³/s]
    pub erosion_rate: Grains,
    /// 淤积率 [m³/s]
    pub deposition_rate: Grains,
    /// 本步冲刷量（先为体积 [m³]，下传后换算为单位床面面积）
    pub erosion: Grains,
    /// 本步淤积量（同上）
    pub deposition: Grains,
}

impl Reach {
    /// 创建河段，水力状态置零
    pub fn new(
        id: i64,
        downstream_id: Option<i64>,
        length: f64,
        elevation: f64,
        strata: LayerStack,
    ) -> Self {
        let zero = Grains::zeros_like(strata.active());
        Self {
            id,
            downstream_id,
            downstream: None,
            upstream: Vec::new(),
            length,
            channel_width: 1.0,
            elevation,
            max_water_depth: 0.0,
            discharge: 0.0,
            flow_velocity: 0.0,
            bed_slope: 0.0,
            water_energy_slope: 0.0,
            sediment_energy_slope: 0.0,
            active_width: 1.0,
            bed_shear_stress: 0.0,
            strata,
            erosion_rate: zero.clone(),
            deposition_rate: zero.clone(),
            erosion: zero.clone(),
            deposition: zero,
        }
    }

    /// 设置河道宽度（同时作为初始活动宽度）
    pub fn with_channel_width(mut self, width: f64) -> Self {
        self.channel_width = width;
        self.active_width = width;
        self
    }

    /// 设置流量
    pub fn with_discharge(mut self, discharge: f64) -> Self {
        self.discharge = discharge;
        self
    }

    /// 设置水深
    pub fn with_water_depth(mut self, depth: f64) -> Self {
        self.max_water_depth = depth;
        self
    }

    // ========================================================================
    // 拓扑
    // ========================================================================

    /// 用户河段编号
    #[inline]
    pub fn id(&self) -> i64 {
        self.id
    }

    /// 下游河段的用户编号
    #[inline]
    pub fn downstream_id(&self) -> Option<i64> {
        self.downstream_id
    }

    /// 下游河段索引
    #[inline]
    pub fn downstream(&self) -> Option<ReachIndex> {
        self.downstream
    }

    /// 上游河段索引
    #[inline]
    pub fn upstream(&self) -> &[ReachIndex] {
        &self.upstream
    }

    /// 是否为上游边界（无上游河段）
    #[inline]
    pub fn is_upstream_margin(&self) -> bool {
        self.upstream.is_empty()
    }

    /// 是否为下游出口（无下游河段）
    #[inline]
    pub fn is_downstream_margin(&self) -> bool {
        self.downstream.is_none()
    }

    /// 是否为边界河段
    #[inline]
    pub fn is_margin(&self) -> bool {
        self.is_upstream_margin() || self.is_downstream_margin()
    }

    // ========================================================================
    // 派生量
    // ========================================================================

    /// 水位 [m]
    #[inline]
    pub fn water_level(&self) -> f64 {
        self.elevation + self.max_water_depth
    }

    /// 活动床面面积 [m²]
    #[inline]
    pub fn bed_area(&self) -> f64 {
        self.active_width * self.length
    }

    /// 地层柱总体积 [m³]
    pub fn sediment_volume(&self) -> f64 {
        self.strata.total_volume() * self.bed_area()
    }

    /// 活动层体积 [m³]
    pub fn active_layer_volume(&self) -> f64 {
        self.strata.active_thickness() * self.bed_area()
    }

    /// 与另一河段中心点之间的距离 [m]
    #[inline]
    pub fn center_distance(&self, other: &Reach) -> f64 {
        0.5 * (self.length + other.length)
    }
}
