// crates/sf_config/src/simulation_config.rs

//! SimulationConfig - 模拟的声明式配置
//!
//! 描述一次模拟所需的全部输入：全局参数、河段（几何、水力初值、初始地层、
//! 分选方法）、流动方法与修正器组。`build` 由配置构造 [`Simulation`]，
//! `from_simulation` 反向导出当前状态的配置快照，二者可往返。
//!
//! # JSON 示例
//!
//! ```json
//! {
//!   "parameters": { "fractional_grain_diameters": [0.004, 0.016], "end_time": 600.0 },
//!   "reaches": [
//!     { "id": 1, "downstream_id": 2, "length": 100.0, "elevation": 1.0,
//!       "discharge": 1.0, "strata": [ { "Normal": [0.05, 0.05] } ] },
//!     { "id": 2, "length": 100.0, "elevation": 0.0,
//!       "strata": [ { "Normal": [0.05, 0.05] } ] }
//!   ],
//!   "methods": { "capacity": { "type": "Zero" } },
//!   "modifiers": [
//!     { "category": "Water",
//!       "modifiers": [ { "type": "AdjustSlopesAtMargins", "minimum_bed_slope": 0.02 } ] }
//!   ]
//! }
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use sf_physics::flow::FlowMethods;
use sf_physics::grains::{GrainKind, Grains};
use sf_physics::modifiers::{ChangeRateModifiers, FlowCategory, ModifierGroup, ModifierParams};
use sf_physics::network::RiverNetwork;
use sf_physics::parameters::OverallParameters;
use sf_physics::reach::Reach;
use sf_physics::simulation::Simulation;
use sf_physics::strata::{LayerStack, StrataSorting, StrataSortingMethod, StrataSortingParams};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// 一层泥沙：泥沙种类 → 各粒径分级体积
pub type LayerConfig = BTreeMap<GrainKind, Vec<f64>>;

/// 模拟配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// 全局参数
    pub parameters: OverallParameters,

    /// 河段列表
    pub reaches: Vec<ReachConfig>,

    /// 流动方法
    #[serde(default)]
    pub methods: FlowMethods,

    /// 修正器组
    #[serde(default)]
    pub modifiers: Vec<ModifierGroupConfig>,
}

/// 河段配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachConfig {
    /// 河段编号
    pub id: i64,

    /// 下游河段编号，出口为空
    #[serde(default)]
    pub downstream_id: Option<i64>,

    /// 河段长度 [m]
    pub length: f64,

    /// 河道宽度 [m]
    #[serde(default = "default_channel_width")]
    pub channel_width: f64,

    /// 河床高程 [m]
    pub elevation: f64,

    /// 初始流量 [m³/s]
    #[serde(default)]
    pub discharge: f64,

    /// 初始最大水深 [m]
    #[serde(default)]
    pub max_water_depth: f64,

    /// 初始地层（表层在前）[m³/m²]
    pub strata: Vec<LayerConfig>,

    /// 初始冲刷率 [m³/s]，上游边界的来沙
    #[serde(default)]
    pub erosion_rate: Option<LayerConfig>,

    /// 地层分选方法
    #[serde(default)]
    pub sorting: StrataSortingParams,
}

fn default_channel_width() -> f64 {
    1.0
}

/// 一个流动类别的修正器组配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierGroupConfig {
    /// 流动类别
    pub category: FlowCategory,

    /// 修正器参数
    #[serde(default)]
    pub modifiers: Vec<ModifierParams>,
}

// ============================================================================
// 读写
// ============================================================================

impl SimulationConfig {
    /// 从 JSON 字符串解析
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// 序列化为 JSON 字符串
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self.to_json_string()?;
        std::fs::write(path, content).map_err(ConfigError::Io)?;
        Ok(())
    }

    /// 验证结构完整性
    ///
    /// 数值与拓扑的验证在 `build` 中由物理层完成。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reaches.is_empty() {
            return Err(ConfigError::Missing("reaches".to_string()));
        }
        for (i, reach) in self.reaches.iter().enumerate() {
            if reach.strata.is_empty() {
                return Err(ConfigError::Missing(format!("reaches[{}].strata", i)));
            }
            if reach.strata.iter().any(BTreeMap::is_empty) {
                return Err(ConfigError::invalid_value(
                    format!("reaches[{}].strata", i),
                    reach.id,
                    "每层至少需要一个泥沙种类",
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// 构建与快照
// ============================================================================

impl SimulationConfig {
    /// 由配置构建模拟
    pub fn build(&self) -> Result<Simulation, ConfigError> {
        self.validate()?;

        let mut reaches = Vec::with_capacity(self.reaches.len());
        let mut sorting = HashMap::with_capacity(self.reaches.len());
        for config in &self.reaches {
            reaches.push(config.build_reach()?);
            sorting.insert(config.id, StrataSortingMethod::from_params(&config.sorting)?);
        }
        let network = RiverNetwork::new(reaches)?;

        // 分选方法按 Arena 顺序排列
        let sorting = network
            .reaches()
            .iter()
            .map(|r| {
                sorting
                    .remove(&r.id())
                    .ok_or_else(|| ConfigError::Missing(format!("河段 {} 的分选方法", r.id())))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let groups = self
            .modifiers
            .iter()
            .map(|g| ModifierGroup::from_params(g.category, &g.modifiers))
            .collect::<Result<Vec<_>, _>>()?;
        let modifiers = ChangeRateModifiers::new(groups)?;

        let simulation = Simulation::new(
            self.parameters.clone(),
            network,
            self.methods.clone(),
            sorting,
            modifiers,
        )?;
        log::info!(
            "由配置构建模拟: {} 个河段, {} 个修正器组",
            self.reaches.len(),
            self.modifiers.len()
        );
        Ok(simulation)
    }

    /// 导出模拟当前状态的配置快照
    pub fn from_simulation(simulation: &Simulation) -> Self {
        let reaches = simulation
            .network()
            .reaches()
            .iter()
            .zip(simulation.sorting())
            .map(|(reach, method)| ReachConfig::from_reach(reach, method.params()))
            .collect();
        let modifiers = simulation
            .modifiers()
            .groups()
            .iter()
            .map(|g| ModifierGroupConfig {
                category: g.category(),
                modifiers: g.params(),
            })
            .collect();
        Self {
            parameters: simulation.params().clone(),
            reaches,
            methods: simulation.methods().clone(),
            modifiers,
        }
    }
}

impl ReachConfig {
    fn build_reach(&self) -> Result<Reach, ConfigError> {
        let layers = self
            .strata
            .iter()
            .map(grains_from_layer)
            .collect::<Result<Vec<_>, _>>()?;
        let strata = LayerStack::new(layers)?;

        let mut reach = Reach::new(
            self.id,
            self.downstream_id,
            self.length,
            self.elevation,
            strata,
        )
        .with_channel_width(self.channel_width)
        .with_discharge(self.discharge)
        .with_water_depth(self.max_water_depth);

        if let Some(layer) = &self.erosion_rate {
            let rate = grains_from_layer(layer)?;
            if !rate.matches(reach.strata.active()) {
                return Err(ConfigError::invalid_value(
                    "erosion_rate",
                    self.id,
                    "泥沙种类或分级数与地层不一致",
                ));
            }
            reach.erosion_rate = rate;
        }
        Ok(reach)
    }

    fn from_reach(reach: &Reach, sorting: StrataSortingParams) -> Self {
        let erosion_rate = if reach.erosion_rate.is_zero() {
            None
        } else {
            Some(layer_from_grains(&reach.erosion_rate))
        };
        Self {
            id: reach.id(),
            downstream_id: reach.downstream_id(),
            length: reach.length,
            channel_width: reach.channel_width,
            elevation: reach.elevation,
            discharge: reach.discharge,
            max_water_depth: reach.max_water_depth,
            strata: reach.strata.layers().iter().map(layer_from_grains).collect(),
            erosion_rate,
            sorting,
        }
    }
}

fn grains_from_layer(layer: &LayerConfig) -> Result<Grains, ConfigError> {
    let entries: Vec<(GrainKind, Vec<f64>)> =
        layer.iter().map(|(kind, v)| (*kind, v.clone())).collect();
    Ok(Grains::try_from_kind_volumes(&entries)?)
}

fn layer_from_grains(grains: &Grains) -> LayerConfig {
    grains
        .kinds()
        .iter()
        .map(|&kind| (kind, grains.kind_volumes(kind).to_vec()))
        .collect()
}
