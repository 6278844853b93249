// crates/sf_physics/src/simulation.rs

//! 模拟驱动器
//!
//! 每个时间步依次执行：
//!
//! 1. 水流变化率阶段（含水流修正器组）
//! 2. 泥沙变化率阶段（含泥沙修正器组）
//! 3. 确定时间步长，计算、下传并应用变化量
//! 4. 逐河段地层分选
//! 5. 刷新依赖参数，推进已模拟时长
//!
//! 任一步出错时整次运行停止，不做部分重试。

use crate::flow::{modify_change_rates, BedloadTransport, FlowContext, FlowMethods, UniformDischarge};
use crate::modifiers::{ChangeRateModifiers, FlowCategory};
use crate::network::RiverNetwork;
use crate::parameters::OverallParameters;
use crate::strata::{StrataSorting, StrataSortingMethod};
use sf_foundation::{ensure, SfError, SfResult};

/// 单步统计
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepReport {
    /// 本步时间步长 [s]
    pub time_step: f64,
    /// 水流修正器收敛轮数
    pub water_rounds: usize,
    /// 泥沙修正器收敛轮数
    pub sediment_rounds: usize,
    /// 发生地层分选的河段数
    pub sorted_reaches: usize,
}

/// 河网模拟
#[derive(Debug, Clone)]
pub struct Simulation {
    params: OverallParameters,
    network: RiverNetwork,
    methods: FlowMethods,
    water: UniformDischarge,
    sediment: BedloadTransport,
    sorting: Vec<StrataSortingMethod>,
    modifiers: ChangeRateModifiers,
    steps: usize,
}

impl Simulation {
    /// 创建模拟
    ///
    /// `sorting` 按 Arena 顺序（河段编号升序）给出每个河段的分选方法。
    /// 参数、层数、粒径分级形状或修正器与河网不相容时构造失败。
    pub fn new(
        params: OverallParameters,
        network: RiverNetwork,
        methods: FlowMethods,
        sorting: Vec<StrataSortingMethod>,
        modifiers: ChangeRateModifiers,
    ) -> SfResult<Self> {
        params.validate()?;
        methods.validate()?;
        SfError::check_size("sorting", network.len(), sorting.len())?;

        let n_fractions = params.n_fractions();
        let template = network.reaches()[network.downstream_margin().as_usize()]
            .strata
            .active()
            .clone();
        for (reach, method) in network.reaches().iter().zip(&sorting) {
            method.check_layers(&reach.strata)?;
            for layer in reach.strata.layers() {
                ensure!(
                    layer.n_fractions() == n_fractions,
                    SfError::invalid_config(
                        "strata",
                        reach.id(),
                        format!("粒径分级数应为 {}，实际 {}", n_fractions, layer.n_fractions())
                    )
                );
                ensure!(
                    layer.matches(&template),
                    SfError::invalid_config("strata", reach.id(), "泥沙种类与其他河段不一致")
                );
            }
        }
        modifiers.check_network(&network)?;

        if !network.is_monotonic() {
            log::warn!("河段编号沿下游方向不递增，上游旁通捷径已关闭");
        }
        let sediment = BedloadTransport::from_methods(&methods);
        let mut simulation = Self {
            params,
            network,
            methods,
            water: UniformDischarge,
            sediment,
            sorting,
            modifiers,
            steps: 0,
        };
        simulation
            .methods
            .hydraulics
            .refresh_dependent_parameters(&mut simulation.network, &simulation.params);

        log::info!(
            "模拟已创建: {} 个河段, {} 个粒径分级, 结束时刻 {} s",
            simulation.network.len(),
            n_fractions,
            simulation.params.end_time
        );
        Ok(simulation)
    }

    // ========================================================================
    // 访问器
    // ========================================================================

    /// 全局参数
    #[inline]
    pub fn params(&self) -> &OverallParameters {
        &self.params
    }

    /// 河网
    #[inline]
    pub fn network(&self) -> &RiverNetwork {
        &self.network
    }

    /// 河网（可变）
    #[inline]
    pub fn network_mut(&mut self) -> &mut RiverNetwork {
        &mut self.network
    }

    /// 流动方法组合
    #[inline]
    pub fn methods(&self) -> &FlowMethods {
        &self.methods
    }

    /// 各河段分选方法（Arena 顺序）
    #[inline]
    pub fn sorting(&self) -> &[StrataSortingMethod] {
        &self.sorting
    }

    /// 修正器
    #[inline]
    pub fn modifiers(&self) -> &ChangeRateModifiers {
        &self.modifiers
    }

    /// 已完成步数
    #[inline]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// 是否已到达结束时刻
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.params.is_finished()
    }

    // ========================================================================
    // 推进
    // ========================================================================

    /// 推进一个时间步
    pub fn step(&mut self) -> SfResult<StepReport> {
        ensure!(
            !self.is_finished(),
            SfError::validation(format!("模拟已在 {} s 结束", self.params.end_time))
        );

        let ctx = FlowContext {
            params: &self.params,
            hydraulics: &self.methods.hydraulics,
        };
        let water_rounds = modify_change_rates(
            &self.water,
            self.modifiers.group_mut(FlowCategory::Water),
            &mut self.network,
            &ctx,
        )?;
        let sediment_rounds = modify_change_rates(
            &self.sediment,
            self.modifiers.group_mut(FlowCategory::Sediment),
            &mut self.network,
            &ctx,
        )?;

        let time_step = self.sediment.time_step(&self.network, &self.params);
        self.params.current_time_step = time_step;
        self.sediment.compute_changes(&mut self.network, time_step);
        self.sediment.hand_down_changes(&mut self.network);
        self.sediment.apply_changes(&mut self.network, &self.params);

        let sorted_reaches = self.sort_strata()?;
        self.methods
            .hydraulics
            .refresh_dependent_parameters(&mut self.network, &self.params);

        let remaining = self.params.end_time - self.params.elapsed_seconds;
        if time_step >= remaining {
            self.params.elapsed_seconds = self.params.end_time;
        } else {
            self.params.elapsed_seconds += time_step;
        }
        self.steps += 1;

        log::debug!(
            "第 {} 步: dt = {:.3} s, t = {:.3} s, 水流 {} 轮, 泥沙 {} 轮, 分选 {} 个河段",
            self.steps,
            time_step,
            self.params.elapsed_seconds,
            water_rounds,
            sediment_rounds,
            sorted_reaches
        );
        Ok(StepReport {
            time_step,
            water_rounds,
            sediment_rounds,
            sorted_reaches,
        })
    }

    /// 推进到结束时刻，返回步数
    pub fn run_until_end(&mut self) -> SfResult<usize> {
        let start = self.steps;
        while !self.is_finished() {
            let report = self.step()?;
            ensure!(
                report.time_step > 0.0,
                SfError::internal(format!(
                    "时间步长为 {} s，模拟无法推进 (t = {} s)",
                    report.time_step, self.params.elapsed_seconds
                ))
            );
        }
        log::info!(
            "模拟结束: {} 步, t = {} s",
            self.steps - start,
            self.params.elapsed_seconds
        );
        Ok(self.steps - start)
    }

    fn sort_strata(&mut self) -> SfResult<usize> {
        let diameters = &self.params.fractional_grain_diameters;
        let mut sorted = 0;
        for (reach, method) in self.network.reaches_mut().iter_mut().zip(&mut self.sorting) {
            if method.sort_strata(&mut reach.strata, diameters)? {
                sorted += 1;
            }
        }
        Ok(sorted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grains::{GrainKind, Grains};
    use crate::modifiers::{ModifierGroup, ModifierParams, SlopeClamp};
    use crate::reach::Reach;
    use crate::strata::LayerStack;

    fn network(layers: usize) -> RiverNetwork {
        let reach = |id: i64, down: Option<i64>, elevation: f64| {
            let strata = LayerStack::new(vec![
                Grains::from_fractions(GrainKind::Normal, vec![0.05, 0.05]);
                layers
            ])
            .unwrap();
            Reach::new(id, down, 100.0, elevation, strata).with_discharge(1.0)
        };
        RiverNetwork::new(vec![
            reach(1, Some(2), 2.0),
            reach(2, Some(3), 1.0),
            reach(3, None, 0.0),
        ])
        .unwrap()
    }

    fn params() -> OverallParameters {
        let mut p = OverallParameters::with_diameters(vec![0.004, 0.016]).unwrap();
        p.max_time_step = 10.0;
        p.end_time = 25.0;
        p
    }

    fn simulation(modifiers: ChangeRateModifiers) -> Simulation {
        Simulation::new(
            params(),
            network(1),
            FlowMethods::default(),
            vec![StrataSortingMethod::default(); 3],
            modifiers,
        )
        .unwrap()
    }

    #[test]
    fn test_sorting_count_mismatch_rejected() {
        let result = Simulation::new(
            params(),
            network(1),
            FlowMethods::default(),
            vec![StrataSortingMethod::default(); 2],
            ChangeRateModifiers::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_fraction_count_mismatch_rejected() {
        let p = OverallParameters::with_diameters(vec![0.004, 0.016, 0.064]).unwrap();
        let result = Simulation::new(
            p,
            network(1),
            FlowMethods::default(),
            vec![StrataSortingMethod::default(); 3],
            ChangeRateModifiers::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_layer_requirement_checked() {
        // 单层不分选要求恰好一层
        let result = Simulation::new(
            params(),
            network(2),
            FlowMethods::default(),
            vec![StrataSortingMethod::default(); 3],
            ChangeRateModifiers::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_run_until_end_snaps_to_end_time() {
        let mut sim = simulation(ChangeRateModifiers::default());
        let steps = sim.run_until_end().unwrap();
        assert_eq!(steps, 3);
        assert_eq!(sim.params().elapsed_seconds, 25.0);
        assert!((sim.params().current_time_step - 5.0).abs() < 1e-12);
        assert!(sim.is_finished());
        assert!(sim.step().is_err());
    }

    #[test]
    fn test_step_runs_modifier_groups() {
        let clamp = SlopeClamp::with_minimum_bed_slope(0.02, FlowCategory::Water);
        let group = ModifierGroup::from_params(
            FlowCategory::Water,
            &[ModifierParams::AdjustSlopesAtMargins(clamp)],
        )
        .unwrap();
        let mut sim = simulation(ChangeRateModifiers::new(vec![group]).unwrap());
        let report = sim.step().unwrap();
        assert_eq!(report.water_rounds, 2);
        assert_eq!(report.sediment_rounds, 1);
        assert!((sim.network().reaches()[0].elevation - 3.0).abs() < 1e-12);
    }
}
