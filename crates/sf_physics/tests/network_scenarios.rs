// crates/sf_physics/tests/network_scenarios.rs

//! 河网场景测试
//!
//! 在完整的时间步驱动下验证边界坡度约束、循环回流与上游旁通。

use sf_physics::capacity::{distribution_basis, CapacityContext};
use sf_physics::hydraulics::{bed_slope, water_surface_slope};
use sf_physics::prelude::*;
use sf_physics::{modify_change_rates, BedloadTransport, FlowContext, UniformDischarge};

// ============================================================
// 辅助函数
// ============================================================

fn layer(volumes: &[f64]) -> Grains {
    Grains::from_fractions(GrainKind::Normal, volumes.to_vec())
}

fn reach(id: i64, down: Option<i64>, elevation: f64, active: &[f64]) -> Reach {
    let strata = LayerStack::new(vec![layer(active)]).unwrap();
    Reach::new(id, down, 100.0, elevation, strata).with_discharge(1.0)
}

/// 三河段单支：上游边界、中间河段、下游出口
fn three_reach_branch(elevations: [f64; 3]) -> RiverNetwork {
    RiverNetwork::new(vec![
        reach(1, Some(2), elevations[0], &[0.05, 0.05]),
        reach(2, Some(3), elevations[1], &[0.05, 0.05]),
        reach(3, None, elevations[2], &[0.05, 0.05]),
    ])
    .unwrap()
}

fn params(end_time: f64) -> OverallParameters {
    let mut p = OverallParameters::with_diameters(vec![0.004, 0.016]).unwrap();
    p.max_time_step = 10.0;
    p.end_time = end_time;
    p
}

fn fixed_bed() -> FlowMethods {
    FlowMethods {
        capacity: CapacityMethod::Zero,
        ..Default::default()
    }
}

fn single_group(category: FlowCategory, modifier: ModifierParams) -> ChangeRateModifiers {
    let group = ModifierGroup::from_params(category, &[modifier]).unwrap();
    ChangeRateModifiers::new(vec![group]).unwrap()
}

fn simulation(
    network: RiverNetwork,
    methods: FlowMethods,
    modifiers: ChangeRateModifiers,
    end_time: f64,
) -> Simulation {
    let n = network.len();
    Simulation::new(
        params(end_time),
        network,
        methods,
        vec![StrataSortingMethod::default(); n],
        modifiers,
    )
    .unwrap()
}

// ============================================================
// 边界坡度约束
// ============================================================

#[test]
fn test_minimum_bed_slope_after_one_step() {
    // 初始床面坡度均为 0.01
    let network = three_reach_branch([2.0, 1.0, 0.0]);
    let clamp = SlopeClamp::with_minimum_bed_slope(0.02, FlowCategory::Water);
    let modifiers = single_group(FlowCategory::Water, ModifierParams::AdjustSlopesAtMargins(clamp));
    let mut sim = simulation(network, fixed_bed(), modifiers, 100.0);

    sim.step().unwrap();

    let net = sim.network();
    let upstream = net.index_of(1).unwrap();
    let middle = net.index_of(2).unwrap();
    assert!((net[upstream].elevation - 3.0).abs() < 1e-12);
    assert!((net[middle].elevation - 1.0).abs() < 1e-12);
    assert!((bed_slope(net, upstream) - 0.02).abs() < 1e-12);
    assert!((net[upstream].bed_slope - 0.02).abs() < 1e-12);
}

#[test]
fn test_bed_slope_bounds_hold_every_step() {
    // 上游过陡、出口过缓
    let network = three_reach_branch([10.0, 1.0, 0.995]);
    let clamp = SlopeClamp {
        maximum_bed_slope: Some(0.05),
        ..SlopeClamp::with_minimum_bed_slope(0.02, FlowCategory::Water)
    };
    let modifiers = single_group(FlowCategory::Water, ModifierParams::AdjustSlopesAtMargins(clamp));
    let mut sim = simulation(network, fixed_bed(), modifiers, 40.0);

    while !sim.is_finished() {
        sim.step().unwrap();
        let net = sim.network();
        for &idx in net.upstream_margins().iter().chain([net.downstream_margin()].iter()) {
            let slope = bed_slope(net, idx);
            assert!(slope >= 0.02 - 1e-12, "slope = {}", slope);
            assert!(slope <= 0.05 + 1e-12, "slope = {}", slope);
        }
    }
    let net = sim.network();
    assert!((net[net.index_of(1).unwrap()].elevation - 6.0).abs() < 1e-12);
    assert!((net[net.downstream_margin()].elevation + 1.0).abs() < 1e-12);
}

#[test]
fn test_inverted_bounds_disable_maximum() {
    let network = three_reach_branch([10.0, 1.0, 0.0]);
    let clamp = SlopeClamp {
        maximum_bed_slope: Some(0.01),
        ..SlopeClamp::with_minimum_bed_slope(0.02, FlowCategory::Water)
    };
    let modifiers = single_group(FlowCategory::Water, ModifierParams::AdjustSlopesAtMargins(clamp));
    let mut sim = simulation(network, fixed_bed(), modifiers, 20.0);
    sim.step().unwrap();

    let net = sim.network();
    let upstream = net.index_of(1).unwrap();
    assert_eq!(net[upstream].elevation, 10.0);
    assert!((bed_slope(net, net.downstream_margin()) - 0.02).abs() < 1e-12);
}

#[test]
fn test_water_surface_bounds_ensured_after_updates() {
    let network = three_reach_branch([2.0, 1.0, 0.0]);
    let clamp = SlopeClamp {
        minimum_water_surface_slope: Some(0.012),
        ensure_against_other_modifiers: true,
        ..SlopeClamp::with_minimum_bed_slope(0.0, FlowCategory::Water)
    };
    let modifiers = single_group(FlowCategory::Water, ModifierParams::AdjustSlopesAtMargins(clamp));
    let mut sim = simulation(network, fixed_bed(), modifiers, 30.0);

    while !sim.is_finished() {
        sim.step().unwrap();
        let net = sim.network();
        for &idx in net.upstream_margins().iter().chain([net.downstream_margin()].iter()) {
            let slope = water_surface_slope(net, idx);
            assert!(slope >= 0.012 - 1e-9, "slope = {}", slope);
        }
    }
}

#[test]
fn test_bed_slope_bounds_follow_moving_bed() {
    // 上游边界持续供沙，中间河段每步淤高，两次约束之间床面坡度会越界
    let mut network = three_reach_branch([2.0, 1.0, 0.0]);
    let upstream = network.index_of(1).unwrap();
    let middle = network.index_of(2).unwrap();
    network[upstream].erosion_rate = layer(&[0.5, 0.5]);

    let clamp = SlopeClamp {
        maximum_bed_slope: Some(0.05),
        ..SlopeClamp::with_minimum_bed_slope(0.02, FlowCategory::Water)
    };
    let mut group = ModifierGroup::from_params(
        FlowCategory::Water,
        &[ModifierParams::AdjustSlopesAtMargins(clamp)],
    )
    .unwrap();
    let methods = fixed_bed();
    let water = UniformDischarge;
    let sediment = BedloadTransport::from_methods(&methods);
    let mut params = params(60.0);
    methods
        .hydraulics
        .refresh_dependent_parameters(&mut network, &params);

    let mut shifts = 0;
    while !params.is_finished() {
        let ctx = FlowContext {
            params: &params,
            hydraulics: &methods.hydraulics,
        };
        modify_change_rates(&water, Some(&mut group), &mut network, &ctx).unwrap();
        modify_change_rates(&sediment, None, &mut network, &ctx).unwrap();
        for idx in [upstream, network.downstream_margin()] {
            let slope = bed_slope(&network, idx);
            assert!(slope >= 0.02 - 1e-12, "slope = {}", slope);
            assert!(slope <= 0.05 + 1e-12, "slope = {}", slope);
        }
        assert!((network[upstream].elevation - network[middle].elevation - 2.0).abs() < 1e-9);

        let before = network[middle].elevation;
        let dt = sediment.time_step(&network, &params);
        sediment.compute_changes(&mut network, dt);
        sediment.hand_down_changes(&mut network);
        sediment.apply_changes(&mut network, &params);
        methods
            .hydraulics
            .refresh_dependent_parameters(&mut network, &params);
        if network[middle].elevation > before {
            shifts += 1;
        }
        // 下一步的约束之前上游边界坡度低于下限
        assert!(bed_slope(&network, upstream) < 0.02);
        params.elapsed_seconds += dt;
    }
    assert_eq!(shifts, 6);
}

#[test]
fn test_water_surface_maximum_ensured_after_updates() {
    // 出口床面坡度 0.02，阻力关系给出的水面坡度超过上限
    let network = three_reach_branch([2.0, 1.0, -1.0]);
    let clamp = SlopeClamp {
        maximum_water_surface_slope: Some(0.012),
        ensure_against_other_modifiers: true,
        ..SlopeClamp::with_minimum_bed_slope(0.0, FlowCategory::Water)
    };
    let modifiers = single_group(FlowCategory::Water, ModifierParams::AdjustSlopesAtMargins(clamp));
    let mut sim = simulation(network, fixed_bed(), modifiers, 30.0);

    while !sim.is_finished() {
        sim.step().unwrap();
        let net = sim.network();
        for &idx in net.upstream_margins().iter().chain([net.downstream_margin()].iter()) {
            let slope = water_surface_slope(net, idx);
            assert!(slope <= 0.012 + 1e-9, "slope = {}", slope);
        }
        let outlet = net.downstream_margin();
        assert!((water_surface_slope(net, outlet) - 0.012).abs() < 1e-9);
        assert_eq!(net[outlet].elevation, -1.0);
        assert!(net[outlet].max_water_depth > 0.0);
    }
}

#[test]
fn test_unensured_water_surface_yields_to_flow_resistance() {
    // 不保证时，约束写入的水深被随后按阻力关系更新的水深覆盖
    let unensured = SlopeClamp {
        maximum_water_surface_slope: Some(0.012),
        ..SlopeClamp::with_minimum_bed_slope(0.0, FlowCategory::Water)
    };
    let bed_only = SlopeClamp::with_minimum_bed_slope(0.0, FlowCategory::Water);
    let mut with_surface = simulation(
        three_reach_branch([2.0, 1.0, -1.0]),
        fixed_bed(),
        single_group(FlowCategory::Water, ModifierParams::AdjustSlopesAtMargins(unensured)),
        30.0,
    );
    let mut without_surface = simulation(
        three_reach_branch([2.0, 1.0, -1.0]),
        fixed_bed(),
        single_group(FlowCategory::Water, ModifierParams::AdjustSlopesAtMargins(bed_only)),
        30.0,
    );

    while !with_surface.is_finished() {
        let a = with_surface.step().unwrap();
        let b = without_surface.step().unwrap();
        assert_eq!(a.water_rounds, b.water_rounds);
        let (na, nb) = (with_surface.network(), without_surface.network());
        for (ra, rb) in na.reaches().iter().zip(nb.reaches()) {
            assert_eq!(ra.max_water_depth, rb.max_water_depth);
            assert_eq!(ra.flow_velocity, rb.flow_velocity);
        }
        assert!(water_surface_slope(na, na.downstream_margin()) > 0.012);
    }
}

// ============================================================
// 循环回流
// ============================================================

#[test]
fn test_sediment_recirculation_lags_one_step() {
    let network = three_reach_branch([5.0, 4.0, 3.0]);
    let modifiers = single_group(
        FlowCategory::Sediment,
        ModifierParams::RecirculateSediment(RecirculateSediment::new(1.0, false)),
    );
    let mut sim = simulation(network, FlowMethods::default(), modifiers, 60.0);
    let inlet = sim.network().index_of(1).unwrap();
    let outlet = sim.network().downstream_margin();

    sim.step().unwrap();
    let mut output = sim.network()[outlet].deposition_rate.clone();
    assert!(output.overall_volume() > 0.0);

    while !sim.is_finished() {
        sim.step().unwrap();
        let net = sim.network();
        assert_eq!(net[inlet].erosion_rate, output);
        output = net[outlet].deposition_rate.clone();
    }
}

#[test]
fn test_water_recirculation_divides_outlet_discharge() {
    let network = RiverNetwork::new(vec![
        reach(1, Some(3), 2.0, &[0.05, 0.05]).with_discharge(1.0),
        reach(2, Some(3), 2.0, &[0.05, 0.05]).with_discharge(3.0),
        reach(3, None, 1.0, &[0.05, 0.05]),
    ])
    .unwrap();
    let modifiers = single_group(
        FlowCategory::Water,
        ModifierParams::RecirculateWater(RecirculateWater::new(2.0, false)),
    );
    let mut sim = simulation(network, fixed_bed(), modifiers, 30.0);

    // 首步没有上一步的出口状态，采用本步采样
    sim.step().unwrap();
    let net = sim.network();
    assert_eq!(net[net.index_of(1).unwrap()].discharge, 2.0);
    assert_eq!(net[net.index_of(2).unwrap()].discharge, 2.0);

    sim.step().unwrap();
    let net = sim.network();
    assert_eq!(net[net.downstream_margin()].discharge, 4.0);
    assert_eq!(net[net.index_of(1).unwrap()].discharge, 2.0);
}

// ============================================================
// 上游旁通
// ============================================================

fn bypass_network() -> RiverNetwork {
    let mut network = RiverNetwork::new(vec![
        reach(1, Some(2), 2.0, &[0.05, 0.05]),
        reach(2, Some(3), 1.0, &[0.0, 0.0]),
        reach(3, None, 0.0, &[0.05, 0.05]),
    ])
    .unwrap();
    let upstream = network.index_of(1).unwrap();
    network[upstream].erosion_rate = layer(&[0.003, 0.001]);
    network
}

#[test]
fn test_bypass_passes_upstream_rate_through() {
    let network = bypass_network();
    let params = params(60.0);
    let ctx = CapacityContext::new(&params, TraversalMode::Sequential);
    let middle = network.index_of(2).unwrap();

    let basis = distribution_basis(&CapacityMethod::default(), &network, middle, &ctx).unwrap();
    assert_eq!(basis, Some(layer(&[0.003, 0.001])));
}

#[test]
fn test_parallel_bypass_recurses_upstream() {
    let network = bypass_network();
    let params = params(60.0);
    let ctx = CapacityContext::new(&params, TraversalMode::Parallel);
    let capacity = CapacityMethod::default();
    let upstream = network.index_of(1).unwrap();
    let middle = network.index_of(2).unwrap();

    let expected = capacity.calculate(&network, upstream, &ctx).unwrap();
    let basis = distribution_basis(&capacity, &network, middle, &ctx).unwrap();
    if expected.overall_volume() > SEDIMENT_VOLUME_EPS {
        assert_eq!(basis, Some(expected));
    } else {
        assert_eq!(basis, None);
    }
}

#[test]
fn test_exhausted_basis_gives_zero_capacity() {
    let mut network = bypass_network();
    let upstream = network.index_of(1).unwrap();
    network[upstream].erosion_rate = layer(&[0.0, 0.0]);
    let params = params(60.0);
    let ctx = CapacityContext::new(&params, TraversalMode::Sequential);
    let middle = network.index_of(2).unwrap();

    let capacity = CapacityMethod::default();
    assert_eq!(distribution_basis(&capacity, &network, middle, &ctx).unwrap(), None);
    let rate = capacity.calculate(&network, middle, &ctx).unwrap();
    assert!(rate.is_zero());
}
