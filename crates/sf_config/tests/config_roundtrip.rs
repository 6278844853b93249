// crates/sf_config/tests/config_roundtrip.rs

//! 配置往返测试
//!
//! 从 JSON 构建模拟、推进若干步、导出快照并重新构建。

use sf_config::prelude::*;
use sf_physics::prelude::*;

const FLUME: &str = r#"{
  "parameters": {
    "fractional_grain_diameters": [0.004, 0.016],
    "max_time_step": 10.0,
    "end_time": 40.0
  },
  "reaches": [
    { "id": 1, "downstream_id": 2, "length": 100.0, "elevation": 2.0,
      "discharge": 1.0, "strata": [ { "Normal": [0.05, 0.05] } ] },
    { "id": 2, "downstream_id": 3, "length": 100.0, "elevation": 1.0,
      "strata": [ { "Normal": [0.05, 0.05] } ] },
    { "id": 3, "length": 100.0, "elevation": 0.0,
      "strata": [ { "Normal": [0.05, 0.05] } ] }
  ],
  "methods": { "capacity": { "type": "Zero" } },
  "modifiers": [
    { "category": "Water",
      "modifiers": [
        { "type": "AdjustSlopesAtMargins", "minimum_bed_slope": 0.02 },
        { "type": "RecirculateWater" }
      ] }
  ]
}"#;

#[test]
fn test_json_builds_and_runs() {
    let config = SimulationConfig::from_json_str(FLUME).unwrap();
    assert_eq!(config.modifiers[0].modifiers.len(), 2);

    let mut sim = config.build().unwrap();
    let steps = sim.run_until_end().unwrap();
    assert_eq!(steps, 4);

    let net = sim.network();
    let inlet = net.index_of(1).unwrap();
    assert!((net[inlet].elevation - 3.0).abs() < 1e-12);
    assert_eq!(net[inlet].discharge, 1.0);
}

#[test]
fn test_snapshot_survives_json() {
    let mut sim = SimulationConfig::from_json_str(FLUME).unwrap().build().unwrap();
    sim.step().unwrap();

    let snapshot = SimulationConfig::from_simulation(&sim);
    let json = snapshot.to_json_string().unwrap();
    let parsed = SimulationConfig::from_json_str(&json).unwrap();
    assert_eq!(parsed.reaches.len(), snapshot.reaches.len());
    assert_eq!(parsed.modifiers, snapshot.modifiers);
    for (a, b) in parsed.reaches.iter().zip(&snapshot.reaches) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.downstream_id, b.downstream_id);
        assert!((a.elevation - b.elevation).abs() < 1e-12);
        assert!((a.max_water_depth - b.max_water_depth).abs() < 1e-12);
    }

    let rebuilt = parsed.build().unwrap();
    assert_eq!(rebuilt.params().elapsed_seconds, 10.0);
    let net = rebuilt.network();
    assert!((net[net.index_of(1).unwrap()].elevation - 3.0).abs() < 1e-12);
    assert_eq!(rebuilt.modifiers().groups().len(), 1);
}

#[test]
fn test_invalid_sorting_parameters_fail_build() {
    let mut config = SimulationConfig::from_json_str(FLUME).unwrap();
    let active = config.reaches[1].strata[0].clone();
    config.reaches[1].strata.push(active);
    config.reaches[1].sorting = StrataSortingParams::ConstantThreshold(ConstantThresholdParams {
        layer_thickness: 0.1,
        minimum_factor: 1.2,
        maximum_factor: 1.0,
    });
    assert!(matches!(config.build(), Err(ConfigError::Build(_))));
}

#[test]
fn test_malformed_json_is_parse_error() {
    let err = SimulationConfig::from_json_str("{ \"reaches\": [").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_duplicate_modifier_group_rejected() {
    let mut config = SimulationConfig::from_json_str(FLUME).unwrap();
    let water = config.modifiers[0].clone();
    config.modifiers.push(water);
    assert!(config.build().is_err());
}

#[test]
fn test_file_round_trip() {
    let config = SimulationConfig::from_json_str(FLUME).unwrap();
    let path = std::env::temp_dir().join(format!("sf_config_roundtrip_{}.json", std::process::id()));
    config.save_to_file(&path).unwrap();
    let loaded = SimulationConfig::from_json_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(loaded, config);
}
