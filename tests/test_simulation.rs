use std::collections::BTreeSet;

use vm_consolidation_simulator::simulation::{simulate, ConsolidationSimulation};
use vm_consolidation_simulator::simulation_config::{
    HostConfig, PlacementAlgorithmKind, SimulationConfig,
};
use vm_consolidation_simulator::simulation_metrics::{
    CsvMetricsLogger, EmptyMetricsLogger, FileMetricsLogger, MetricsLogger,
};
use vm_consolidation_simulator::watermark_controller::{TARGET_UTIL_FLOOR, TARGET_UTIL_STEP};
use vm_consolidation_simulator::workload::{
    ConstantWorkload, SyntheticWorkload, TraceWorkload, WorkloadSource,
};

fn name_wrapper(file_name: &str) -> String {
    format!("test-configs/{}", file_name)
}

fn small_config(n_hosts: u32, n_vms: u32, cpu_cap: f64, cycles: u32) -> SimulationConfig {
    SimulationConfig {
        n_hosts,
        n_vms,
        cycles,
        host: HostConfig::new(cpu_cap, cpu_cap, 120.0, 300.0),
        ..SimulationConfig::default()
    }
}

fn build_simulation(
    sim_config: SimulationConfig,
    workload: Box<dyn WorkloadSource>,
    metrics_logger: Box<dyn MetricsLogger>,
) -> ConsolidationSimulation {
    ConsolidationSimulation::new(sim_config, workload, metrics_logger).unwrap()
}

fn constant_simulation(
    sim_config: SimulationConfig,
    workload: ConstantWorkload,
) -> ConsolidationSimulation {
    build_simulation(sim_config, Box::new(workload), Box::new(EmptyMetricsLogger {}))
}

fn assert_fleet_invariants(sim: &ConsolidationSimulation) {
    let n_vms = sim.config().n_vms as usize;
    let assigned: usize = sim.hosts().values().map(|host| host.vm_count()).sum();
    assert_eq!(assigned, n_vms);

    let mut seen = BTreeSet::new();
    for host in sim.hosts().values() {
        for vm_id in host.vms() {
            assert!(seen.insert(*vm_id), "vm #{} is assigned twice", vm_id);
            assert_eq!(sim.vm(*vm_id).unwrap().host_id, host.id);
        }
        assert!(host.raw_load(sim.vms()) <= host.cpu_cap);
        assert!(host.cpu_utilization(sim.predictor()) <= 1.0);
        assert_eq!(host.is_on(), !host.is_empty(), "host #{} power state mismatch", host.id);
    }
    assert_eq!(seen.len(), n_vms);
}

#[test]
fn test_default_scenario_is_deterministic() {
    let first = simulate(SimulationConfig::default()).unwrap();
    let second = simulate(SimulationConfig::default()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.energy_kwh_total.to_bits(), second.energy_kwh_total.to_bits());

    assert!(first.hosts_off_final <= 20);
    assert!(first.final_target_util >= TARGET_UTIL_FLOOR && first.final_target_util <= 0.80);
    assert!((0.0..=1.0).contains(&first.util_mean_final));
    assert!((0.0..=1.0).contains(&first.util_p95_final));
    assert!(first.util_p95_final >= first.util_mean_final);
    assert!(first.energy_kwh_total >= 0.0);
}

#[test]
fn test_default_scenario_moves_idle_vms() {
    let result = simulate(SimulationConfig::default()).unwrap();
    assert!(result.migrations_total > 0);
}

#[test]
fn test_invariants_hold_every_cycle() {
    let mut sim =
        ConsolidationSimulation::with_synthetic_workload(SimulationConfig::default()).unwrap();
    assert_fleet_invariants(&sim);
    while let Some(metrics) = sim.step() {
        assert_fleet_invariants(&sim);
        assert_eq!(metrics.hosts_on + metrics.hosts_off, 20);
        assert_eq!(metrics.hosts_off, sim.hosts_off());
    }
    assert_eq!(sim.current_cycle(), 24);
    assert!(sim.step().is_none());
}

#[test]
fn test_invariants_hold_with_best_fit() {
    let sim_config = SimulationConfig::from_file(&name_wrapper("small_fleet.yaml")).unwrap();
    assert_eq!(sim_config.placement_algorithm, PlacementAlgorithmKind::BestFit);
    let mut sim = ConsolidationSimulation::with_synthetic_workload(sim_config).unwrap();
    while sim.step().is_some() {
        assert_fleet_invariants(&sim);
    }
}

#[test]
fn test_different_seeds_differ() {
    let first = simulate(SimulationConfig::default()).unwrap();
    let second = simulate(SimulationConfig {
        seed: 8,
        ..SimulationConfig::default()
    })
    .unwrap();
    assert_ne!(first, second);
}

#[test]
fn test_single_host_single_vm() {
    let sim_config = SimulationConfig {
        n_hosts: 1,
        n_vms: 1,
        ..SimulationConfig::default()
    };
    let mut sim = ConsolidationSimulation::with_synthetic_workload(sim_config).unwrap();
    while sim.step().is_some() {
        assert_eq!(sim.vm(0).unwrap().host_id, 0);
        assert!(sim.host(0).unwrap().is_on());
    }
    let result = sim.result();
    assert_eq!(result.hosts_off_final, 0);
    assert_eq!(result.energy_kwh_total, 0.0);
    assert_eq!(result.migrations_total, 0);
}

#[test]
fn test_watermark_at_full_capacity_never_breaches() {
    let sim_config = SimulationConfig {
        hi_watermark: 1.0,
        ..SimulationConfig::default()
    };
    let result = simulate(sim_config).unwrap();
    assert_eq!(result.hi_watermark_breaches, 0);
    assert_eq!(result.final_target_util, 0.80);

    // Hosts packed with VMs at their limit are exactly at capacity, which is not a breach.
    let sim_config = SimulationConfig {
        hi_watermark: 1.0,
        ..small_config(2, 4, 200.0, 5)
    };
    let mut sim = constant_simulation(sim_config, ConstantWorkload::new(100.0));
    let result = sim.run();
    assert_eq!(result.hi_watermark_breaches, 0);
    assert_eq!(result.util_mean_final, 1.0);
}

#[test]
fn test_target_util_ratchet() {
    // Two VMs at 95% on every 200-unit host keep utilization at 0.95, above the 0.9 watermark.
    let mut sim = constant_simulation(small_config(2, 4, 200.0, 10), ConstantWorkload::new(95.0));
    let mut previous = sim.target_util();
    while let Some(metrics) = sim.step() {
        assert!(metrics.breached);
        let decrease = previous - metrics.target_util;
        assert!(decrease >= 0.0);
        assert!(
            decrease.abs() < 1e-9 || (decrease - TARGET_UTIL_STEP).abs() < 1e-9,
            "unexpected step {}",
            decrease
        );
        assert!(metrics.target_util >= TARGET_UTIL_FLOOR);
        previous = metrics.target_util;
    }
    let result = sim.result();
    assert_eq!(result.hi_watermark_breaches, 10);
    assert_eq!(result.final_target_util, TARGET_UTIL_FLOOR);
    assert_eq!(result.migrations_total, 0);
    assert_eq!(result.hosts_off_final, 0);
}

#[test]
fn test_ratchet_stops_at_floor_after_five_breaches() {
    let mut sim = constant_simulation(small_config(2, 4, 200.0, 5), ConstantWorkload::new(95.0));
    let targets: Vec<f64> = std::iter::from_fn(|| sim.step())
        .map(|metrics| metrics.target_util)
        .collect();
    let expected = [0.78, 0.76, 0.74, 0.72, 0.70];
    for (target, expected) in targets.iter().zip(expected) {
        assert!((target - expected).abs() < 1e-9);
    }
}

#[test]
fn test_idle_fleet_consolidates_onto_first_host() {
    let mut sim = constant_simulation(small_config(4, 8, 800.0, 5), ConstantWorkload::new(10.0));

    let first = sim.step().unwrap();
    assert_eq!(first.migrations, 6);
    assert_eq!(first.hosts_off, 3);
    assert_eq!(sim.host(0).unwrap().vm_count(), 8);

    let second = sim.step().unwrap();
    assert_eq!(second.migrations, 0);

    let result = sim.run();
    assert_eq!(result.migrations_total, 6);
    assert_eq!(result.hosts_off_final, 3);
    assert!((result.energy_kwh_total - 5.0 * 3.0 * 120.0 / 1000.0).abs() < 1e-9);
    assert!((result.util_mean_final - 0.1).abs() < 1e-9);
    assert!((result.util_p95_final - 0.1).abs() < 1e-9);
    assert_eq!(result.hi_watermark_breaches, 0);
}

#[test]
fn test_energy_scales_with_cycle_duration() {
    let sim_config = SimulationConfig {
        dt_hours: 0.5,
        ..small_config(4, 8, 800.0, 4)
    };
    let result = constant_simulation(sim_config, ConstantWorkload::new(10.0)).run();
    assert!((result.energy_kwh_total - 4.0 * 0.5 * 3.0 * 120.0 / 1000.0).abs() < 1e-9);
}

#[test]
fn test_busy_vms_are_not_moved() {
    let mut sim = constant_simulation(small_config(4, 8, 800.0, 6), ConstantWorkload::new(50.0));
    let result = sim.run();
    assert_eq!(result.migrations_total, 0);
    assert_eq!(result.hosts_off_final, 0);
    assert_eq!(result.energy_kwh_total, 0.0);
}

#[test]
fn test_target_util_limits_packing_on_default_hosts() {
    // Host #0 holds four VMs at 95, host #1 four idle VMs at 25; 800-unit hosts fit 8 VMs each.
    let workload = || {
        [1, 3, 5, 7]
            .into_iter()
            .fold(ConstantWorkload::new(95.0), |workload, vm_id| {
                workload.with_vm_usage(vm_id, 25.0)
            })
    };

    // 380 + 2 * 25 fits under 0.55 * 800 = 440, a third idle VM does not.
    let tight = SimulationConfig {
        target_util: 0.55,
        ..small_config(2, 8, 800.0, 3)
    };
    let mut sim = constant_simulation(tight, workload());
    let result = sim.run();
    assert_eq!(result.migrations_total, 2);
    assert_eq!(result.hosts_off_final, 0);
    assert_eq!(sim.host(0).unwrap().vm_count(), 6);
    assert_eq!(sim.vm(5).unwrap().host_id, 1);

    let loose = small_config(2, 8, 800.0, 3);
    let result = constant_simulation(loose, workload()).run();
    assert_eq!(result.migrations_total, 4);
    assert_eq!(result.hosts_off_final, 1);
    assert!((result.util_mean_final - 480.0 / 800.0).abs() < 1e-9);
}

// Assumption: a candidate that no host admits stays in place and is reconsidered
// in every following cycle, so it is counted as degraded once per cycle.
#[test]
fn test_unplaceable_candidate_stays_and_is_retried() {
    let sim_config = SimulationConfig {
        target_util: 0.5,
        ..small_config(1, 2, 200.0, 4)
    };
    let workload = ConstantWorkload::new(90.0).with_vm_usage(1, 25.0);
    let mut sim = constant_simulation(sim_config, workload);
    while let Some(metrics) = sim.step() {
        assert_eq!(metrics.degradations, 1);
        assert_eq!(metrics.migrations, 0);
        assert_eq!(sim.vm(1).unwrap().host_id, 0);
    }
    assert_eq!(sim.degradations_total(), 4);
    let result = sim.result();
    assert_eq!(result.hi_watermark_breaches, 0);
    assert!((result.util_mean_final - 115.0 / 200.0).abs() < 1e-9);
}

#[test]
fn test_spare_hosts_power_off() {
    // More hosts than VMs: the spare hosts power off during the first cycle.
    let mut sim = constant_simulation(small_config(3, 1, 800.0, 1), ConstantWorkload::new(40.0));
    let result = sim.run();
    assert_eq!(result.hosts_off_final, 2);
    assert!((result.util_mean_final - 40.0 / 800.0).abs() < 1e-9);
}

#[test]
fn test_cloned_workload_replays_identically() {
    let sim_config = SimulationConfig::default();
    let workload: Box<dyn WorkloadSource> = Box::new(SyntheticWorkload::from_config(&sim_config));
    let replay = dyn_clone::clone_box(&*workload);

    let mut first = build_simulation(sim_config.clone(), workload, Box::new(EmptyMetricsLogger {}));
    let mut second = build_simulation(sim_config, replay, Box::new(EmptyMetricsLogger {}));
    assert_eq!(first.run(), second.run());
}

#[test]
fn test_trace_workload_simulation() {
    let sim_config = small_config(2, 4, 400.0, 3);
    let trace = TraceWorkload::from_file(&name_wrapper("trace.csv"), sim_config.n_vms).unwrap();
    let mut sim = build_simulation(sim_config, Box::new(trace), Box::new(EmptyMetricsLogger {}));
    sim.step().unwrap();
    // vm #1 runs at 80% and stays on host #1, the idle ones gather on host #0.
    assert_eq!(sim.vm(1).unwrap().host_id, 1);
    assert_eq!(sim.vm(0).unwrap().host_id, 0);
    assert_eq!(sim.vm(2).unwrap().host_id, 0);
    assert_eq!(sim.vm(3).unwrap().host_id, 0);

    // vm #1 has no sample at cycle 1 and keeps reporting 80.
    sim.step().unwrap();
    assert_eq!(sim.vm(1).unwrap().usage, 80.0);
    sim.run();
    assert_fleet_invariants(&sim);
}

#[test]
fn test_metrics_are_saved_as_csv() {
    let path = std::env::temp_dir().join("vm_consolidation_metrics_test.csv");
    let path = path.to_str().unwrap().to_string();
    let sim_config = small_config(4, 8, 800.0, 5);
    let workload = SyntheticWorkload::from_config(&sim_config);
    let metrics_logger = Box::new(CsvMetricsLogger::new());
    let mut sim = build_simulation(sim_config, Box::new(workload), metrics_logger);
    sim.run();
    sim.finish_simulation(&path).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert!(headers.iter().any(|header| header == "energy_saved_kwh"));
    assert_eq!(reader.records().count(), 5);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_metrics_are_saved_as_json() {
    let path = std::env::temp_dir().join("vm_consolidation_metrics_test.json");
    let path = path.to_str().unwrap().to_string();
    let sim_config = small_config(4, 8, 800.0, 3);
    let workload = ConstantWorkload::new(10.0);
    let metrics_logger = Box::new(FileMetricsLogger::new());
    let mut sim = build_simulation(sim_config, Box::new(workload), metrics_logger);
    sim.run();
    sim.finish_simulation(&path).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let history: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0]["migrations"], 6);
    assert_eq!(history[2]["cycle"], 2);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_result_serializes_seven_fields() {
    let result = simulate(small_config(4, 8, 800.0, 2)).unwrap();
    let json = serde_json::to_value(&result).unwrap();
    let fields: BTreeSet<&str> = json.as_object().unwrap().keys().map(|key| key.as_str()).collect();
    let expected: BTreeSet<&str> = [
        "energy_kwh_total",
        "migrations_total",
        "hosts_off_final",
        "util_mean_final",
        "util_p95_final",
        "hi_watermark_breaches",
        "final_target_util",
    ]
    .into_iter()
    .collect();
    assert_eq!(fields, expected);
}
