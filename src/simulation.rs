//! Cycle-driven consolidation simulation.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::consolidation_planner::ConsolidationPlanner;
use crate::energy_accountant::EnergyAccountant;
use crate::error::ConfigError;
use crate::host::{on_host_utilizations, Host};
use crate::placement_algorithm::placement_algorithm_resolver;
use crate::power_model::LinearPowerModel;
use crate::predictor::UsagePredictor;
use crate::simulation_config::SimulationConfig;
use crate::simulation_metrics::{
    mean, percentile_95, CycleMetrics, EmptyMetricsLogger, MetricsLogger,
};
use crate::vm::Vm;
use crate::watermark_controller::WatermarkController;
use crate::workload::{SyntheticWorkload, WorkloadSource};

/// Summary of a finished simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub energy_kwh_total: f64,
    pub migrations_total: u64,
    pub hosts_off_final: u32,
    pub util_mean_final: f64,
    pub util_p95_final: f64,
    pub hi_watermark_breaches: u32,
    pub final_target_util: f64,
}

impl Display for SimulationResult {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "energy_kwh_total: {:.3}, migrations_total: {}, hosts_off_final: {}, \
             util_mean_final: {:.4}, util_p95_final: {:.4}, hi_watermark_breaches: {}, \
             final_target_util: {:.3}",
            self.energy_kwh_total,
            self.migrations_total,
            self.hosts_off_final,
            self.util_mean_final,
            self.util_p95_final,
            self.hi_watermark_breaches,
            self.final_target_util
        )
    }
}

/// Mutable run counters, owned by the simulation.
#[derive(Debug, Clone, PartialEq)]
struct RuntimeState {
    target_util: f64,
    migrations_total: u64,
    breaches_total: u32,
    degradations_total: u64,
}

pub struct ConsolidationSimulation {
    hosts: BTreeMap<u32, Host>,
    vms: BTreeMap<u32, Vm>,

    workload: Box<dyn WorkloadSource>,
    predictor: UsagePredictor,
    planner: ConsolidationPlanner,
    watermark_controller: WatermarkController,
    energy_accountant: EnergyAccountant,
    metrics_logger: Box<dyn MetricsLogger>,

    state: RuntimeState,
    current_cycle: u32,
    sim_config: SimulationConfig,
}

impl ConsolidationSimulation {
    /// Creates a simulation with specified config, workload source and metrics logger.
    /// All hosts start powered on, VM `i` is placed on host `i mod n_hosts`.
    pub fn new(
        sim_config: SimulationConfig,
        workload: Box<dyn WorkloadSource>,
        metrics_logger: Box<dyn MetricsLogger>,
    ) -> Result<Self, ConfigError> {
        sim_config.validate()?;

        let mut hosts = BTreeMap::new();
        for host_id in 0..sim_config.n_hosts {
            hosts.insert(host_id, Host::from_config(host_id, &sim_config.host));
        }
        let mut vms = BTreeMap::new();
        for vm_id in 0..sim_config.n_vms {
            let host_id = vm_id % sim_config.n_hosts;
            vms.insert(vm_id, Vm::new(vm_id, host_id));
            if let Some(host) = hosts.get_mut(&host_id) {
                host.assign_vm(vm_id);
            }
        }

        let planner = ConsolidationPlanner::new(
            sim_config.low_usage_threshold,
            placement_algorithm_resolver(sim_config.placement_algorithm),
        );
        Ok(Self {
            hosts,
            vms,
            workload,
            predictor: UsagePredictor::new(sim_config.alpha),
            planner,
            watermark_controller: WatermarkController::new(sim_config.hi_watermark),
            energy_accountant: EnergyAccountant::new(Box::new(LinearPowerModel::new())),
            metrics_logger,
            state: RuntimeState {
                target_util: sim_config.target_util,
                migrations_total: 0,
                breaches_total: 0,
                degradations_total: 0,
            },
            current_cycle: 0,
            sim_config,
        })
    }

    /// Creates a simulation driven by the seeded synthetic workload, without metrics logging.
    pub fn with_synthetic_workload(sim_config: SimulationConfig) -> Result<Self, ConfigError> {
        let workload = SyntheticWorkload::from_config(&sim_config);
        Self::new(sim_config, Box::new(workload), Box::new(EmptyMetricsLogger {}))
    }

    /// Runs a single cycle: predict, plan, check watermark, account energy.
    /// Returns `None` once all configured cycles are done.
    pub fn step(&mut self) -> Option<CycleMetrics> {
        if self.is_finished() {
            return None;
        }
        let cycle = self.current_cycle;

        for vm in self.vms.values_mut() {
            vm.usage = self.workload.sample(cycle, vm.id);
            self.predictor.update(vm.id, vm.usage);
        }

        let outcome = self
            .planner
            .plan(&mut self.hosts, &mut self.vms, &self.predictor, self.state.target_util);
        self.state.migrations_total += outcome.migrations as u64;
        self.state.degradations_total += outcome.degradations as u64;

        let verdict = self
            .watermark_controller
            .check(&self.hosts, &self.predictor, self.state.target_util);
        if verdict.breached {
            self.state.breaches_total += 1;
        }
        self.state.target_util = verdict.target_util;

        let energy = self
            .energy_accountant
            .accumulate(&self.hosts, &self.predictor, self.sim_config.dt_hours);

        let utilizations = on_host_utilizations(&self.hosts, &self.predictor);
        let hosts_on = utilizations.len() as u32;
        let metrics = CycleMetrics {
            cycle,
            target_util: self.state.target_util,
            migrations: outcome.migrations,
            degradations: outcome.degradations,
            hosts_on,
            hosts_off: self.hosts.len() as u32 - hosts_on,
            util_mean: mean(&utilizations),
            util_p95: percentile_95(&utilizations),
            breached: verdict.breached,
            energy_saved_kwh: energy.saved_kwh,
            energy_consumed_kwh: energy.consumed_kwh,
        };
        debug!(
            "cycle {}: {} migrations, {} degradations, {} host(s) powered off, {} powered on",
            cycle, outcome.migrations, outcome.degradations, outcome.powered_off, outcome.powered_on
        );
        self.metrics_logger.log_metrics(&metrics);
        self.current_cycle += 1;
        Some(metrics)
    }

    /// Steps through the remaining cycles and returns the summary.
    pub fn run(&mut self) -> SimulationResult {
        while self.step().is_some() {}
        let result = self.result();
        info!("simulation finished after {} cycles: {}", self.current_cycle, result);
        result
    }

    /// Summary of the current state. Utilization statistics cover powered-on hosts only.
    pub fn result(&self) -> SimulationResult {
        let utilizations = on_host_utilizations(&self.hosts, &self.predictor);
        SimulationResult {
            energy_kwh_total: self.energy_accountant.saved_kwh(),
            migrations_total: self.state.migrations_total,
            hosts_off_final: self.hosts_off(),
            util_mean_final: mean(&utilizations),
            util_p95_final: percentile_95(&utilizations),
            hi_watermark_breaches: self.state.breaches_total,
            final_target_util: self.state.target_util,
        }
    }

    /// Saves the metrics log to `path`.
    pub fn finish_simulation(&mut self, path: &str) -> Result<(), std::io::Error> {
        self.metrics_logger.save_log(path)
    }

    pub fn is_finished(&self) -> bool {
        self.current_cycle >= self.sim_config.cycles
    }

    /// Number of cycles completed so far.
    pub fn current_cycle(&self) -> u32 {
        self.current_cycle
    }

    pub fn target_util(&self) -> f64 {
        self.state.target_util
    }

    pub fn hosts(&self) -> &BTreeMap<u32, Host> {
        &self.hosts
    }

    pub fn host(&self, host_id: u32) -> Option<&Host> {
        self.hosts.get(&host_id)
    }

    pub fn vms(&self) -> &BTreeMap<u32, Vm> {
        &self.vms
    }

    pub fn vm(&self, vm_id: u32) -> Option<&Vm> {
        self.vms.get(&vm_id)
    }

    pub fn predictor(&self) -> &UsagePredictor {
        &self.predictor
    }

    pub fn hosts_off(&self) -> u32 {
        self.hosts.values().filter(|host| !host.is_on()).count() as u32
    }

    /// Total energy drawn by powered-on hosts so far, in kWh.
    pub fn energy_consumed_kwh(&self) -> f64 {
        self.energy_accountant.consumed_kwh()
    }

    /// Candidates left in place because no host admitted them, over all cycles.
    pub fn degradations_total(&self) -> u64 {
        self.state.degradations_total
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.sim_config
    }
}

/// Builds a simulation with the synthetic workload, runs it to the end and returns the summary.
pub fn simulate(sim_config: SimulationConfig) -> Result<SimulationResult, ConfigError> {
    Ok(ConsolidationSimulation::with_synthetic_workload(sim_config)?.run())
}
