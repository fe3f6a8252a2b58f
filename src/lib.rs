//! Energy-aware VM consolidation simulator.
//!
//! Every cycle the simulation samples per-VM usage, smooths it with an EMA,
//! greedily repacks low-usage VMs onto fewer hosts, powers off emptied hosts
//! and lowers the packing ceiling whenever some host runs above the watermark.

pub mod consolidation_planner;
pub mod default_placement_algorithms;
pub mod energy_accountant;
pub mod error;
pub mod host;
pub mod placement_algorithm;
pub mod power_model;
pub mod predictor;
pub mod simulation;
pub mod simulation_config;
pub mod simulation_metrics;
pub mod vm;
pub mod watermark_controller;
pub mod workload;

pub use error::{ConfigError, WorkloadError};
pub use simulation::{simulate, ConsolidationSimulation, SimulationResult};
pub use simulation_config::SimulationConfig;
