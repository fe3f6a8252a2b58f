//! Simulation configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::vm::VM_CPU_LIMIT;

/// Holds configuration shared by every physical host of the fleet.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host CPU capacity, in the same units as VM usage samples. Every VM reserves
    /// `VM_CPU_LIMIT` of it, so a host holds at most `cpu_cap / 100` VMs whatever their
    /// usage. With the default 800 the target utilization only limits packing once
    /// pinned VMs are busy, and watermark breaches need hosts full of near-peak VMs.
    pub cpu_cap: f64,
    /// Host memory capacity. Reported only, placement is driven by CPU.
    pub mem_cap: f64,
    /// Power draw of an idle host in watts.
    pub power_idle_watts: f64,
    /// Power draw of a fully loaded host in watts.
    pub power_peak_watts: f64,
}

impl HostConfig {
    pub fn new(cpu_cap: f64, mem_cap: f64, power_idle_watts: f64, power_peak_watts: f64) -> Self {
        Self {
            cpu_cap,
            mem_cap,
            power_idle_watts,
            power_peak_watts,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::new(800.0, 800.0, 120.0, 300.0)
    }
}

/// Parameters of the synthetic per-VM usage generator.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Lower bound of the per-VM baseline usage.
    pub baseline_min: f64,
    /// Upper bound of the per-VM baseline usage.
    pub baseline_max: f64,
    /// Amplitude of the 24-hour component.
    pub diurnal_amplitude: f64,
    /// Amplitude of the 168-hour component.
    pub weekly_amplitude: f64,
    /// Half-width of the uniform noise added to every sample.
    pub noise: f64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            baseline_min: 10.0,
            baseline_max: 60.0,
            diurnal_amplitude: 10.0,
            weekly_amplitude: 5.0,
            noise: 8.0,
        }
    }
}

/// Host selection strategy used by the consolidation planner.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
pub enum PlacementAlgorithmKind {
    #[default]
    FirstFit,
    BestFit,
}

/// Holds raw simulation config parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
struct RawSimulationConfig {
    pub alpha: Option<f64>,
    pub low_usage_threshold: Option<f64>,
    pub target_util: Option<f64>,
    pub hi_watermark: Option<f64>,
    pub dt_hours: Option<f64>,
    pub cycles: Option<u32>,
    pub n_hosts: Option<u32>,
    pub n_vms: Option<u32>,
    pub seed: Option<u64>,
    pub host: Option<HostConfig>,
    pub workload: Option<WorkloadConfig>,
    pub placement_algorithm: Option<PlacementAlgorithmKind>,
}

/// Represents simulation configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// EMA responsiveness, in [0, 1].
    pub alpha: f64,
    /// Predicted usage below which a VM is a consolidation candidate, in [0, 100].
    pub low_usage_threshold: f64,
    /// Initial packing ceiling as a fraction of host capacity, in [0.5, 0.95].
    pub target_util: f64,
    /// Host utilization above which a cycle is counted as a breach, in [0.8, 1.0].
    pub hi_watermark: f64,
    /// Cycle duration in hours.
    pub dt_hours: f64,
    /// Number of cycles to simulate.
    pub cycles: u32,
    /// Number of physical hosts.
    pub n_hosts: u32,
    /// Number of VMs.
    pub n_vms: u32,
    /// Seed of the workload random stream.
    pub seed: u64,
    /// Template of every host in the fleet.
    pub host: HostConfig,
    /// Synthetic workload parameters.
    pub workload: WorkloadConfig,
    /// Host selection strategy.
    pub placement_algorithm: PlacementAlgorithmKind,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            low_usage_threshold: 30.0,
            target_util: 0.80,
            hi_watermark: 0.90,
            dt_hours: 1.0,
            cycles: 24,
            n_hosts: 20,
            n_vms: 120,
            seed: 7,
            host: HostConfig::default(),
            workload: WorkloadConfig::default(),
            placement_algorithm: PlacementAlgorithmKind::FirstFit,
        }
    }
}

impl SimulationConfig {
    /// Reads config from YAML file, filling absent fields with defaults, and validates it.
    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(file_name).map_err(|source| ConfigError::Read {
            path: file_name.to_string(),
            source,
        })?;
        Self::from_yaml_str(&contents).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: file_name.to_string(),
                source,
            },
            other => other,
        })
    }

    /// Parses config from YAML text, filling absent fields with defaults, and validates it.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawSimulationConfig =
            serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: "<inline>".to_string(),
                source,
            })?;
        let default = Self::default();

        let config = Self {
            alpha: raw.alpha.unwrap_or(default.alpha),
            low_usage_threshold: raw.low_usage_threshold.unwrap_or(default.low_usage_threshold),
            target_util: raw.target_util.unwrap_or(default.target_util),
            hi_watermark: raw.hi_watermark.unwrap_or(default.hi_watermark),
            dt_hours: raw.dt_hours.unwrap_or(default.dt_hours),
            cycles: raw.cycles.unwrap_or(default.cycles),
            n_hosts: raw.n_hosts.unwrap_or(default.n_hosts),
            n_vms: raw.n_vms.unwrap_or(default.n_vms),
            seed: raw.seed.unwrap_or(default.seed),
            host: raw.host.unwrap_or(default.host),
            workload: raw.workload.unwrap_or(default.workload),
            placement_algorithm: raw.placement_algorithm.unwrap_or(default.placement_algorithm),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks every field against its documented range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("alpha", self.alpha, 0.0, 1.0)?;
        check_range("low_usage_threshold", self.low_usage_threshold, 0.0, 100.0)?;
        check_range("target_util", self.target_util, 0.5, 0.95)?;
        check_range("hi_watermark", self.hi_watermark, 0.8, 1.0)?;
        check_positive("dt_hours", self.dt_hours)?;
        if self.cycles < 1 {
            return Err(ConfigError::out_of_range("cycles", "must be at least 1"));
        }
        if self.n_hosts < 1 {
            return Err(ConfigError::out_of_range("n_hosts", "must be at least 1"));
        }
        if self.n_vms < 1 {
            return Err(ConfigError::out_of_range("n_vms", "must be at least 1"));
        }

        check_positive("host.cpu_cap", self.host.cpu_cap)?;
        check_positive("host.mem_cap", self.host.mem_cap)?;
        check_range("host.power_idle_watts", self.host.power_idle_watts, 0.0, f64::MAX)?;
        let peak = self.host.power_peak_watts;
        if peak.is_nan() || peak < self.host.power_idle_watts {
            return Err(ConfigError::out_of_range(
                "host.power_peak_watts",
                format!(
                    "must be at least power_idle_watts ({}), got {}",
                    self.host.power_idle_watts, self.host.power_peak_watts
                ),
            ));
        }
        let vms_per_host = self.n_vms.div_ceil(self.n_hosts);
        let needed = vms_per_host as f64 * VM_CPU_LIMIT;
        if self.host.cpu_cap < needed {
            return Err(ConfigError::out_of_range(
                "host.cpu_cap",
                format!(
                    "initial layout puts {} vms on a host, which needs cpu_cap >= {}, got {}",
                    vms_per_host, needed, self.host.cpu_cap
                ),
            ));
        }

        let workload = &self.workload;
        check_range("workload.baseline_min", workload.baseline_min, 0.0, VM_CPU_LIMIT)?;
        check_range(
            "workload.baseline_max",
            workload.baseline_max,
            workload.baseline_min,
            VM_CPU_LIMIT,
        )?;
        check_range("workload.diurnal_amplitude", workload.diurnal_amplitude, 0.0, VM_CPU_LIMIT)?;
        check_range("workload.weekly_amplitude", workload.weekly_amplitude, 0.0, VM_CPU_LIMIT)?;
        check_range("workload.noise", workload.noise, 0.0, VM_CPU_LIMIT)?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else if max == f64::MAX {
        Err(ConfigError::out_of_range(field, format!("must be at least {}, got {}", min, value)))
    } else {
        Err(ConfigError::out_of_range(
            field,
            format!("must be within [{}, {}], got {}", min, max, value),
        ))
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(field, format!("must be positive, got {}", value)))
    }
}
