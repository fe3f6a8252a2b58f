//! VM workload sources.

use std::collections::{BTreeMap, HashMap};
use std::f64::consts::PI;
use std::io::Read;

use dyn_clone::{clone_trait_object, DynClone};
use log::warn;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::Deserialize;

use crate::error::WorkloadError;
use crate::simulation_config::{SimulationConfig, WorkloadConfig};
use crate::vm::VM_CPU_LIMIT;

const HOURS_PER_DAY: f64 = 24.0;
const HOURS_PER_WEEK: f64 = 24.0 * 7.0;

/// A workload source is a function, which defines raw usage of VM X at cycle t.
/// The returned value is within [0, VM_CPU_LIMIT].
///
/// Sources may draw from a random stream, so the simulation queries them in a
/// fixed order: cycle by cycle, VMs by ascending id.
pub trait WorkloadSource: DynClone {
    fn sample(&mut self, cycle: u32, vm_id: u32) -> f64;
}

clone_trait_object!(WorkloadSource);

#[derive(Clone)]
pub struct ConstantWorkload {
    usage: HashMap<u32, f64>,
    default_usage: f64,
}

impl ConstantWorkload {
    /// Every VM reports `usage` at every cycle.
    pub fn new(usage: f64) -> Self {
        Self {
            usage: HashMap::new(),
            default_usage: usage.clamp(0.0, VM_CPU_LIMIT),
        }
    }

    /// Overrides the usage of a single VM.
    pub fn with_vm_usage(mut self, vm_id: u32, usage: f64) -> Self {
        self.usage.insert(vm_id, usage.clamp(0.0, VM_CPU_LIMIT));
        self
    }
}

impl WorkloadSource for ConstantWorkload {
    fn sample(&mut self, _cycle: u32, vm_id: u32) -> f64 {
        self.usage.get(&vm_id).copied().unwrap_or(self.default_usage)
    }
}

#[derive(Clone, Debug)]
struct VmProfile {
    baseline: f64,
    phase: f64,
}

/// Synthetic usage: per-VM baseline plus diurnal and weekly sinusoids plus
/// uniform noise, all drawn from a single seeded stream.
#[derive(Clone)]
pub struct SyntheticWorkload {
    config: WorkloadConfig,
    dt_hours: f64,
    profiles: Vec<VmProfile>,
    rng: Pcg64,
}

impl SyntheticWorkload {
    pub fn new(config: WorkloadConfig, n_vms: u32, dt_hours: f64, rng: Pcg64) -> Self {
        let mut workload = Self {
            config,
            dt_hours,
            profiles: Vec::with_capacity(n_vms as usize),
            rng,
        };
        workload.ensure_profiles(n_vms as usize);
        workload
    }

    /// Builds the generator for a simulation config, seeding the stream with `config.seed`.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            config.workload.clone(),
            config.n_vms,
            config.dt_hours,
            Pcg64::seed_from_u64(config.seed),
        )
    }

    fn ensure_profiles(&mut self, count: usize) {
        while self.profiles.len() < count {
            let baseline = if self.config.baseline_min < self.config.baseline_max {
                self.rng.gen_range(self.config.baseline_min..self.config.baseline_max)
            } else {
                self.config.baseline_min
            };
            let phase = self.rng.gen_range(0.0..2.0 * PI);
            self.profiles.push(VmProfile { baseline, phase });
        }
    }
}

impl WorkloadSource for SyntheticWorkload {
    fn sample(&mut self, cycle: u32, vm_id: u32) -> f64 {
        self.ensure_profiles(vm_id as usize + 1);
        let profile = &self.profiles[vm_id as usize];
        let hour = cycle as f64 * self.dt_hours;

        let day_angle = 2.0 * PI * (hour % HOURS_PER_DAY) / HOURS_PER_DAY;
        let week_angle = 2.0 * PI * (hour % HOURS_PER_WEEK) / HOURS_PER_WEEK;
        let diurnal = self.config.diurnal_amplitude * (day_angle + profile.phase).sin();
        let weekly = self.config.weekly_amplitude * week_angle.sin();
        let baseline = profile.baseline;
        let noise = if self.config.noise > 0.0 {
            self.rng.gen_range(-self.config.noise..=self.config.noise)
        } else {
            0.0
        };
        (baseline + diurnal + weekly + noise).clamp(0.0, VM_CPU_LIMIT)
    }
}

#[derive(Debug, Deserialize)]
struct TraceRecord {
    cycle: u32,
    vm_id: u32,
    usage: f64,
}

/// Replays usage recorded in a CSV trace with `cycle,vm_id,usage` rows.
/// A VM without a row for some cycle keeps its most recent value.
#[derive(Clone, Default)]
pub struct TraceWorkload {
    samples: BTreeMap<u32, BTreeMap<u32, f64>>,
}

impl TraceWorkload {
    pub fn from_file(path: &str, n_vms: u32) -> Result<Self, WorkloadError> {
        let reader = csv::Reader::from_path(path).map_err(|source| WorkloadError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_csv(reader, path, n_vms)
    }

    pub fn from_reader<R: Read>(rdr: R, n_vms: u32) -> Result<Self, WorkloadError> {
        Self::from_csv(csv::Reader::from_reader(rdr), "<reader>", n_vms)
    }

    fn from_csv<R: Read>(
        mut reader: csv::Reader<R>,
        path: &str,
        n_vms: u32,
    ) -> Result<Self, WorkloadError> {
        let mut trace = Self::default();
        for record in reader.deserialize::<TraceRecord>() {
            let record = record.map_err(|source| WorkloadError::Read {
                path: path.to_string(),
                source,
            })?;
            if !(0.0..=VM_CPU_LIMIT).contains(&record.usage) {
                return Err(WorkloadError::InvalidSample {
                    vm_id: record.vm_id,
                    cycle: record.cycle,
                    usage: record.usage,
                });
            }
            trace
                .samples
                .entry(record.vm_id)
                .or_default()
                .insert(record.cycle, record.usage);
        }
        for vm_id in 0..n_vms {
            let has_first_sample = trace
                .samples
                .get(&vm_id)
                .map_or(false, |history| history.contains_key(&0));
            if !has_first_sample {
                return Err(WorkloadError::MissingSample { vm_id, cycle: 0 });
            }
        }
        Ok(trace)
    }

    pub fn vm_count(&self) -> usize {
        self.samples.len()
    }
}

impl WorkloadSource for TraceWorkload {
    fn sample(&mut self, cycle: u32, vm_id: u32) -> f64 {
        let last = self
            .samples
            .get(&vm_id)
            .and_then(|history| history.range(..=cycle).next_back())
            .map(|(_, usage)| *usage);
        match last {
            Some(usage) => usage,
            None => {
                warn!("trace has no sample for vm #{} at cycle {}, assuming idle", vm_id, cycle);
                0.0
            }
        }
    }
}
