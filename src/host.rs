//! Representation of the physical host

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use crate::predictor::UsagePredictor;
use crate::simulation_config::HostConfig;
use crate::vm::Vm;

/// Host power state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
}

impl Display for PowerState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            PowerState::On => write!(f, "on"),
            PowerState::Off => write!(f, "off"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Host {
    pub id: u32,
    pub cpu_cap: f64,
    pub mem_cap: f64,
    pub power_idle_watts: f64,
    pub power_peak_watts: f64,
    pub state: PowerState,
    vms: BTreeSet<u32>,
}

impl Host {
    pub fn new(
        id: u32,
        cpu_cap: f64,
        mem_cap: f64,
        power_idle_watts: f64,
        power_peak_watts: f64,
    ) -> Self {
        Self {
            id,
            cpu_cap,
            mem_cap,
            power_idle_watts,
            power_peak_watts,
            state: PowerState::On,
            vms: BTreeSet::new(),
        }
    }

    pub fn from_config(id: u32, config: &HostConfig) -> Self {
        Self::new(
            id,
            config.cpu_cap,
            config.mem_cap,
            config.power_idle_watts,
            config.power_peak_watts,
        )
    }

    pub fn is_on(&self) -> bool {
        self.state == PowerState::On
    }

    /// Ids of VMs assigned to the host, ascending.
    pub fn vms(&self) -> &BTreeSet<u32> {
        &self.vms
    }

    pub fn vm_count(&self) -> usize {
        self.vms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vms.is_empty()
    }

    pub fn assign_vm(&mut self, vm_id: u32) {
        self.vms.insert(vm_id);
    }

    pub fn unassign_vm(&mut self, vm_id: u32) -> bool {
        self.vms.remove(&vm_id)
    }

    /// Sum of predicted usage of assigned VMs.
    pub fn predicted_load(&self, predictor: &UsagePredictor) -> f64 {
        self.vms.iter().map(|vm_id| predictor.estimate(*vm_id)).sum()
    }

    /// Sum of raw usage of assigned VMs in the current cycle.
    pub fn raw_load(&self, vms: &BTreeMap<u32, Vm>) -> f64 {
        self.vms.iter().filter_map(|vm_id| vms.get(vm_id)).map(|vm| vm.usage).sum()
    }

    /// Predicted CPU utilization as a fraction of capacity.
    pub fn cpu_utilization(&self, predictor: &UsagePredictor) -> f64 {
        self.predicted_load(predictor) / self.cpu_cap
    }
}

/// Predicted utilization of every powered-on host, in ascending host id order.
pub fn on_host_utilizations(hosts: &BTreeMap<u32, Host>, predictor: &UsagePredictor) -> Vec<f64> {
    hosts
        .values()
        .filter(|host| host.is_on())
        .map(|host| host.cpu_utilization(predictor))
        .collect()
}
