//! Greedy consolidation of low-usage VMs.

use std::collections::BTreeMap;

use log::debug;

use crate::host::{Host, PowerState};
use crate::placement_algorithm::{HostSlot, PlacementAlgorithm};
use crate::predictor::UsagePredictor;
use crate::vm::Vm;

/// What a single planning pass changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlacementOutcome {
    /// VMs that ended up on a different host.
    pub migrations: u32,
    /// Candidates no host admitted, left where they were.
    pub degradations: u32,
    pub powered_off: u32,
    pub powered_on: u32,
}

pub struct ConsolidationPlanner {
    low_usage_threshold: f64,
    algorithm: Box<dyn PlacementAlgorithm>,
}

impl ConsolidationPlanner {
    pub fn new(low_usage_threshold: f64, algorithm: Box<dyn PlacementAlgorithm>) -> Self {
        Self {
            low_usage_threshold,
            algorithm,
        }
    }

    /// Ids of VMs whose predicted usage is below the threshold, largest usage first.
    /// Equal usage keeps ascending id order.
    pub fn candidates(&self, vms: &BTreeMap<u32, Vm>, predictor: &UsagePredictor) -> Vec<u32> {
        let mut candidates: Vec<(u32, f64)> = vms
            .keys()
            .map(|vm_id| (*vm_id, predictor.estimate(*vm_id)))
            .filter(|(_, usage)| *usage < self.low_usage_threshold)
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        candidates.into_iter().map(|(vm_id, _)| vm_id).collect()
    }

    /// Repacks candidate VMs and updates host power states. Non-candidates are never moved.
    pub fn plan(
        &self,
        hosts: &mut BTreeMap<u32, Host>,
        vms: &mut BTreeMap<u32, Vm>,
        predictor: &UsagePredictor,
        target_util: f64,
    ) -> PlacementOutcome {
        let mut outcome = PlacementOutcome::default();
        let mut slots: BTreeMap<u32, HostSlot> = hosts
            .values()
            .map(|host| {
                let slot = HostSlot {
                    host_id: host.id,
                    cpu_cap: host.cpu_cap,
                    load: host.predicted_load(predictor),
                    vm_count: host.vm_count(),
                };
                (host.id, slot)
            })
            .collect();

        for vm_id in self.candidates(vms, predictor) {
            let usage = predictor.estimate(vm_id);
            let Some(vm) = vms.get_mut(&vm_id) else {
                continue;
            };
            let source = vm.host_id;
            if let Some(slot) = slots.get_mut(&source) {
                slot.load -= usage;
                slot.vm_count = slot.vm_count.saturating_sub(1);
            }

            let scan = scan_order(hosts, &slots);
            let target = match self.algorithm.select_host(usage, &scan, target_util) {
                Some(host_id) => host_id,
                None => {
                    debug!(
                        "vm #{} (usage {:.2}) fits no host under target {:.3}, stays on host #{}",
                        vm_id, usage, target_util, source
                    );
                    outcome.degradations += 1;
                    source
                }
            };
            if let Some(slot) = slots.get_mut(&target) {
                slot.load += usage;
                slot.vm_count += 1;
            }

            if target != source {
                if let Some(host) = hosts.get_mut(&source) {
                    host.unassign_vm(vm_id);
                }
                if let Some(host) = hosts.get_mut(&target) {
                    host.assign_vm(vm_id);
                }
                vm.host_id = target;
                outcome.migrations += 1;
                debug!("vm #{} migrated from host #{} to host #{}", vm_id, source, target);
            }
        }

        for host in hosts.values_mut() {
            match (host.state, host.is_empty()) {
                (PowerState::On, true) => {
                    host.state = PowerState::Off;
                    outcome.powered_off += 1;
                    debug!("host #{} is empty, powering off", host.id);
                }
                (PowerState::Off, false) => {
                    host.state = PowerState::On;
                    outcome.powered_on += 1;
                    debug!("host #{} received vms, powering on", host.id);
                }
                _ => {}
            }
        }
        outcome
    }
}

/// Hosts that are on or hold VMs come first, then powered-off ones; ascending id within each group.
fn scan_order(hosts: &BTreeMap<u32, Host>, slots: &BTreeMap<u32, HostSlot>) -> Vec<HostSlot> {
    let (mut active, idle): (Vec<HostSlot>, Vec<HostSlot>) = slots
        .values()
        .cloned()
        .partition(|slot| {
            slot.vm_count > 0 || hosts.get(&slot.host_id).map_or(false, |host| host.is_on())
        });
    active.extend(idle);
    active
}
