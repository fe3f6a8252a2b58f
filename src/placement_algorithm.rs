use crate::default_placement_algorithms::best_fit::BestFitAlgorithm;
use crate::default_placement_algorithms::first_fit::FirstFitAlgorithm;
use crate::simulation_config::PlacementAlgorithmKind;
use crate::vm::VM_CPU_LIMIT;

/// Planner's view of a host while a cycle is being planned.
#[derive(Clone, Debug, PartialEq)]
pub struct HostSlot {
    pub host_id: u32,
    pub cpu_cap: f64,
    /// Sum of predicted usage of VMs currently placed on the host.
    pub load: f64,
    /// Number of VMs currently placed on the host.
    pub vm_count: usize,
}

impl HostSlot {
    /// Checks that a VM with predicted `usage` fits under `target_util` and that
    /// the host can hold one more VM running at its limit.
    pub fn admits(&self, usage: f64, target_util: f64) -> bool {
        let fits_target = self.load + usage <= self.cpu_cap * target_util;
        let fits_hard_cap = (self.vm_count + 1) as f64 * VM_CPU_LIMIT <= self.cpu_cap;
        fits_target && fits_hard_cap
    }

    pub fn utilization_with(&self, usage: f64) -> f64 {
        (self.load + usage) / self.cpu_cap
    }
}

pub trait PlacementAlgorithm {
    /// Selects a host for a VM with predicted `usage`, returns its id or `None`
    /// if no host admits it. `slots` come in scan order.
    fn select_host(&self, usage: f64, slots: &[HostSlot], target_util: f64) -> Option<u32>;
}

pub fn placement_algorithm_resolver(kind: PlacementAlgorithmKind) -> Box<dyn PlacementAlgorithm> {
    match kind {
        PlacementAlgorithmKind::FirstFit => Box::new(FirstFitAlgorithm::new()),
        PlacementAlgorithmKind::BestFit => Box::new(BestFitAlgorithm::new()),
    }
}
