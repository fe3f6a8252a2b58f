use crate::placement_algorithm::{HostSlot, PlacementAlgorithm};

/// Uses the admitting host that ends up with the highest utilization.
/// Ties go to the host seen first in scan order.
#[derive(Default)]
pub struct BestFitAlgorithm;

impl BestFitAlgorithm {
    pub fn new() -> Self {
        Default::default()
    }
}

impl PlacementAlgorithm for BestFitAlgorithm {
    fn select_host(&self, usage: f64, slots: &[HostSlot], target_util: f64) -> Option<u32> {
        let mut result: Option<u32> = None;
        let mut best_utilization = f64::NEG_INFINITY;
        for slot in slots {
            if !slot.admits(usage, target_util) {
                continue;
            }
            let utilization = slot.utilization_with(usage);
            if utilization > best_utilization {
                best_utilization = utilization;
                result = Some(slot.host_id);
            }
        }
        result
    }
}
