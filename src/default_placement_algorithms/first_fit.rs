use crate::placement_algorithm::{HostSlot, PlacementAlgorithm};

/// Uses the first admitting host in scan order.
#[derive(Default)]
pub struct FirstFitAlgorithm;

impl FirstFitAlgorithm {
    pub fn new() -> Self {
        Default::default()
    }
}

impl PlacementAlgorithm for FirstFitAlgorithm {
    fn select_host(&self, usage: f64, slots: &[HostSlot], target_util: f64) -> Option<u32> {
        slots
            .iter()
            .find(|slot| slot.admits(usage, target_util))
            .map(|slot| slot.host_id)
    }
}
