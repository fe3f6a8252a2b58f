//! Per-VM usage prediction with an exponential moving average.

use std::collections::HashMap;

/// Keeps one EMA per VM. The first sample of a VM initializes its estimate
/// directly, later samples are blended in with weight `alpha`.
#[derive(Clone, Debug)]
pub struct UsagePredictor {
    alpha: f64,
    estimates: HashMap<u32, f64>,
}

impl UsagePredictor {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            estimates: HashMap::new(),
        }
    }

    /// Feeds a raw sample and returns the new estimate.
    pub fn update(&mut self, vm_id: u32, raw_usage: f64) -> f64 {
        let alpha = self.alpha;
        let estimate = self
            .estimates
            .entry(vm_id)
            .and_modify(|prev| {
                // Clamped so rounding can't push the blend outside its two inputs.
                let blended = alpha * raw_usage + (1.0 - alpha) * *prev;
                *prev = blended.clamp(prev.min(raw_usage), prev.max(raw_usage));
            })
            .or_insert(raw_usage);
        *estimate
    }

    /// Current estimate, 0 for a VM that was never observed.
    pub fn estimate(&self, vm_id: u32) -> f64 {
        self.estimates.get(&vm_id).copied().unwrap_or(0.0)
    }

    pub fn is_tracked(&self, vm_id: u32) -> bool {
        self.estimates.contains_key(&vm_id)
    }

    /// Drops the history of a VM, its next sample starts a fresh estimate.
    pub fn forget(&mut self, vm_id: u32) {
        self.estimates.remove(&vm_id);
    }
}
