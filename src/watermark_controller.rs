//! High-watermark feedback on the packing ceiling.

use std::collections::BTreeMap;

use log::info;

use crate::host::Host;
use crate::predictor::UsagePredictor;

/// Lowest target utilization the controller steps down to.
pub const TARGET_UTIL_FLOOR: f64 = 0.70;
/// Decrement applied to the target on a breached cycle.
pub const TARGET_UTIL_STEP: f64 = 0.02;

#[derive(Clone, Debug, PartialEq)]
pub struct WatermarkVerdict {
    pub breached: bool,
    /// Hosts whose utilization exceeded the watermark, ascending.
    pub breached_hosts: Vec<u32>,
    pub target_util: f64,
}

/// Lowers the target utilization whenever some powered-on host runs above the watermark.
/// The target never goes back up.
#[derive(Clone, Debug)]
pub struct WatermarkController {
    hi_watermark: f64,
}

impl WatermarkController {
    pub fn new(hi_watermark: f64) -> Self {
        Self { hi_watermark }
    }

    pub fn check(
        &self,
        hosts: &BTreeMap<u32, Host>,
        predictor: &UsagePredictor,
        target_util: f64,
    ) -> WatermarkVerdict {
        let breached_hosts: Vec<u32> = hosts
            .values()
            .filter(|host| host.is_on() && host.cpu_utilization(predictor) > self.hi_watermark)
            .map(|host| host.id)
            .collect();

        if breached_hosts.is_empty() {
            return WatermarkVerdict {
                breached: false,
                breached_hosts,
                target_util,
            };
        }

        let new_target = lowered_target(target_util);
        info!(
            "{} host(s) above watermark {:.3}: {:?}, target utilization {:.3} -> {:.3}",
            breached_hosts.len(),
            self.hi_watermark,
            breached_hosts,
            target_util,
            new_target
        );
        WatermarkVerdict {
            breached: true,
            breached_hosts,
            target_util: new_target,
        }
    }
}

/// One ratchet step. A target already at or below the floor stays where it is.
pub fn lowered_target(target_util: f64) -> f64 {
    if target_util <= TARGET_UTIL_FLOOR {
        return target_util;
    }
    let stepped = ((target_util - TARGET_UTIL_STEP) * 1000.0).round() / 1000.0;
    stepped.max(TARGET_UTIL_FLOOR)
}
