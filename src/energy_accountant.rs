//! Energy accounting per cycle.

use std::collections::BTreeMap;

use crate::host::Host;
use crate::power_model::PowerModel;
use crate::predictor::UsagePredictor;

const WATTS_PER_KILOWATT: f64 = 1000.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EnergyDelta {
    /// Idle power of powered-off hosts over the cycle, in kWh.
    pub saved_kwh: f64,
    /// Power drawn by powered-on hosts over the cycle, in kWh.
    pub consumed_kwh: f64,
}

/// Tracks energy saved by powered-off hosts and, separately, energy consumed by running ones.
#[derive(Clone)]
pub struct EnergyAccountant {
    power_model: Box<dyn PowerModel>,
    saved_kwh: f64,
    consumed_kwh: f64,
}

impl EnergyAccountant {
    pub fn new(power_model: Box<dyn PowerModel>) -> Self {
        Self {
            power_model,
            saved_kwh: 0.0,
            consumed_kwh: 0.0,
        }
    }

    /// Accounts one cycle of `dt_hours` and returns its contribution.
    pub fn accumulate(
        &mut self,
        hosts: &BTreeMap<u32, Host>,
        predictor: &UsagePredictor,
        dt_hours: f64,
    ) -> EnergyDelta {
        let mut saved_watts = 0.0;
        let mut consumed_watts = 0.0;
        for host in hosts.values() {
            if host.is_on() {
                consumed_watts += self.power_model.get_power(host, host.cpu_utilization(predictor));
            } else {
                saved_watts += host.power_idle_watts;
            }
        }
        let delta = EnergyDelta {
            saved_kwh: saved_watts * dt_hours / WATTS_PER_KILOWATT,
            consumed_kwh: consumed_watts * dt_hours / WATTS_PER_KILOWATT,
        };
        self.saved_kwh += delta.saved_kwh;
        self.consumed_kwh += delta.consumed_kwh;
        delta
    }

    /// Total energy saved so far, in kWh.
    pub fn saved_kwh(&self) -> f64 {
        self.saved_kwh
    }

    /// Total energy consumed so far, in kWh.
    pub fn consumed_kwh(&self) -> f64 {
        self.consumed_kwh
    }
}
