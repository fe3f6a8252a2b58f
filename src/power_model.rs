//! Physical host power consumption models.

use dyn_clone::{clone_trait_object, DynClone};

use crate::host::Host;

/// Power model is a function, which computes the power draw of a powered-on host
/// in watts based on its current CPU utilization.
pub trait PowerModel: DynClone {
    fn get_power(&self, host: &Host, cpu_utilization: f64) -> f64;
}

clone_trait_object!(PowerModel);

/// Linear interpolation between the host idle and peak power.
/// Utilization is clamped to [0, 1].
#[derive(Clone, Default)]
pub struct LinearPowerModel;

impl LinearPowerModel {
    pub fn new() -> Self {
        Default::default()
    }
}

impl PowerModel for LinearPowerModel {
    fn get_power(&self, host: &Host, cpu_utilization: f64) -> f64 {
        let factor = host.power_peak_watts - host.power_idle_watts;
        host.power_idle_watts + cpu_utilization.clamp(0.0, 1.0) * factor
    }
}
