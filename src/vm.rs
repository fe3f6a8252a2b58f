//! Representation of the virtual machine

/// Upper bound of a single VM usage sample. Usage is measured in percent of one
/// reference capacity unit, so a VM never needs more than this from its host.
pub const VM_CPU_LIMIT: f64 = 100.0;

#[derive(Clone, Debug, PartialEq)]
pub struct Vm {
    pub id: u32,
    /// Raw usage sample observed in the current cycle.
    pub usage: f64,
    /// Host the VM is currently assigned to.
    pub host_id: u32,
}

impl Vm {
    pub fn new(id: u32, host_id: u32) -> Self {
        Self { id, usage: 0.0, host_id }
    }
}
