//! Seam to the external virtualization provider
//!
//! Everything the core needs from Hyper-V fits behind [`VmProvider`]: list the
//! machines, read one machine's state, and fire asynchronous control requests.
//! The WMI-backed implementation lives in `wmi`; tests substitute a mock.

use crate::state::VmState;
use crate::Result;

/// A virtual machine as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmInfo {
    pub name: String,
    pub state: VmState,
}

impl VmInfo {
    pub fn new(name: impl Into<String>, state: VmState) -> Self {
        Self {
            name: name.into(),
            state,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait VmProvider {
    /// Enumerate all virtual machines with their current states.
    fn enumerate(&self) -> Result<Vec<VmInfo>>;

    /// Current state of a single VM, resolved by name.
    fn state_of(&self, name: &str) -> Result<VmState>;

    /// Request an asynchronous transition to `target`. The provider does not
    /// wait for completion; polling is the only feedback channel.
    fn request_state_change(&self, name: &str, target: VmState) -> Result<()>;

    /// Graceful guest shutdown. Hyper-V models this as a capability of an
    /// associated shutdown component, distinct from direct state transitions.
    fn shutdown(&self, name: &str) -> Result<()>;
}
