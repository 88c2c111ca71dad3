//! Hyper-V virtual machine states
//!
//! Wire codes come from the `EnabledState` property of `Msvm_ComputerSystem`
//! (plus the extended 32xxx transition codes). The provider may report codes
//! this build has never heard of; those are carried verbatim as [`VmState::Code`]
//! and rendered as their numeric value.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Unknown,
    Other,
    Running,
    Stopped,
    ShutDown,
    Saved,
    Test,
    Defer,
    Paused,
    Starting,
    Reset,
    Saving,
    Stopping,
    Pausing,
    Resuming,
    /// Unrecognized wire code, kept as-is.
    Code(u32),
}

impl VmState {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => VmState::Unknown,
            1 => VmState::Other,
            2 => VmState::Running,
            3 => VmState::Stopped,
            4 => VmState::ShutDown,
            6 => VmState::Saved,
            7 => VmState::Test,
            8 => VmState::Defer,
            9 => VmState::Paused,
            10 | 32770 => VmState::Starting,
            11 => VmState::Reset,
            32773 => VmState::Saving,
            32774 => VmState::Stopping,
            32776 => VmState::Pausing,
            32777 => VmState::Resuming,
            other => VmState::Code(other),
        }
    }

    /// The code sent with a `RequestStateChange` call for this state.
    pub fn code(self) -> u32 {
        match self {
            VmState::Unknown => 0,
            VmState::Other => 1,
            VmState::Running => 2,
            VmState::Stopped => 3,
            VmState::ShutDown => 4,
            VmState::Saved => 6,
            VmState::Test => 7,
            VmState::Defer => 8,
            VmState::Paused => 9,
            VmState::Starting => 10,
            VmState::Reset => 11,
            VmState::Saving => 32773,
            VmState::Stopping => 32774,
            VmState::Pausing => 32776,
            VmState::Resuming => 32777,
            VmState::Code(code) => code,
        }
    }

    /// States a VM settles into, as opposed to transitions it passes through.
    pub fn is_stable(self) -> bool {
        matches!(
            self,
            VmState::Running | VmState::Stopped | VmState::Paused | VmState::Saved
        )
    }
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmState::Unknown => write!(f, "Unknown"),
            VmState::Other => write!(f, "Other"),
            VmState::Running => write!(f, "Running"),
            VmState::Stopped => write!(f, "Stopped"),
            VmState::ShutDown => write!(f, "Shutting Down"),
            VmState::Saved => write!(f, "Saved"),
            VmState::Test => write!(f, "Test"),
            VmState::Defer => write!(f, "Defer"),
            VmState::Paused => write!(f, "Paused"),
            VmState::Starting => write!(f, "Starting"),
            VmState::Reset => write!(f, "Reset"),
            VmState::Saving => write!(f, "Saving"),
            VmState::Stopping => write!(f, "Stopping"),
            VmState::Pausing => write!(f, "Pausing"),
            VmState::Resuming => write!(f, "Resuming"),
            VmState::Code(code) => write!(f, "{}", code),
        }
    }
}
