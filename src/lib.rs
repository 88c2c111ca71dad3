//! Hyper-V Tray
//!
//! A notification-area utility for managing local Hyper-V virtual machines.
//! Right-clicking the tray icon opens a menu listing every VM with the
//! operations valid for its current state (connect, start, stop, shut down,
//! save, pause). State-changing commands register a watch; a polling
//! scheduler reconciles watches against fresh VM snapshots and raises balloon
//! notifications as transitions complete.
//!
//! The core (snapshot, watch registry, scheduler, menu model, click
//! debouncer, dispatcher) is platform-independent and fully unit-tested; the
//! Win32 and WMI glue lives under `platform` and `wmi` and compiles only on
//! Windows.

pub mod cli;
pub mod debounce;
pub mod dispatch;
pub mod error;
pub mod launch;
pub mod menu;
pub mod provider;
pub mod scheduler;
pub mod snapshot;
pub mod state;
pub mod watch;

#[cfg(windows)]
pub mod platform;
#[cfg(windows)]
pub mod wmi;

pub use error::{Error, Result};
pub use provider::{VmInfo, VmProvider};
pub use snapshot::VmSnapshot;
pub use state::VmState;
pub use watch::WatchRegistry;
