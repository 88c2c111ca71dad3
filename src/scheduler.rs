//! Adaptive polling for watch reconciliation
//!
//! Polls fast right after a user-issued command so feedback is snappy, then
//! widens to a steady cadence for slow transitions (a guest shutdown can take
//! tens of seconds). The scheduler never touches OS timers itself; every tick
//! yields a [`TimerCommand`] the platform layer applies.

use std::time::Duration;

use crate::provider::VmProvider;
use crate::snapshot::VmSnapshot;
use crate::watch::{StateChange, WatchRegistry};

/// Interval used immediately after a watch is registered.
pub const FAST_POLL: Duration = Duration::from_millis(400);
/// Interval after the first reconcile tick completes.
pub const STEADY_POLL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    Restart(Duration),
    Stop,
}

#[derive(Debug)]
pub enum Tick {
    /// A context menu was open; nothing was touched.
    Skipped,
    Polled {
        events: Vec<StateChange>,
        timer: TimerCommand,
    },
}

#[derive(Debug)]
pub struct PollScheduler {
    interval: Duration,
    armed: bool,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self {
            interval: FAST_POLL,
            armed: false,
        }
    }

    /// Called when a watch is registered: snap back to the fast cadence and
    /// (re)arm the timer.
    pub fn arm(&mut self) -> TimerCommand {
        self.interval = FAST_POLL;
        self.armed = true;
        TimerCommand::Restart(self.interval)
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Run one poll tick.
    ///
    /// Skipped entirely while a context menu is open, so the registry and
    /// tray icon never mutate underneath the menu's modal loop.
    pub fn tick(
        &mut self,
        menu_open: bool,
        provider: &dyn VmProvider,
        registry: &mut WatchRegistry,
    ) -> Tick {
        if menu_open {
            return Tick::Skipped;
        }

        let snapshot = VmSnapshot::refresh(provider);
        let events = registry.reconcile(&snapshot);

        // One fast tick is enough; widen for the long tail of the transition.
        self.interval = STEADY_POLL;

        let timer = if registry.is_empty() {
            self.armed = false;
            TimerCommand::Stop
        } else {
            TimerCommand::Restart(self.interval)
        };

        Tick::Polled { events, timer }
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}
