//! Maps chosen menu commands to VM operations

use crate::launch;
use crate::menu::{MenuCommand, VmOperation};
use crate::provider::VmProvider;
use crate::scheduler::{PollScheduler, TimerCommand};
use crate::snapshot::VmSnapshot;
use crate::watch::WatchRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Continue,
    /// A watch was registered; apply this timer command.
    Rearm(TimerCommand),
    Quit,
}

/// Execute one menu command against the snapshot the menu was built from.
///
/// State-changing operations re-read the VM's current state by name before
/// registering the watch; the snapshot may be seconds old by the time the
/// user picks an item. If that read fails the operation is dropped silently,
/// matching the best-effort posture everywhere else.
pub fn dispatch(
    command: MenuCommand,
    snapshot: &VmSnapshot,
    provider: &dyn VmProvider,
    registry: &mut WatchRegistry,
    scheduler: &mut PollScheduler,
) -> DispatchOutcome {
    match command {
        MenuCommand::Exit => DispatchOutcome::Quit,
        MenuCommand::Manager => {
            launch::open_manager();
            DispatchOutcome::Continue
        }
        MenuCommand::Vm { index, op } => {
            let Some(entry) = snapshot.get(index) else {
                tracing::debug!(index, "menu command for a VM no longer in the snapshot");
                return DispatchOutcome::Continue;
            };

            if op == VmOperation::Connect {
                launch::connect_console(&entry.name);
                return DispatchOutcome::Continue;
            }

            let Some(target) = op.target_state() else {
                return DispatchOutcome::Continue;
            };

            let current = match provider.state_of(&entry.name) {
                Ok(state) => state,
                Err(error) => {
                    tracing::debug!(vm = %entry.name, %error, "could not read VM state, dropping command");
                    return DispatchOutcome::Continue;
                }
            };

            registry.register(&entry.name, current, target);
            let timer = scheduler.arm();

            // Fire and forget; the watch registry's polling is the sole
            // feedback mechanism for the request.
            let result = match op {
                VmOperation::ShutDown => provider.shutdown(&entry.name),
                _ => provider.request_state_change(&entry.name, target),
            };
            if let Err(error) = result {
                tracing::debug!(vm = %entry.name, ?op, %error, "state change request failed");
            } else {
                tracing::info!(vm = %entry.name, ?op, %current, %target, "requested state change");
            }

            DispatchOutcome::Rearm(timer)
        }
    }
}
