//! Pending state-transition watches
//!
//! A watch records the expectation that a VM will move from the state it was
//! in when the user issued a command to the state the command requested. Each
//! poll tick reconciles the registry against a fresh snapshot, emitting one
//! [`StateChange`] per observed transition and retiring watches that reached
//! their target or settled into some stable state along the way.

use std::collections::BTreeMap;
use std::fmt;

use crate::snapshot::VmSnapshot;
use crate::state::VmState;

/// Reconcile passes a watched VM may be absent from the snapshot before its
/// watch is dropped (the VM was deleted, or enumeration keeps failing).
pub const MAX_MISSED_POLLS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchEntry {
    /// State when the watch was created.
    pub original: VmState,
    /// Last state observed by reconcile.
    pub seen: VmState,
    /// State the user asked for.
    pub target: VmState,
    /// True once `seen` has diverged from `original` at least once.
    pub changed: bool,
    missed_polls: u32,
}

/// A state transition observed during reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub name: String,
    pub state: VmState,
}

/// The user-facing notification text, shared by the balloon and the tooltip.
impl fmt::Display for StateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.state)
    }
}

/// One pending watch per VM name.
///
/// A BTreeMap keeps iteration deterministic; nothing depends on the order
/// beyond reproducibility.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    watches: BTreeMap<String, WatchEntry>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a watch. The newest user-issued command wins; any
    /// progress recorded for an earlier command on the same VM is discarded.
    pub fn register(&mut self, name: &str, original: VmState, target: VmState) {
        self.watches.insert(
            name.to_string(),
            WatchEntry {
                original,
                seen: original,
                target,
                changed: false,
                missed_polls: 0,
            },
        );
    }

    /// Compare every watched VM against the snapshot.
    ///
    /// Emits one event per VM whose observed state differs from `seen`. A
    /// watch is retired when the observed state equals its target, or when it
    /// has changed at least once and the VM settled into any stable state.
    /// Removal happens after the tick's events are collected, so callers see
    /// a notification for the final transition.
    pub fn reconcile(&mut self, snapshot: &VmSnapshot) -> Vec<StateChange> {
        let mut events = Vec::new();
        let mut done = Vec::new();

        for (name, entry) in self.watches.iter_mut() {
            let Some(current) = snapshot.state_of(name) else {
                entry.missed_polls += 1;
                if entry.missed_polls >= MAX_MISSED_POLLS {
                    tracing::debug!(vm = %name, "watched VM no longer enumerable, dropping watch");
                    done.push(name.clone());
                }
                continue;
            };
            entry.missed_polls = 0;

            if current != entry.seen {
                entry.seen = current;
                entry.changed = true;
                events.push(StateChange {
                    name: name.clone(),
                    state: current,
                });
            }

            if current == entry.target || (entry.changed && current.is_stable()) {
                done.push(name.clone());
            }
        }

        for name in done {
            self.watches.remove(&name);
        }

        events
    }

    pub fn get(&self, name: &str) -> Option<&WatchEntry> {
        self.watches.get(name)
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::VmInfo;

    fn snapshot_of(entries: &[(&str, VmState)]) -> VmSnapshot {
        VmSnapshot::from_entries(
            entries
                .iter()
                .map(|(name, state)| VmInfo::new(*name, *state))
                .collect(),
        )
    }

    #[test]
    fn test_register_initializes_entry() {
        let mut registry = WatchRegistry::new();
        registry.register("VM1", VmState::Stopped, VmState::Running);

        let entry = registry.get("VM1").unwrap();
        assert_eq!(entry.original, VmState::Stopped);
        assert_eq!(entry.seen, VmState::Stopped);
        assert_eq!(entry.target, VmState::Running);
        assert!(!entry.changed);
    }

    #[test]
    fn test_register_overwrites_prior_watch() {
        let mut registry = WatchRegistry::new();
        registry.register("VM1", VmState::Stopped, VmState::Running);
        registry.reconcile(&snapshot_of(&[("VM1", VmState::Starting)]));
        assert!(registry.get("VM1").unwrap().changed);

        // A newer command replaces the entry entirely, history included.
        registry.register("VM1", VmState::Starting, VmState::Saved);
        let entry = registry.get("VM1").unwrap();
        assert_eq!(entry.original, VmState::Starting);
        assert_eq!(entry.seen, VmState::Starting);
        assert_eq!(entry.target, VmState::Saved);
        assert!(!entry.changed);
    }

    #[test]
    fn test_state_change_notification_text() {
        let change = StateChange {
            name: "dev".into(),
            state: VmState::Running,
        };
        assert_eq!(change.to_string(), "dev Running");
    }

    #[test]
    fn test_transition_emits_event_and_retains_entry() {
        let mut registry = WatchRegistry::new();
        registry.register("VM1", VmState::Stopped, VmState::Running);

        let events = registry.reconcile(&snapshot_of(&[("VM1", VmState::Starting)]));
        assert_eq!(
            events,
            vec![StateChange {
                name: "VM1".into(),
                state: VmState::Starting,
            }]
        );
        let entry = registry.get("VM1").unwrap();
        assert_eq!(entry.seen, VmState::Starting);
        assert!(entry.changed);
    }

    #[test]
    fn test_reaching_target_removes_watch() {
        let mut registry = WatchRegistry::new();
        registry.register("VM1", VmState::Stopped, VmState::Running);
        registry.reconcile(&snapshot_of(&[("VM1", VmState::Starting)]));

        let events = registry.reconcile(&snapshot_of(&[("VM1", VmState::Running)]));
        assert_eq!(events.len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_target_reached_without_intermediate_change_removes_watch() {
        let mut registry = WatchRegistry::new();
        registry.register("VM1", VmState::Stopped, VmState::Running);

        // Straight to target: removed even though `changed` only just flipped.
        let events = registry.reconcile(&snapshot_of(&[("VM1", VmState::Running)]));
        assert_eq!(events.len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_settling_on_other_stable_state_removes_watch() {
        let mut registry = WatchRegistry::new();
        registry.register("VM1", VmState::Running, VmState::Stopped);

        // Someone saved the VM instead. It changed and then settled, so the
        // watch closes even though the target was never reached.
        registry.reconcile(&snapshot_of(&[("VM1", VmState::Saving)]));
        assert_eq!(registry.len(), 1);
        let events = registry.reconcile(&snapshot_of(&[("VM1", VmState::Saved)]));
        assert_eq!(events.len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unchanged_non_target_state_keeps_watch() {
        let mut registry = WatchRegistry::new();
        registry.register("VM1", VmState::Running, VmState::Stopped);

        // Still running: no event, no removal. `changed` is false, so sitting
        // in a stable state does not retire the watch.
        let events = registry.reconcile(&snapshot_of(&[("VM1", VmState::Running)]));
        assert!(events.is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_transition_code_is_reported() {
        let mut registry = WatchRegistry::new();
        registry.register("VM1", VmState::Stopped, VmState::Running);

        let events = registry.reconcile(&snapshot_of(&[("VM1", VmState::Code(32768))]));
        assert_eq!(events[0].state, VmState::Code(32768));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_missing_vm_expires_after_bounded_polls() {
        let mut registry = WatchRegistry::new();
        registry.register("ghost", VmState::Running, VmState::Stopped);

        let empty = snapshot_of(&[]);
        for _ in 0..MAX_MISSED_POLLS - 1 {
            let events = registry.reconcile(&empty);
            assert!(events.is_empty());
            assert_eq!(registry.len(), 1);
        }
        registry.reconcile(&empty);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_reappearing_vm_resets_missed_polls() {
        let mut registry = WatchRegistry::new();
        registry.register("VM1", VmState::Running, VmState::Stopped);

        let empty = snapshot_of(&[]);
        for _ in 0..MAX_MISSED_POLLS - 1 {
            registry.reconcile(&empty);
        }
        registry.reconcile(&snapshot_of(&[("VM1", VmState::Running)]));
        for _ in 0..MAX_MISSED_POLLS - 1 {
            registry.reconcile(&empty);
            assert_eq!(registry.len(), 1);
        }
    }
}
