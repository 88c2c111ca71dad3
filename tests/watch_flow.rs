//! End-to-end flow through the platform-independent core: issue a start
//! command against a stopped VM, then drive the poll scheduler through the
//! transition the provider reports.

use std::cell::RefCell;

use hyperv_tray::dispatch::{dispatch, DispatchOutcome};
use hyperv_tray::menu::{MenuCommand, VmOperation};
use hyperv_tray::scheduler::{PollScheduler, Tick, TimerCommand, FAST_POLL, STEADY_POLL};
use hyperv_tray::{Result, VmInfo, VmProvider, VmSnapshot, VmState, WatchRegistry};

/// Scripted provider: each enumeration pops the next frame; the last frame
/// repeats. State reads answer from the current frame.
struct ScriptedProvider {
    frames: RefCell<Vec<Vec<VmInfo>>>,
    requests: RefCell<Vec<(String, VmState)>>,
}

impl ScriptedProvider {
    fn new(frames: Vec<Vec<VmInfo>>) -> Self {
        let mut frames = frames;
        frames.reverse();
        Self {
            frames: RefCell::new(frames),
            requests: RefCell::new(Vec::new()),
        }
    }

    fn current(&self) -> Vec<VmInfo> {
        let frames = self.frames.borrow();
        frames.last().cloned().unwrap_or_default()
    }
}

impl VmProvider for ScriptedProvider {
    fn enumerate(&self) -> Result<Vec<VmInfo>> {
        let mut frames = self.frames.borrow_mut();
        let frame = frames.last().cloned().unwrap_or_default();
        if frames.len() > 1 {
            frames.pop();
        }
        Ok(frame)
    }

    fn state_of(&self, name: &str) -> Result<VmState> {
        self.current()
            .iter()
            .find(|vm| vm.name == name)
            .map(|vm| vm.state)
            .ok_or_else(|| hyperv_tray::Error::VmNotFound(name.to_string()))
    }

    fn request_state_change(&self, name: &str, target: VmState) -> Result<()> {
        self.requests
            .borrow_mut()
            .push((name.to_string(), target));
        Ok(())
    }

    fn shutdown(&self, name: &str) -> Result<()> {
        self.requests
            .borrow_mut()
            .push((name.to_string(), VmState::Stopped));
        Ok(())
    }
}

#[test]
fn test_start_command_watched_to_completion() {
    // Frames the provider will report across successive polls. The first
    // frame backs both the menu snapshot and the dispatch-time state read.
    let provider = ScriptedProvider::new(vec![
        vec![VmInfo::new("VM1", VmState::Stopped)],
        vec![VmInfo::new("VM1", VmState::Starting)],
        vec![VmInfo::new("VM1", VmState::Running)],
    ]);

    let snapshot = VmSnapshot::refresh(&provider);
    assert_eq!(snapshot.state_of("VM1"), Some(VmState::Stopped));

    let mut registry = WatchRegistry::new();
    let mut scheduler = PollScheduler::new();

    let outcome = dispatch(
        MenuCommand::Vm {
            index: 0,
            op: VmOperation::Start,
        },
        &snapshot,
        &provider,
        &mut registry,
        &mut scheduler,
    );
    assert_eq!(
        outcome,
        DispatchOutcome::Rearm(TimerCommand::Restart(FAST_POLL))
    );
    assert_eq!(
        provider.requests.borrow().as_slice(),
        &[("VM1".to_string(), VmState::Running)]
    );

    let entry = registry.get("VM1").expect("watch registered");
    assert_eq!(entry.original, VmState::Stopped);
    assert_eq!(entry.seen, VmState::Stopped);
    assert_eq!(entry.target, VmState::Running);
    assert!(!entry.changed);

    // First poll sees the transitional state: one notification, watch stays,
    // cadence widens.
    match scheduler.tick(false, &provider, &mut registry) {
        Tick::Polled { events, timer } => {
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].name, "VM1");
            assert_eq!(events[0].state, VmState::Starting);
            assert_eq!(timer, TimerCommand::Restart(STEADY_POLL));
        }
        Tick::Skipped => panic!("poll should have run"),
    }
    let entry = registry.get("VM1").expect("watch still live");
    assert_eq!(entry.seen, VmState::Starting);
    assert!(entry.changed);

    // Second poll reaches the target: final notification, watch removed,
    // timer stopped.
    match scheduler.tick(false, &provider, &mut registry) {
        Tick::Polled { events, timer } => {
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].state, VmState::Running);
            assert_eq!(timer, TimerCommand::Stop);
        }
        Tick::Skipped => panic!("poll should have run"),
    }
    assert!(registry.is_empty());
    assert!(!scheduler.is_armed());
}

#[test]
fn test_open_menu_defers_polling() {
    let provider = ScriptedProvider::new(vec![
        vec![VmInfo::new("VM1", VmState::Stopped)],
        vec![VmInfo::new("VM1", VmState::Running)],
    ]);

    let mut registry = WatchRegistry::new();
    registry.register("VM1", VmState::Stopped, VmState::Running);
    let mut scheduler = PollScheduler::new();
    scheduler.arm();

    // Menu open: nothing consumed, nothing reported.
    assert!(matches!(
        scheduler.tick(true, &provider, &mut registry),
        Tick::Skipped
    ));
    assert_eq!(registry.get("VM1").unwrap().seen, VmState::Stopped);

    // Menu closed: polling resumes where it left off.
    match scheduler.tick(false, &provider, &mut registry) {
        Tick::Polled { events, .. } => assert_eq!(events.len(), 1),
        Tick::Skipped => panic!("poll should have run"),
    }
}

#[test]
fn test_vanished_vm_watch_expires() {
    let provider = ScriptedProvider::new(vec![vec![]]);

    let mut registry = WatchRegistry::new();
    registry.register("Ghost", VmState::Running, VmState::Stopped);
    let mut scheduler = PollScheduler::new();
    scheduler.arm();

    let mut polls = 0;
    loop {
        match scheduler.tick(false, &provider, &mut registry) {
            Tick::Polled { events, timer } => {
                assert!(events.is_empty());
                polls += 1;
                if timer == TimerCommand::Stop {
                    break;
                }
            }
            Tick::Skipped => panic!("poll should have run"),
        }
        assert!(polls < 100, "watch never expired");
    }

    assert!(registry.is_empty());
    assert_eq!(polls, hyperv_tray::watch::MAX_MISSED_POLLS as usize);
}
