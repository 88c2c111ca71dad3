//! Context menu model
//!
//! Pure description of the tray menu: one submenu-root item per VM with its
//! numbered accelerator and bracketed state, a submenu of operations with
//! per-state enablement, and the fixed trailing items. The Win32 realization
//! of this model lives in `platform::menu_host`.

use crate::snapshot::VmSnapshot;
use crate::state::VmState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmOperation {
    Connect,
    Start,
    Stop,
    ShutDown,
    Save,
    Pause,
}

impl VmOperation {
    pub const ALL: [VmOperation; 6] = [
        VmOperation::Connect,
        VmOperation::Start,
        VmOperation::Stop,
        VmOperation::ShutDown,
        VmOperation::Save,
        VmOperation::Pause,
    ];

    pub fn label(self) -> &'static str {
        match self {
            VmOperation::Connect => "Connect",
            VmOperation::Start => "Start",
            VmOperation::Stop => "Stop",
            VmOperation::ShutDown => "Shut Down",
            VmOperation::Save => "Save State",
            VmOperation::Pause => "Pause",
        }
    }

    /// The state a watch should wait for after this operation, or `None` for
    /// operations that do not change VM state.
    pub fn target_state(self) -> Option<VmState> {
        match self {
            VmOperation::Connect => None,
            VmOperation::Start => Some(VmState::Running),
            VmOperation::Stop => Some(VmState::Stopped),
            VmOperation::ShutDown => Some(VmState::Stopped),
            VmOperation::Save => Some(VmState::Saved),
            VmOperation::Pause => Some(VmState::Paused),
        }
    }

    /// Whether the menu item for this operation is enabled given the VM's
    /// current state. Connect and Shut Down are always available.
    pub fn enabled_for(self, state: VmState) -> bool {
        let off = matches!(
            state,
            VmState::Saved | VmState::ShutDown | VmState::Stopped
        );
        match self {
            VmOperation::Connect | VmOperation::ShutDown => true,
            VmOperation::Start => !matches!(state, VmState::Running),
            VmOperation::Stop | VmOperation::Save => !off,
            VmOperation::Pause => !off && !matches!(state, VmState::Paused),
        }
    }
}

/// A command chosen from the menu. Constructed directly by the menu layer;
/// never decoded from a packed integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    Exit,
    /// Open the full Hyper-V Manager console.
    Manager,
    Vm {
        /// Index into the snapshot the menu was built from.
        index: usize,
        op: VmOperation,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationItem {
    pub op: VmOperation,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmMenuItem {
    /// "&N Name [State]" for the first nine VMs, "Name [State]" after that.
    pub label: String,
    pub operations: Vec<OperationItem>,
}

#[derive(Debug, Default)]
pub struct MenuModel {
    pub vms: Vec<VmMenuItem>,
}

/// Build the menu model from a snapshot. Item order is snapshot order.
pub fn build_menu(snapshot: &VmSnapshot) -> MenuModel {
    let vms = snapshot
        .entries()
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let mut label = String::new();
            if index < 9 {
                label.push('&');
                label.push_str(&(index + 1).to_string());
                label.push(' ');
            }
            label.push_str(&entry.name);
            label.push_str(&format!(" [{}]", entry.state));

            VmMenuItem {
                label,
                operations: VmOperation::ALL
                    .iter()
                    .map(|&op| OperationItem {
                        op,
                        enabled: op.enabled_for(entry.state),
                    })
                    .collect(),
            }
        })
        .collect();

    MenuModel { vms }
}
