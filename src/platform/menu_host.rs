//! Win32 realization of the menu model
//!
//! Command ids are assigned sequentially from `CMD_BASE` while the menu is
//! appended; the id is an index into `commands`, so the tagged command comes
//! straight back out of `TrackPopupMenu`'s return value.

use windows::core::PCWSTR;
use windows::Win32::Foundation::{HWND, LPARAM, POINT, RECT, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    AppendMenuW, CreatePopupMenu, DestroyMenu, EndMenu, GetCursorPos, GetMenuItemRect,
    SendMessageW, SetForegroundWindow, TrackPopupMenu, HMENU, MF_GRAYED, MF_POPUP, MF_SEPARATOR,
    MF_STRING, TPM_LEFTALIGN, TPM_RETURNCMD, TPM_RIGHTBUTTON, WM_NULL,
};

use crate::debounce::ItemRect;
use crate::menu::{MenuCommand, MenuModel};
use crate::Result;

const CMD_BASE: u32 = 100;

pub struct BuiltMenu {
    root: HMENU,
    commands: Vec<MenuCommand>,
    vm_count: usize,
}

impl BuiltMenu {
    pub fn build(model: &MenuModel) -> Result<Self> {
        unsafe {
            let root = CreatePopupMenu()?;
            let mut commands = Vec::new();

            for (index, vm) in model.vms.iter().enumerate() {
                let submenu = CreatePopupMenu()?;
                for item in &vm.operations {
                    let id = CMD_BASE + commands.len() as u32;
                    commands.push(MenuCommand::Vm {
                        index,
                        op: item.op,
                    });
                    let mut flags = MF_STRING;
                    if !item.enabled {
                        flags |= MF_GRAYED;
                    }
                    let label = wide(item.op.label());
                    AppendMenuW(submenu, flags, id as usize, PCWSTR(label.as_ptr()))?;
                }
                let label = wide(&vm.label);
                AppendMenuW(root, MF_POPUP, submenu.0 as usize, PCWSTR(label.as_ptr()))?;
            }

            AppendMenuW(root, MF_SEPARATOR, 0, PCWSTR::null())?;

            let manager_id = CMD_BASE + commands.len() as u32;
            commands.push(MenuCommand::Manager);
            let label = wide("Hyper-V &Manager");
            AppendMenuW(root, MF_STRING, manager_id as usize, PCWSTR(label.as_ptr()))?;

            let exit_id = CMD_BASE + commands.len() as u32;
            commands.push(MenuCommand::Exit);
            let label = wide("E&xit");
            AppendMenuW(root, MF_STRING, exit_id as usize, PCWSTR(label.as_ptr()))?;

            Ok(Self {
                root,
                commands,
                vm_count: model.vms.len(),
            })
        }
    }

    pub fn root(&self) -> HMENU {
        self.root
    }

    pub fn vm_count(&self) -> usize {
        self.vm_count
    }

    pub fn command_for(&self, id: u32) -> Option<MenuCommand> {
        if id < CMD_BASE {
            return None;
        }
        self.commands.get((id - CMD_BASE) as usize).copied()
    }

    /// Screen rectangle of a top-level item, for the click debouncer.
    pub fn item_rect(&self, hwnd: HWND, index: usize) -> Option<ItemRect> {
        unsafe {
            let mut rect = RECT::default();
            if !GetMenuItemRect(hwnd, self.root, index as u32, &mut rect).as_bool() {
                return None;
            }
            Some(ItemRect::new(rect.left, rect.top, rect.right, rect.bottom))
        }
    }
}

impl Drop for BuiltMenu {
    // Submenus attached with MF_POPUP are destroyed along with the root.
    fn drop(&mut self) {
        unsafe {
            let _ = DestroyMenu(self.root);
        }
    }
}

/// Run the modal menu loop at the cursor; returns the chosen command id, zero
/// when the menu was dismissed.
///
/// Takes the bare `HMENU` rather than the [`BuiltMenu`] so the caller can
/// release every borrow before the loop starts dispatching messages.
pub fn track(hwnd: HWND, menu: HMENU) -> u32 {
    unsafe {
        // The menu will not dismiss on an outside click unless the hidden
        // window is foreground, and needs a message posted afterwards.
        let _ = SetForegroundWindow(hwnd);
        let mut cursor = POINT::default();
        let _ = GetCursorPos(&mut cursor);
        let chosen = TrackPopupMenu(
            menu,
            TPM_LEFTALIGN | TPM_RIGHTBUTTON | TPM_RETURNCMD,
            cursor.x,
            cursor.y,
            0,
            hwnd,
            None,
        );
        SendMessageW(hwnd, WM_NULL, WPARAM(0), LPARAM(0));
        chosen.0 as u32
    }
}

/// Dismiss the active menu loop without a selection.
pub fn cancel_menu_loop() {
    unsafe {
        let _ = EndMenu();
    }
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}
