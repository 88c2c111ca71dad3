//! Hidden window, message loop, and application state
//!
//! All mutable state hangs off one [`AppCell`] whose address is stashed in
//! the window's `GWLP_USERDATA` slot at `WM_NCCREATE`. `wndproc` only ever
//! sees a shared reference; each handler takes a short-lived `RefCell` borrow
//! for the duration of one message. The menu session lives in its own cell
//! because `TrackPopupMenu` re-enters `wndproc` while its modal loop runs,
//! and those re-entrant messages must be able to borrow the session (and, for
//! `WM_TIMER`, the app state) with no outer borrow live.

use std::cell::RefCell;

use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, POINT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{GetAsyncKeyState, VK_LBUTTON};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetCursorPos,
    GetMessageW, GetWindowLongPtrW, KillTimer, PostQuitMessage, RegisterClassW,
    RegisterWindowMessageW, SetTimer, SetWindowLongPtrW, TranslateMessage, CREATESTRUCTW,
    GWLP_USERDATA, HMENU, MF_POPUP, MSG, WINDOW_EX_STYLE, WINDOW_STYLE, WM_DESTROY, WM_ENTERIDLE,
    WM_MENUSELECT, WM_NCCREATE, WM_RBUTTONUP, WM_TIMER, WNDCLASSW,
};

use crate::debounce::MenuInteraction;
use crate::dispatch::{dispatch, DispatchOutcome};
use crate::launch;
use crate::menu::{self, MenuCommand};
use crate::platform::menu_host::{self, BuiltMenu};
use crate::platform::tray::{TrayIcon, WM_TRAY_CALLBACK};
use crate::provider::VmProvider;
use crate::scheduler::{PollScheduler, Tick, TimerCommand};
use crate::snapshot::VmSnapshot;
use crate::watch::WatchRegistry;
use crate::wmi::WmiProvider;
use crate::Result;

const WINDOW_CLASS: PCWSTR = w!("HyperVTray_hidden_window");
const TOOLTIP: &str = "Hyper-V Tray";
const BALLOON_TITLE: &str = "Hyper-V";
const TIMER_POLL: usize = 1;

/// Everything alive while one context menu is on screen.
struct MenuSession {
    built: BuiltMenu,
    interaction: MenuInteraction,
    /// Set when the debouncer decides a VM item was clicked directly.
    pending_connect: Option<usize>,
}

struct App {
    provider: Box<dyn VmProvider>,
    snapshot: VmSnapshot,
    registry: WatchRegistry,
    scheduler: PollScheduler,
    tray: Option<TrayIcon>,
}

/// Window state behind `GWLP_USERDATA`.
struct AppCell {
    app: RefCell<App>,
    menu: RefCell<Option<MenuSession>>,
    /// Explorer broadcasts this after a restart; the icon must be re-added.
    taskbar_created: u32,
}

/// Connect to WMI, create the hidden window and tray icon, and pump messages
/// until the user exits.
pub fn run() -> Result<()> {
    let provider = WmiProvider::connect()?;
    let taskbar_created = unsafe { RegisterWindowMessageW(w!("TaskbarCreated")) };
    let cell = Box::new(AppCell::new(Box::new(provider), taskbar_created));

    unsafe {
        let instance = GetModuleHandleW(None)?;
        let class = WNDCLASSW {
            lpfnWndProc: Some(wndproc),
            hInstance: instance.into(),
            lpszClassName: WINDOW_CLASS,
            ..Default::default()
        };
        if RegisterClassW(&class) == 0 {
            return Err(windows::core::Error::from_win32().into());
        }

        let hwnd = CreateWindowExW(
            WINDOW_EX_STYLE(0),
            WINDOW_CLASS,
            WINDOW_CLASS,
            WINDOW_STYLE(0),
            0,
            0,
            0,
            0,
            None,
            None,
            instance,
            Some(&*cell as *const AppCell as *const std::ffi::c_void),
        )?;

        let mut tray = TrayIcon::new(hwnd);
        tray.add(TOOLTIP)?;
        cell.app.borrow_mut().tray = Some(tray);
        tracing::info!("tray icon registered");

        let mut message = MSG::default();
        while GetMessageW(&mut message, None, 0, 0).as_bool() {
            let _ = TranslateMessage(&message);
            DispatchMessageW(&message);
        }
    }

    Ok(())
}

unsafe extern "system" fn wndproc(
    hwnd: HWND,
    message: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if message == WM_NCCREATE {
        let create = &*(lparam.0 as *const CREATESTRUCTW);
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, create.lpCreateParams as isize);
        return DefWindowProcW(hwnd, message, wparam, lparam);
    }

    let cell = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const AppCell;
    if cell.is_null() {
        return DefWindowProcW(hwnd, message, wparam, lparam);
    }

    match (*cell).handle_message(hwnd, message, wparam, lparam) {
        Some(result) => result,
        None => DefWindowProcW(hwnd, message, wparam, lparam),
    }
}

impl AppCell {
    fn new(provider: Box<dyn VmProvider>, taskbar_created: u32) -> Self {
        Self {
            app: RefCell::new(App {
                provider,
                snapshot: VmSnapshot::empty(),
                registry: WatchRegistry::new(),
                scheduler: PollScheduler::new(),
                tray: None,
            }),
            menu: RefCell::new(None),
            taskbar_created,
        }
    }

    fn handle_message(
        &self,
        hwnd: HWND,
        message: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> Option<LRESULT> {
        match message {
            WM_TRAY_CALLBACK => {
                if lparam.0 as u32 == WM_RBUTTONUP {
                    self.show_menu(hwnd);
                }
                Some(LRESULT(0))
            }
            WM_TIMER if wparam.0 == TIMER_POLL => {
                self.on_tick(hwnd);
                Some(LRESULT(0))
            }
            WM_MENUSELECT => {
                self.on_menu_select(hwnd, wparam, lparam);
                Some(LRESULT(0))
            }
            WM_ENTERIDLE => {
                self.on_menu_idle();
                Some(LRESULT(0))
            }
            WM_DESTROY => {
                if let Some(tray) = self.app.borrow_mut().tray.as_mut() {
                    tray.remove();
                }
                Some(LRESULT(0))
            }
            m if m == self.taskbar_created => {
                tracing::info!("taskbar recreated, re-adding tray icon");
                if let Some(tray) = self.app.borrow_mut().tray.as_mut() {
                    let _ = tray.add(TOOLTIP);
                }
                Some(LRESULT(0))
            }
            _ => None,
        }
    }

    /// Refresh the snapshot, realize the menu, park the session in its cell,
    /// and only then run the modal loop. No borrow is held while the loop
    /// re-enters `wndproc`.
    fn show_menu(&self, hwnd: HWND) {
        if self.menu.borrow().is_some() {
            return;
        }

        let root = {
            let mut app = self.app.borrow_mut();
            let snapshot = VmSnapshot::refresh(&*app.provider);
            app.snapshot = snapshot;
            let model = menu::build_menu(&app.snapshot);
            let built = match BuiltMenu::build(&model) {
                Ok(built) => built,
                Err(error) => {
                    tracing::warn!(%error, "failed to build context menu");
                    return;
                }
            };
            let root = built.root();
            *self.menu.borrow_mut() = Some(MenuSession {
                built,
                interaction: MenuInteraction::new(),
                pending_connect: None,
            });
            root
        };

        let chosen_id = menu_host::track(hwnd, root);

        let Some(session) = self.menu.borrow_mut().take() else {
            return;
        };
        if let Some(index) = session.pending_connect {
            let app = self.app.borrow();
            if let Some(entry) = app.snapshot.get(index) {
                launch::connect_console(&entry.name);
            }
        } else if let Some(command) = session.built.command_for(chosen_id) {
            self.run_command(hwnd, command);
        }
    }

    fn run_command(&self, hwnd: HWND, command: MenuCommand) {
        let outcome = {
            let app = &mut *self.app.borrow_mut();
            dispatch(
                command,
                &app.snapshot,
                &*app.provider,
                &mut app.registry,
                &mut app.scheduler,
            )
        };

        match outcome {
            DispatchOutcome::Continue => {}
            DispatchOutcome::Rearm(timer) => self.apply_timer(hwnd, timer),
            // DestroyWindow dispatches WM_DESTROY synchronously; the app
            // borrow above is already released.
            DispatchOutcome::Quit => unsafe {
                let _ = DestroyWindow(hwnd);
                PostQuitMessage(0);
            },
        }
    }

    fn on_tick(&self, hwnd: HWND) {
        let menu_open = self.menu.borrow().is_some();
        let tick = {
            let app = &mut *self.app.borrow_mut();
            app.scheduler
                .tick(menu_open, &*app.provider, &mut app.registry)
        };

        match tick {
            Tick::Skipped => {}
            Tick::Polled { events, timer } => {
                {
                    let app = self.app.borrow();
                    if let Some(tray) = app.tray.as_ref() {
                        for event in &events {
                            let message = event.to_string();
                            tracing::info!(vm = %event.name, state = %event.state, "watched VM changed state");
                            tray.balloon(BALLOON_TITLE, &message);
                            tray.set_tooltip(&message);
                        }
                    }
                }
                self.apply_timer(hwnd, timer);
            }
        }
    }

    fn apply_timer(&self, hwnd: HWND, command: TimerCommand) {
        unsafe {
            match command {
                TimerCommand::Restart(interval) => {
                    SetTimer(hwnd, TIMER_POLL, interval.as_millis() as u32, None);
                }
                TimerCommand::Stop => {
                    let _ = KillTimer(hwnd, TIMER_POLL);
                }
            }
        }
    }

    /// Feed top-level submenu highlights to the click debouncer.
    fn on_menu_select(&self, hwnd: HWND, wparam: WPARAM, lparam: LPARAM) {
        let mut menu = self.menu.borrow_mut();
        let Some(session) = menu.as_mut() else {
            return;
        };

        // Only items on the root menu matter, and only submenu roots carry a
        // VM. HIWORD(wParam) is the item flags, LOWORD the item index.
        if HMENU(lparam.0 as *mut std::ffi::c_void) != session.built.root() {
            return;
        }
        let flags = ((wparam.0 >> 16) & 0xFFFF) as u32;
        if flags & MF_POPUP.0 == 0 {
            return;
        }
        let index = (wparam.0 & 0xFFFF) as usize;
        if index >= session.built.vm_count() {
            return;
        }

        if let Some(rect) = session.built.item_rect(hwnd, index) {
            session.interaction.on_hover(index, rect);
        }
    }

    /// Poll cursor and button state while the menu loop idles.
    fn on_menu_idle(&self) {
        let mut menu = self.menu.borrow_mut();
        let Some(session) = menu.as_mut() else {
            return;
        };

        let mut cursor = POINT::default();
        let button_down = unsafe {
            let _ = GetCursorPos(&mut cursor);
            (GetAsyncKeyState(VK_LBUTTON.0 as i32) as u16 & 0x8000) != 0
        };

        if let Some(index) = session.interaction.on_idle(cursor.x, cursor.y, button_down) {
            session.pending_connect = Some(index);
            menu_host::cancel_menu_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::MenuModel;
    use crate::provider::MockVmProvider;

    fn cell() -> AppCell {
        AppCell::new(Box::new(MockVmProvider::new()), 0xC000)
    }

    fn parked_session() -> MenuSession {
        MenuSession {
            built: BuiltMenu::build(&MenuModel::default()).unwrap(),
            interaction: MenuInteraction::new(),
            pending_connect: None,
        }
    }

    #[test]
    fn test_tick_skips_while_menu_session_is_parked() {
        // The session cell and a tick-time app borrow must coexist. The mock
        // has no expectations: an open menu means the provider is not polled.
        let cell = cell();
        *cell.menu.borrow_mut() = Some(parked_session());

        cell.on_tick(HWND::default());
        assert!(cell.menu.borrow().is_some());
    }

    #[test]
    fn test_menu_messages_never_borrow_app_state() {
        // These arrive re-entrantly from the modal menu loop; they must get
        // by on the session cell alone.
        let cell = cell();
        *cell.menu.borrow_mut() = Some(parked_session());

        let _app = cell.app.borrow_mut();
        cell.on_menu_idle();
        cell.on_menu_select(HWND::default(), WPARAM(0), LPARAM(0));
    }
}
