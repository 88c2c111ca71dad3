//! Notification-area icon
//!
//! Registration retries for a while: at logon the tray process may not be
//! ready yet, and `NIM_ADD` fails until it is. Explorer restarts broadcast
//! `TaskbarCreated`, at which point the window re-adds the icon.

use std::time::{Duration, Instant};

use windows::Win32::Foundation::HWND;
use windows::Win32::UI::Shell::{
    Shell_NotifyIconW, NIF_ICON, NIF_INFO, NIF_MESSAGE, NIF_TIP, NIIF_INFO, NIM_ADD, NIM_DELETE,
    NIM_MODIFY, NOTIFYICONDATAW,
};
use windows::Win32::UI::WindowsAndMessaging::{LoadIconW, IDI_APPLICATION, WM_USER};

use crate::{Error, Result};

pub const TRAY_ICON_ID: u32 = 1;

/// Posted to the hidden window for tray mouse events.
pub const WM_TRAY_CALLBACK: u32 = WM_USER + 111;

const ADD_RETRY_WINDOW: Duration = Duration::from_secs(30);
const ADD_RETRY_PAUSE: Duration = Duration::from_secs(1);

pub struct TrayIcon {
    hwnd: HWND,
    in_tray: bool,
}

impl TrayIcon {
    pub fn new(hwnd: HWND) -> Self {
        Self {
            hwnd,
            in_tray: false,
        }
    }

    fn base_data(&self) -> NOTIFYICONDATAW {
        let mut data = NOTIFYICONDATAW {
            hWnd: self.hwnd,
            uID: TRAY_ICON_ID,
            uFlags: NIF_MESSAGE,
            uCallbackMessage: WM_TRAY_CALLBACK,
            ..Default::default()
        };
        data.cbSize = std::mem::size_of::<NOTIFYICONDATAW>() as u32;
        data
    }

    /// Add the icon, retrying until the shell accepts it or the retry window
    /// runs out.
    pub fn add(&mut self, tooltip: &str) -> Result<()> {
        let mut data = self.base_data();
        data.uFlags |= NIF_ICON | NIF_TIP;
        data.hIcon = unsafe { LoadIconW(None, IDI_APPLICATION) }?;
        copy_wide(&mut data.szTip, tooltip);

        let begin = Instant::now();
        loop {
            if unsafe { Shell_NotifyIconW(NIM_ADD, &data) }.as_bool() {
                break;
            }
            if begin.elapsed() >= ADD_RETRY_WINDOW {
                return Err(Error::TrayRegistration);
            }
            tracing::debug!("shell rejected tray icon registration, retrying");
            std::thread::sleep(ADD_RETRY_PAUSE);
        }

        self.in_tray = true;
        Ok(())
    }

    pub fn set_tooltip(&self, tooltip: &str) {
        if !self.in_tray {
            return;
        }
        let mut data = self.base_data();
        data.uFlags |= NIF_TIP;
        copy_wide(&mut data.szTip, tooltip);
        unsafe {
            let _ = Shell_NotifyIconW(NIM_MODIFY, &data);
        }
    }

    /// Show a balloon notification anchored to the icon.
    pub fn balloon(&self, title: &str, body: &str) {
        if !self.in_tray {
            return;
        }
        let mut data = self.base_data();
        data.uFlags |= NIF_INFO;
        data.dwInfoFlags = NIIF_INFO;
        copy_wide(&mut data.szInfoTitle, title);
        copy_wide(&mut data.szInfo, body);
        unsafe {
            let _ = Shell_NotifyIconW(NIM_MODIFY, &data);
        }
    }

    pub fn remove(&mut self) {
        if !self.in_tray {
            return;
        }
        let data = self.base_data();
        unsafe {
            let _ = Shell_NotifyIconW(NIM_DELETE, &data);
        }
        self.in_tray = false;
    }
}

impl Drop for TrayIcon {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Copy into a fixed-size UTF-16 buffer, truncating and NUL-terminating.
fn copy_wide(dst: &mut [u16], src: &str) {
    let wide: Vec<u16> = src.encode_utf16().collect();
    let n = wide.len().min(dst.len() - 1);
    dst[..n].copy_from_slice(&wide[..n]);
    dst[n] = 0;
}
