//! Single-instance guard
//!
//! One tray icon per session. The named mutex stays held for the lifetime of
//! the process; a second launch sees `ERROR_ALREADY_EXISTS` and bows out.

use windows::core::w;
use windows::Win32::Foundation::{CloseHandle, GetLastError, ERROR_ALREADY_EXISTS, HANDLE};
use windows::Win32::System::Threading::CreateMutexW;

pub struct InstanceGuard {
    handle: HANDLE,
}

/// Returns `None` when another instance already owns the mutex.
pub fn acquire() -> Option<InstanceGuard> {
    unsafe {
        let handle = CreateMutexW(None, false.into(), w!("HyperVTray_single_instance")).ok()?;
        if GetLastError() == ERROR_ALREADY_EXISTS {
            let _ = CloseHandle(handle);
            return None;
        }
        Some(InstanceGuard { handle })
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}
