//! Dark-mode opt-in for the context menu
//!
//! Windows exposes no documented API for dark popup menus; like most tray
//! utilities this uses the unnamed uxtheme export at ordinal 135. On builds
//! before 19H1 that export is `AllowDarkModeForApp(bool)`, afterwards it is
//! `SetPreferredAppMode(mode)`. Everything here is best-effort: on an old or
//! unexpected build the function silently does nothing.

use windows::core::{s, w, PCSTR};
use windows::Win32::System::LibraryLoader::{
    GetModuleHandleW, GetProcAddress, LoadLibraryExW, LOAD_LIBRARY_SEARCH_SYSTEM32,
};

type RtlGetNtVersionNumbers = unsafe extern "system" fn(*mut u32, *mut u32, *mut u32);
type AllowDarkModeForApp = unsafe extern "system" fn(bool) -> bool;
type SetPreferredAppMode = unsafe extern "system" fn(i32) -> i32;

const APPMODE_ALLOWDARK: i32 = 1;
const UXTHEME_ORDINAL_135: PCSTR = PCSTR(135 as *const u8);

/// Ask the theme engine to render this app's menus dark when the system
/// theme is dark.
pub fn allow_dark_mode() {
    unsafe {
        // GetVersionExW lies under compatibility shims; the ntdll export
        // reports the real build number.
        let Ok(ntdll) = GetModuleHandleW(w!("ntdll.dll")) else {
            return;
        };
        let Some(get_version) = GetProcAddress(ntdll, s!("RtlGetNtVersionNumbers")) else {
            return;
        };
        let get_version: RtlGetNtVersionNumbers = std::mem::transmute(get_version);
        let (mut major, mut minor, mut build) = (0u32, 0u32, 0u32);
        get_version(&mut major, &mut minor, &mut build);
        let _ = minor;
        let build = build & !0xF000_0000;

        // Dark mode first shipped in 1809 (build 17763).
        if major < 10 || build < 17763 {
            return;
        }

        let Ok(uxtheme) = LoadLibraryExW(w!("uxtheme.dll"), None, LOAD_LIBRARY_SEARCH_SYSTEM32)
        else {
            return;
        };
        let Some(ordinal_135) = GetProcAddress(uxtheme, UXTHEME_ORDINAL_135) else {
            return;
        };

        if build < 18362 {
            let allow: AllowDarkModeForApp = std::mem::transmute(ordinal_135);
            allow(true);
        } else {
            let set_mode: SetPreferredAppMode = std::mem::transmute(ordinal_135);
            set_mode(APPMODE_ALLOWDARK);
        }
        tracing::debug!(build, "dark mode enabled");
    }
}
