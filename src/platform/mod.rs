//! Win32 glue
//!
//! Thin wrappers over the notification area, popup menus, the hidden message
//! window, and dark-mode theming. All decision-making lives in the
//! platform-independent core; this layer moves messages and handles around.

pub mod darkmode;
pub mod instance;
pub mod menu_host;
pub mod tray;
pub mod window;
