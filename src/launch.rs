//! Launchers for the external Hyper-V tools
//!
//! Both launches are fire-and-forget: the child is spawned detached and
//! failures are logged, never surfaced. The tray stays responsive whether or
//! not the tools exist on this machine.

use std::path::PathBuf;
use std::process::Command;

fn system32(file: &str) -> Option<PathBuf> {
    let root = std::env::var_os("SYSTEMROOT")?;
    Some(PathBuf::from(root).join("System32").join(file))
}

/// Open the console viewer (vmconnect.exe) against a VM by name.
pub fn connect_console(vm_name: &str) {
    let Some(exe) = system32("vmconnect.exe") else {
        tracing::debug!("SYSTEMROOT not set, cannot locate vmconnect");
        return;
    };

    match Command::new(&exe).arg("localhost").arg(vm_name).spawn() {
        Ok(_) => tracing::debug!(vm = %vm_name, "launched vmconnect"),
        Err(error) => tracing::debug!(vm = %vm_name, %error, "failed to launch vmconnect"),
    }
}

/// Open the full Hyper-V Manager MMC console.
pub fn open_manager() {
    let (Some(mmc), Some(snapin)) = (system32("mmc.exe"), system32("virtmgmt.msc")) else {
        tracing::debug!("SYSTEMROOT not set, cannot locate mmc");
        return;
    };

    match Command::new(&mmc).arg(&snapin).spawn() {
        Ok(_) => tracing::debug!("launched Hyper-V Manager"),
        Err(error) => tracing::debug!(%error, "failed to launch Hyper-V Manager"),
    }
}
