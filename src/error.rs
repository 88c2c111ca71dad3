//! Error types for the tray application

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("WMI operation failed: {0}")]
    Wmi(String),

    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    Windows(#[from] windows::core::Error),

    #[error("VM not found: {0}")]
    VmNotFound(String),

    #[error("property not available: {0}")]
    Property(String),

    #[error("could not register the notification area icon")]
    TrayRegistration,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
