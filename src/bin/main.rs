//! Tray application entry point

#![cfg_attr(windows, windows_subsystem = "windows")]

use hyperv_tray::cli;

fn main() {
    let cli = cli::parse();
    init_tracing();
    run(cli);
}

/// Diagnostics are opt-in: a windowed process has no console, so logs only go
/// to stderr when `HYPERVTRAY_LOG` is set and the output is redirected.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    if std::env::var_os("HYPERVTRAY_LOG").is_none() {
        return;
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("HYPERVTRAY_LOG"))
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(windows)]
fn run(cli: cli::Cli) {
    use hyperv_tray::platform;

    // Another instance already owns the tray icon.
    let Some(_instance) = platform::instance::acquire() else {
        tracing::info!("another instance is already running");
        return;
    };

    if !cli.no_dark_mode {
        platform::darkmode::allow_dark_mode();
    }

    if let Err(error) = platform::window::run() {
        tracing::error!(%error, "tray application failed");
        std::process::exit(1);
    }
}

#[cfg(not(windows))]
fn run(_cli: cli::Cli) {
    eprintln!("hyperv-tray requires Windows with the Hyper-V role enabled");
    std::process::exit(1);
}
