//! Picofan Daemon (picofand)
//!
//! Closed-loop thermal management for small embedded Linux boards: samples
//! the CPU thermal zone, derives a smoothed fan command, and drives a PWM
//! cooling fan, preventing rapid on/off cycling near the thresholds.
//!
//! # Lifecycle
//! - Configuration is read once at startup; there is no runtime reload.
//! - SIGINT/SIGTERM request a cooperative shutdown; before the process
//!   exits the fan is commanded to 0 and the PWM channel is released.
//! - Only a failure to claim the PWM channel is fatal; everything else
//!   degrades and keeps the loop running.

mod control;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use control::{ControlLoop, ShutdownSignal};
use pf_core::{load_config, ControllerConfig, SysfsPwm, ThermalZoneSensor};

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PID File Management
// ============================================================================

fn get_pid_file_path() -> &'static str {
    if Path::new("/run").exists() {
        "/run/picofand.pid"
    } else {
        "/var/run/picofand.pid"
    }
}

/// Write the PID file, refusing to start when a live instance holds it
fn write_pid_file() -> std::io::Result<()> {
    use std::io::Write;

    let path = get_pid_file_path();

    if Path::new(path).exists() {
        if let Ok(content) = std::fs::read_to_string(path) {
            if let Ok(old_pid) = content.trim().parse::<i32>() {
                // Signal 0 only checks whether the process exists.
                // SAFETY: kill with signal 0 sends nothing; the PID came
                // from the PID file and is a valid i32.
                if unsafe { libc::kill(old_pid, 0) } == 0 {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::AddrInUse,
                        format!("another instance is running (PID {})", old_pid),
                    ));
                }
            }
        }
        // Stale PID file, remove it
        let _ = std::fs::remove_file(path);
    }

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    writeln!(file, "{}", std::process::id())?;
    file.sync_all()?;

    debug!("PID file written: {}", path);
    Ok(())
}

fn cleanup() {
    let pid_file = get_pid_file_path();
    if Path::new(pid_file).exists() {
        if let Err(e) = std::fs::remove_file(pid_file) {
            warn!("Failed to remove PID file: {}", e);
        }
    }
}

// ============================================================================
// Startup Checks
// ============================================================================

/// Writing the PWM sysfs attributes normally needs root; some boards grant
/// it to a group via udev, so a non-root start is only worth a warning.
fn check_privileges() {
    // SAFETY: geteuid just returns the effective user ID of the process.
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        warn!("Not running as root (euid={}) - PWM access may be denied", euid);
    }
}

// ============================================================================
// CLI
// ============================================================================

fn print_help() {
    eprintln!("picofand {} - thermal fan control daemon", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    picofand [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config PATH   Configuration file (default: {})", pf_core::constants::paths::CONFIG_FILE);
    eprintln!("    -v, --version       Print version");
    eprintln!("    -h, --help          Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    PICOFAN_LOG         Log level (trace, debug, info, warn, error)");
}

fn print_version() {
    println!("picofand {}", VERSION);
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // PHASE 0: Panic handler - log and let the runtime unwind, never die
    // silently under systemd
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("PANIC at {}: {}", location, message);
    }));

    // PHASE 1: Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = PathBuf::from(pf_core::constants::paths::CONFIG_FILE);

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return Ok(());
            }
            "-v" | "--version" => {
                print_version();
                return Ok(());
            }
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = PathBuf::from(&args[i]);
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    // PHASE 2: Initialize logging - journald on systemd hosts, stdout
    // otherwise
    let log_level = std::env::var("PICOFAN_LOG").unwrap_or_else(|_| "info".to_string());
    let mut use_journald = Path::new("/run/systemd/journal/socket").exists();

    if use_journald {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                use tracing_subscriber::prelude::*;
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(tracing_subscriber::EnvFilter::new(&log_level))
                    .init();
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stdout", e);
                use_journald = false;
                tracing_subscriber::fmt()
                    .with_target(false)
                    .with_level(true)
                    .with_env_filter(&log_level)
                    .init();
            }
        }
    } else {
        tracing_subscriber::fmt()
            .with_target(false)
            .with_level(true)
            .with_env_filter(&log_level)
            .init();
    }

    info!("STARTUP: picofand {} starting", VERSION);
    info!("STARTUP: Logging to {}", if use_journald { "systemd journal" } else { "stdout" });
    info!("STARTUP: PID: {}", std::process::id());

    // PHASE 3: Environment checks
    check_privileges();

    if let Err(e) = write_pid_file() {
        error!("Could not write PID file: {}", e);
        std::process::exit(1);
    }

    // PHASE 4: Load configuration; a broken file degrades to the built-in
    // defaults rather than leaving the board uncooled
    let config = match load_config(&config_path) {
        Ok(config) => {
            info!("STARTUP: Configuration loaded from {:?}", config_path);
            config
        }
        Err(e) => {
            error!("Failed to load {:?}: {} - using built-in defaults", config_path, e);
            ControllerConfig::default()
        }
    };
    info!(
        "STARTUP: Thresholds off/min/max = {}/{}/{} °C, tick every {} ms",
        config.off_temp, config.min_temp, config.max_temp, config.tick_interval_ms
    );

    // PHASE 5: Signal handling - request cooperative shutdown so the loop
    // can force the fan off and release the channel before exit
    let shutdown = Arc::new(ShutdownSignal::new());
    let shutdown_for_signal = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("SIGNAL: Received SIGINT/SIGTERM - requesting shutdown");
        shutdown_for_signal.request();
    }) {
        warn!("Failed to set signal handler: {}. Shutdown via signals may not work cleanly.", e);
    }

    // PHASE 6: Claim hardware. Sensor problems are per-tick and recoverable;
    // a channel that cannot be claimed is fatal before the loop starts.
    let sensor = ThermalZoneSensor::new(&config.sensor.path);
    let channel = match SysfsPwm::claim(
        config.pwm.chip,
        config.pwm.channel,
        config.pwm.frequency_hz,
    ) {
        Ok(channel) => channel,
        Err(e) => {
            error!("{}", e);
            cleanup();
            std::process::exit(1);
        }
    };

    // PHASE 7: Run the control loop to completion
    ControlLoop::new(&config, sensor, channel, shutdown).run().await;

    // PHASE 8: Cleanup on exit
    cleanup();
    info!("SHUTDOWN: picofand terminated gracefully");

    Ok(())
}
