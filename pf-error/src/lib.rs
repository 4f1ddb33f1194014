//! Unified error handling for Picofan
//!
//! This crate provides the error types used across all Picofan components.
//! It uses thiserror for ergonomic error definitions with proper Display and
//! Error trait impls.
//!
//! The two hardware-facing operations get their own error types
//! ([`SensorReadError`], [`ActuatorError`]) so callers can state their
//! handling policy per operation; [`ControlError`] unifies them for the
//! places that carry either.

use std::io;
use std::path::PathBuf;

/// Result type alias using ControlError
pub type Result<T> = std::result::Result<T, ControlError>;

/// Failure to obtain a temperature sample from the thermal zone.
///
/// Policy: never retried mid-tick; the control loop skips the tick's
/// decision and keeps the previous commanded output.
#[derive(thiserror::Error, Debug)]
pub enum SensorReadError {
    #[error("failed to read temperature from {path}: {source}")]
    Io {
        path: PathBuf,
        source: io::Error,
    },

    #[error("temperature value '{raw}' from {path} is not an integer")]
    Parse {
        path: PathBuf,
        raw: String,
    },
}

/// Failure on the PWM output side.
///
/// Policy: `Claim` is fatal at startup (the daemon must not enter the tick
/// loop without the channel); everything else is logged and the loop
/// continues.
#[derive(thiserror::Error, Debug)]
pub enum ActuatorError {
    #[error("failed to claim PWM channel pwmchip{chip}/pwm{channel}: {reason}")]
    Claim {
        chip: u32,
        channel: u32,
        reason: String,
    },

    #[error("invalid duty cycle {value} (must be 0-100)")]
    InvalidDuty {
        value: f32,
    },

    #[error("failed to write duty cycle to {path}: {source}")]
    DutyWrite {
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to release PWM channel pwmchip{chip}/pwm{channel}: {source}")]
    Release {
        chip: u32,
        channel: u32,
        source: io::Error,
    },
}

/// Unified error type for all Picofan operations
#[derive(thiserror::Error, Debug)]
pub enum ControlError {
    // ============================================================================
    // Hardware Errors
    // ============================================================================
    #[error(transparent)]
    Sensor(#[from] SensorReadError),

    #[error(transparent)]
    Actuator(#[from] ActuatorError),

    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("file too large: {path} ({size} bytes, max {max_size} bytes)")]
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },
}

impl ControlError {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid-config error for a named field
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
