//! Controller configuration
//!
//! Loaded once at startup from a JSON file (default
//! `/etc/picofan/config.json`); a missing file yields the built-in
//! defaults. There is no runtime reload.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::constants::{control, limits, pwm, temperature};
use pf_error::{ControlError, Result};

/// Thermal controller configuration, immutable for the process lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Below this average temperature the fan may turn off (°C)
    #[serde(default = "default_off_temp")]
    pub off_temp: f32,

    /// Average temperature at which the ramp starts (°C)
    #[serde(default = "default_min_temp")]
    pub min_temp: f32,

    /// Average temperature at which the ramp saturates (°C)
    #[serde(default = "default_max_temp")]
    pub max_temp: f32,

    /// Duty at the bottom of the ramp (percent)
    #[serde(default = "default_speed_floor")]
    pub speed_floor: f32,

    /// Duty at and above `max_temp` (percent)
    #[serde(default = "default_speed_ceiling")]
    pub speed_ceiling: f32,

    /// Exponential smoothing factor, (0, 1]
    #[serde(default = "default_smoothing_factor")]
    pub smoothing_factor: f32,

    /// Minimum time the fan stays on after activation (seconds)
    #[serde(default = "default_min_run_time_secs")]
    pub min_run_time_secs: u64,

    /// Control loop tick period (milliseconds)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Temperature source settings
    #[serde(default)]
    pub sensor: SensorSettings,

    /// PWM output settings
    #[serde(default)]
    pub pwm: PwmSettings,
}

/// Temperature source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorSettings {
    /// Thermal zone file exposing integer millidegrees Celsius
    #[serde(default = "default_sensor_path")]
    pub path: String,
}

/// PWM output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PwmSettings {
    /// Index under /sys/class/pwm (pwmchipN)
    #[serde(default)]
    pub chip: u32,

    /// Channel within the chip (pwmN); channel 0 of chip 0 is GPIO18 on
    /// the reference board
    #[serde(default)]
    pub channel: u32,

    /// Carrier frequency in Hz
    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: u32,
}

fn default_off_temp() -> f32 {
    control::DEFAULT_OFF_TEMP
}

fn default_min_temp() -> f32 {
    control::DEFAULT_MIN_TEMP
}

fn default_max_temp() -> f32 {
    control::DEFAULT_MAX_TEMP
}

fn default_speed_floor() -> f32 {
    control::DEFAULT_SPEED_FLOOR
}

fn default_speed_ceiling() -> f32 {
    control::DEFAULT_SPEED_CEILING
}

fn default_smoothing_factor() -> f32 {
    control::DEFAULT_SMOOTHING_FACTOR
}

fn default_min_run_time_secs() -> u64 {
    control::DEFAULT_MIN_RUN_TIME_SECS
}

fn default_tick_interval_ms() -> u64 {
    control::DEFAULT_TICK_INTERVAL_MS
}

fn default_sensor_path() -> String {
    crate::constants::paths::THERMAL_ZONE_TEMP.to_string()
}

fn default_frequency_hz() -> u32 {
    pwm::DEFAULT_FREQUENCY_HZ
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            off_temp: default_off_temp(),
            min_temp: default_min_temp(),
            max_temp: default_max_temp(),
            speed_floor: default_speed_floor(),
            speed_ceiling: default_speed_ceiling(),
            smoothing_factor: default_smoothing_factor(),
            min_run_time_secs: default_min_run_time_secs(),
            tick_interval_ms: default_tick_interval_ms(),
            sensor: SensorSettings::default(),
            pwm: PwmSettings::default(),
        }
    }
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            path: default_sensor_path(),
        }
    }
}

impl Default for PwmSettings {
    fn default() -> Self {
        Self {
            chip: 0,
            channel: 0,
            frequency_hz: default_frequency_hz(),
        }
    }
}

impl ControllerConfig {
    /// Duty percent gained per degree Celsius between `min_temp` and `max_temp`
    pub fn gain(&self) -> f32 {
        (self.speed_ceiling - self.speed_floor) / (self.max_temp - self.min_temp)
    }

    /// Validate threshold ordering and value ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.off_temp < self.min_temp) {
            return Err(ControlError::invalid_config(
                "off_temp",
                format!("must be below min_temp ({} >= {})", self.off_temp, self.min_temp),
            ));
        }
        if !(self.min_temp < self.max_temp) {
            return Err(ControlError::invalid_config(
                "min_temp",
                format!("must be below max_temp ({} >= {})", self.min_temp, self.max_temp),
            ));
        }
        if self.max_temp > temperature::MAX_VALID_CELSIUS {
            return Err(ControlError::invalid_config(
                "max_temp",
                format!("{} exceeds {}°C", self.max_temp, temperature::MAX_VALID_CELSIUS),
            ));
        }
        if self.speed_floor < 0.0 || self.speed_floor >= self.speed_ceiling {
            return Err(ControlError::invalid_config(
                "speed_floor",
                format!("must be in [0, speed_ceiling), got {}", self.speed_floor),
            ));
        }
        if self.speed_ceiling > pwm::MAX_DUTY_PERCENT {
            return Err(ControlError::invalid_config(
                "speed_ceiling",
                format!("must be at most 100, got {}", self.speed_ceiling),
            ));
        }
        if !(self.smoothing_factor > 0.0 && self.smoothing_factor <= control::MAX_SMOOTHING) {
            return Err(ControlError::invalid_config(
                "smoothing_factor",
                format!("must be in (0, 1], got {}", self.smoothing_factor),
            ));
        }
        if self.tick_interval_ms < control::MIN_TICK_INTERVAL_MS {
            return Err(ControlError::invalid_config(
                "tick_interval_ms",
                format!(
                    "must be at least {} ms, got {}",
                    control::MIN_TICK_INTERVAL_MS,
                    self.tick_interval_ms
                ),
            ));
        }
        if self.pwm.frequency_hz == 0 {
            return Err(ControlError::invalid_config(
                "pwm.frequency_hz",
                "must be at least 1 Hz".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load and validate configuration from a JSON file
///
/// A missing file is the normal first-boot case and yields the defaults.
/// An unreadable, oversized, unparsable, or invalid file is an error; the
/// daemon decides whether to degrade to defaults or abort.
pub fn load_config(path: &Path) -> Result<ControllerConfig> {
    if !path.exists() {
        return Ok(ControllerConfig::default());
    }

    let size = fs::metadata(path)
        .map_err(|e| ControlError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?
        .len();
    if size > limits::MAX_CONFIG_SIZE {
        return Err(ControlError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            max_size: limits::MAX_CONFIG_SIZE,
        });
    }

    let content = fs::read_to_string(path).map_err(|e| ControlError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: ControllerConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
