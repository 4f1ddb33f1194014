//! Constants and configuration defaults for Picofan
//!
//! Centralizes all magic numbers, paths, and configuration defaults.
//! Never use magic numbers in other files - add them here first.

/// System paths
pub mod paths {
    /// Default CPU thermal zone on ARM SBCs (plain integer millidegrees)
    pub const THERMAL_ZONE_TEMP: &str = "/sys/class/thermal/thermal_zone0/temp";

    /// Base path for sysfs PWM chips
    pub const PWM_CHIP_BASE: &str = "/sys/class/pwm";

    /// Default configuration file
    pub const CONFIG_FILE: &str = "/etc/picofan/config.json";
}

/// Temperature constants
pub mod temperature {
    /// Thermal zone readings are in millidegrees, divide by this to get Celsius
    pub const MILLIDEGREE_DIVISOR: f32 = 1000.0;

    /// Upper bound accepted for configured thresholds (°C)
    pub const MAX_VALID_CELSIUS: f32 = 150.0;
}

/// Control algorithm parameters and defaults
pub mod control {
    /// Temperature below which the fan may turn off (°C)
    pub const DEFAULT_OFF_TEMP: f32 = 40.0;

    /// Temperature at which the ramp starts (°C)
    pub const DEFAULT_MIN_TEMP: f32 = 45.0;

    /// Temperature at which the ramp saturates (°C)
    pub const DEFAULT_MAX_TEMP: f32 = 70.0;

    /// Duty at the bottom of the ramp (percent)
    pub const DEFAULT_SPEED_FLOOR: f32 = 1.0;

    /// Duty at and above `max_temp` (percent)
    pub const DEFAULT_SPEED_CEILING: f32 = 100.0;

    /// Default smoothing factor: fraction of the remaining distance to the
    /// target covered each tick. Valid range is (0, 1]; 1.0 disables
    /// smoothing entirely.
    pub const DEFAULT_SMOOTHING_FACTOR: f32 = 0.1;

    /// Maximum smoothing factor allowed
    pub const MAX_SMOOTHING: f32 = 1.0;

    /// Minimum time the fan stays on after activation (seconds)
    pub const DEFAULT_MIN_RUN_TIME_SECS: u64 = 60;

    /// Control loop tick period (milliseconds)
    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

    /// Lower bound on the tick period (milliseconds)
    pub const MIN_TICK_INTERVAL_MS: u64 = 50;

    /// Number of samples in the moving-average window
    pub const WINDOW_CAPACITY: usize = 5;
}

/// PWM channel parameters
pub mod pwm {
    /// Default PWM carrier frequency for an RC fan (Hz)
    pub const DEFAULT_FREQUENCY_HZ: u32 = 25;

    /// Nanoseconds per second, for sysfs period/duty_cycle attributes
    pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

    /// Duty cycle range is 0-100 percent
    pub const MAX_DUTY_PERCENT: f32 = 100.0;

    /// How many times to poll for the pwmN attribute files after export
    pub const EXPORT_SETTLE_ATTEMPTS: u32 = 50;

    /// Delay between polls while waiting for the exported channel (ms)
    pub const EXPORT_SETTLE_DELAY_MS: u64 = 10;
}

/// File size limits for security
pub mod limits {
    /// Maximum config file size (64 KiB)
    pub const MAX_CONFIG_SIZE: u64 = 64 * 1024;
}
