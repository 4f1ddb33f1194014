//! Picofan Core Library
//!
//! Closed-loop thermal management for small embedded Linux boards.
//!
//! # How It Works
//!
//! 1. **Sampling**: the CPU temperature is read from the kernel thermal
//!    zone once per tick and pushed into a bounded moving-average window.
//! 2. **Policy**: the averaged temperature is mapped to a target fan duty
//!    through a linear gain between `min_temp` and `max_temp`, with a dead
//!    band below `min_temp` and a minimum-run-time hold that prevents
//!    short-cycling near the off threshold.
//! 3. **Smoothing**: the commanded duty moves a fixed fraction of the way
//!    toward the target each tick (first-order IIR low-pass) before being
//!    written to the PWM channel, so speed changes stay inaudible.
//!
//! # Module Structure
//!
//! - `engine/` - Control algorithms (sampling window, speed policy, smoothing actuator)
//! - `hw/` - Hardware interaction (thermal zone sensor, sysfs PWM channel)

// Grouped modules
pub mod engine;
pub mod hw;

// Standalone modules
pub mod config;
pub mod constants;
pub mod test_utils;

// Re-export primary types from engine/
pub use engine::{ControllerState, SampleWindow, SmoothingActuator, SpeedDecision, SpeedPolicy};

// Re-export hardware types from hw/
pub use hw::{PwmChannel, SysfsPwm, TemperatureSource, ThermalZoneSensor};

// Re-export configuration types
pub use config::{load_config, ControllerConfig, PwmSettings, SensorSettings};

// Re-export error types
pub use pf_error::{ActuatorError, ControlError, Result, SensorReadError};
