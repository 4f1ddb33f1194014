//! Hardware interaction modules
//!
//! Contains the thermal-zone temperature source and the sysfs PWM channel.
//! Both sit behind one-method-deep traits so the control loop can be
//! driven against mock hardware in tests.

pub mod pwm;
pub mod sensor;

pub use pwm::{PwmChannel, SysfsPwm};
pub use sensor::{TemperatureSource, ThermalZoneSensor};
