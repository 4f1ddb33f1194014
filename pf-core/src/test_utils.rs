//! Mock hardware for tests
//!
//! In-memory stand-ins for the sensor and PWM traits so control logic can
//! be exercised without sysfs. Used by the unit tests here and by the
//! daemon crate's loop tests.

use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::hw::{PwmChannel, TemperatureSource};
use pf_error::{ActuatorError, SensorReadError};

// ============================================================================
// PWM mock
// ============================================================================

#[derive(Debug, Default)]
struct PwmLogInner {
    duty_writes: Vec<f32>,
    release_calls: u32,
}

/// Shared view of everything a [`MockPwm`] was asked to do
#[derive(Debug, Clone, Default)]
pub struct PwmLog(Arc<Mutex<PwmLogInner>>);

impl PwmLog {
    /// Every duty value written, in order
    pub fn duty_writes(&self) -> Vec<f32> {
        self.0.lock().unwrap().duty_writes.clone()
    }

    /// The most recent duty write, if any
    pub fn last_write(&self) -> Option<f32> {
        self.0.lock().unwrap().duty_writes.last().copied()
    }

    /// How many times the channel was released
    pub fn release_calls(&self) -> u32 {
        self.0.lock().unwrap().release_calls
    }
}

/// Recording PWM channel; optionally fails every duty write
#[derive(Debug, Default)]
pub struct MockPwm {
    log: PwmLog,
    fail_writes: bool,
}

impl MockPwm {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose duty writes always fail (release still succeeds)
    pub fn failing() -> Self {
        Self {
            log: PwmLog::default(),
            fail_writes: true,
        }
    }

    /// Handle onto the write/release log, valid after the mock is moved
    /// into an actuator
    pub fn log(&self) -> PwmLog {
        self.log.clone()
    }
}

impl PwmChannel for MockPwm {
    fn set_duty_percent(&mut self, percent: f32) -> Result<(), ActuatorError> {
        if self.fail_writes {
            return Err(ActuatorError::DutyWrite {
                path: PathBuf::from("mock://pwm"),
                source: io::Error::new(io::ErrorKind::Other, "injected write failure"),
            });
        }
        self.log.0.lock().unwrap().duty_writes.push(percent);
        Ok(())
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        self.log.0.lock().unwrap().release_calls += 1;
        Ok(())
    }
}

// ============================================================================
// Sensor mocks
// ============================================================================

/// Sensor that always reads the same temperature
#[derive(Debug, Clone)]
pub struct ConstSensor(pub f32);

impl TemperatureSource for ConstSensor {
    fn read(&mut self) -> Result<f32, SensorReadError> {
        Ok(self.0)
    }
}

/// Sensor that always fails
#[derive(Debug, Clone, Default)]
pub struct FailingSensor;

impl TemperatureSource for FailingSensor {
    fn read(&mut self) -> Result<f32, SensorReadError> {
        Err(SensorReadError::Io {
            path: PathBuf::from("mock://sensor"),
            source: io::Error::new(io::ErrorKind::Other, "injected read failure"),
        })
    }
}

/// Sensor that plays back a script of readings (`None` = read failure),
/// then repeats the final entry forever
#[derive(Debug, Clone)]
pub struct ScriptedSensor {
    script: VecDeque<Option<f32>>,
    last: Option<f32>,
}

impl ScriptedSensor {
    pub fn new(script: impl IntoIterator<Item = Option<f32>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            last: None,
        }
    }
}

impl TemperatureSource for ScriptedSensor {
    fn read(&mut self) -> Result<f32, SensorReadError> {
        let entry = match self.script.pop_front() {
            Some(entry) => {
                self.last = entry;
                entry
            }
            None => self.last,
        };
        match entry {
            Some(temp) => Ok(temp),
            None => Err(SensorReadError::Io {
                path: PathBuf::from("mock://sensor"),
                source: io::Error::new(io::ErrorKind::Other, "scripted read failure"),
            }),
        }
    }
}
