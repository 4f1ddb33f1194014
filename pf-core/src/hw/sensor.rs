//! CPU temperature source
//!
//! The kernel thermal-zone interface exposes the current CPU temperature
//! as a plain integer in millidegrees Celsius (e.g., 45000 = 45.0°C).

use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::temperature;
use pf_error::SensorReadError;

/// Read-side seam between the control loop and the temperature hardware
pub trait TemperatureSource {
    /// Read the instantaneous CPU temperature in degrees Celsius
    fn read(&mut self) -> Result<f32, SensorReadError>;
}

/// Reads the sysfs thermal zone file once per call
#[derive(Debug, Clone)]
pub struct ThermalZoneSensor {
    path: PathBuf,
}

impl ThermalZoneSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemperatureSource for ThermalZoneSensor {
    fn read(&mut self) -> Result<f32, SensorReadError> {
        let content = fs::read_to_string(&self.path).map_err(|e| SensorReadError::Io {
            path: self.path.clone(),
            source: e,
        })?;

        let millidegrees = content
            .trim()
            .parse::<i64>()
            .map_err(|_| SensorReadError::Parse {
                path: self.path.clone(),
                raw: content.trim().to_string(),
            })?;

        Ok(millidegrees as f32 / temperature::MILLIDEGREE_DIVISOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sensor_with_content(content: &str) -> (tempfile::TempDir, ThermalZoneSensor) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp");
        let mut file = fs::File::create(&path).unwrap();
        write!(file, "{}", content).unwrap();
        (dir, ThermalZoneSensor::new(path))
    }

    #[test]
    fn converts_millidegrees_to_celsius() {
        let (_dir, mut sensor) = sensor_with_content("51540\n");
        assert!((sensor.read().unwrap() - 51.54).abs() < 1e-3);
    }

    #[test]
    fn negative_readings_are_valid() {
        let (_dir, mut sensor) = sensor_with_content("-5000\n");
        assert_eq!(sensor.read().unwrap(), -5.0);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let (_dir, mut sensor) = sensor_with_content("not-a-number\n");
        assert!(matches!(sensor.read(), Err(SensorReadError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let mut sensor = ThermalZoneSensor::new("/nonexistent/thermal_zone99/temp");
        assert!(matches!(sensor.read(), Err(SensorReadError::Io { .. })));
    }
}
