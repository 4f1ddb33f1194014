//! Sysfs PWM channel control
//!
//! Drives a fan through the kernel PWM interface at
//! `/sys/class/pwm/pwmchip<chip>/pwm<channel>`. The channel is claimed
//! once at startup (export, period from the configured frequency, duty 0,
//! enable) and must be released (disable, unexport) before the process
//! exits, with the duty forced to 0 first.
//!
//! # Duty Values
//!
//! Callers work in percent (0-100); the sysfs attributes take nanoseconds
//! of the period.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::constants::{paths, pwm};
use pf_error::ActuatorError;

/// Write-side seam between the control loop and the fan hardware
pub trait PwmChannel {
    /// Set the duty cycle as a percentage (0-100)
    fn set_duty_percent(&mut self, percent: f32) -> Result<(), ActuatorError>;

    /// Stop output and give the channel back to the kernel; must be
    /// idempotent
    fn release(&mut self) -> Result<(), ActuatorError>;
}

/// Convert a duty percentage to nanoseconds of the given period
fn percent_to_duty_ns(period_ns: u64, percent: f32) -> u64 {
    ((period_ns as f64) * (percent as f64) / 100.0).round() as u64
}

/// An exported, enabled sysfs PWM channel
#[derive(Debug)]
pub struct SysfsPwm {
    chip: u32,
    channel: u32,
    channel_dir: PathBuf,
    duty_path: PathBuf,
    period_ns: u64,
    released: bool,
}

impl SysfsPwm {
    /// Claim the channel: export it if needed, program the period for the
    /// given frequency, start at duty 0, and enable output
    ///
    /// Failure here is fatal to the daemon - there is no point entering
    /// the tick loop without the output stage.
    pub fn claim(chip: u32, channel: u32, frequency_hz: u32) -> Result<Self, ActuatorError> {
        Self::claim_at(Path::new(paths::PWM_CHIP_BASE), chip, channel, frequency_hz)
    }

    fn claim_at(
        base_dir: &Path,
        chip: u32,
        channel: u32,
        frequency_hz: u32,
    ) -> Result<Self, ActuatorError> {
        let chip_dir = base_dir.join(format!("pwmchip{}", chip));
        let channel_dir = chip_dir.join(format!("pwm{}", channel));

        if !channel_dir.exists() {
            fs::write(chip_dir.join("export"), channel.to_string()).map_err(|e| {
                ActuatorError::Claim {
                    chip,
                    channel,
                    reason: format!("export failed: {}", e),
                }
            })?;

            // The attribute files appear asynchronously after export.
            let mut settled = false;
            for _ in 0..pwm::EXPORT_SETTLE_ATTEMPTS {
                if channel_dir.join("duty_cycle").exists() {
                    settled = true;
                    break;
                }
                thread::sleep(Duration::from_millis(pwm::EXPORT_SETTLE_DELAY_MS));
            }
            if !settled {
                return Err(ActuatorError::Claim {
                    chip,
                    channel,
                    reason: "exported channel did not appear".to_string(),
                });
            }
        }

        let period_ns = pwm::NANOS_PER_SECOND / frequency_hz as u64;
        let claim_err = |reason: String| ActuatorError::Claim {
            chip,
            channel,
            reason,
        };

        // Duty must never exceed the period, so zero it before programming
        // a possibly shorter period.
        fs::write(channel_dir.join("duty_cycle"), "0")
            .map_err(|e| claim_err(format!("failed to zero duty cycle: {}", e)))?;
        fs::write(channel_dir.join("period"), period_ns.to_string())
            .map_err(|e| claim_err(format!("failed to set period: {}", e)))?;
        fs::write(channel_dir.join("enable"), "1")
            .map_err(|e| claim_err(format!("failed to enable output: {}", e)))?;

        debug!(
            "Claimed pwmchip{}/pwm{} at {} Hz (period {} ns)",
            chip, channel, frequency_hz, period_ns
        );

        Ok(Self {
            chip,
            channel,
            duty_path: channel_dir.join("duty_cycle"),
            channel_dir,
            period_ns,
            released: false,
        })
    }

    fn release_inner(&mut self) -> Result<(), ActuatorError> {
        if self.released {
            return Ok(());
        }

        // Best effort: a channel that cannot be disabled should still be
        // unexported.
        if let Err(e) = fs::write(self.channel_dir.join("enable"), "0") {
            warn!(
                "Failed to disable pwmchip{}/pwm{}: {}",
                self.chip, self.channel, e
            );
        }

        if let Some(chip_dir) = self.channel_dir.parent() {
            fs::write(chip_dir.join("unexport"), self.channel.to_string()).map_err(|e| {
                ActuatorError::Release {
                    chip: self.chip,
                    channel: self.channel,
                    source: e,
                }
            })?;
        }

        self.released = true;
        Ok(())
    }
}

impl PwmChannel for SysfsPwm {
    fn set_duty_percent(&mut self, percent: f32) -> Result<(), ActuatorError> {
        if !percent.is_finite() || !(0.0..=pwm::MAX_DUTY_PERCENT).contains(&percent) {
            return Err(ActuatorError::InvalidDuty { value: percent });
        }

        let duty_ns = percent_to_duty_ns(self.period_ns, percent);
        fs::write(&self.duty_path, duty_ns.to_string()).map_err(|e| ActuatorError::DutyWrite {
            path: self.duty_path.clone(),
            source: e,
        })
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        self.release_inner()
    }
}

impl Drop for SysfsPwm {
    fn drop(&mut self) {
        // Safety net for abnormal exit paths; the loop's shutdown sequence
        // normally releases explicitly first, and the flag keeps this from
        // running twice.
        if !self.released {
            let _ = self.release_inner();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lay out a fake pwmchip directory with an already-exported channel
    fn fake_chip(base: &Path, chip: u32, channel: u32) -> PathBuf {
        let channel_dir = base
            .join(format!("pwmchip{}", chip))
            .join(format!("pwm{}", channel));
        fs::create_dir_all(&channel_dir).unwrap();
        fs::write(channel_dir.join("duty_cycle"), "0").unwrap();
        fs::write(channel_dir.join("period"), "0").unwrap();
        fs::write(channel_dir.join("enable"), "0").unwrap();
        channel_dir
    }

    #[test]
    fn percent_to_duty_spans_the_period() {
        // 25 Hz => 40ms period
        let period = pwm::NANOS_PER_SECOND / 25;
        assert_eq!(percent_to_duty_ns(period, 0.0), 0);
        assert_eq!(percent_to_duty_ns(period, 100.0), period);
        assert_eq!(percent_to_duty_ns(period, 50.0), period / 2);
    }

    #[test]
    fn percent_to_duty_rounds_fractional_duties() {
        assert_eq!(percent_to_duty_ns(1000, 2.08), 21);
        assert_eq!(percent_to_duty_ns(1000, 0.04), 0);
    }

    #[test]
    fn claim_programs_period_and_enables() {
        let base = tempfile::tempdir().unwrap();
        let channel_dir = fake_chip(base.path(), 0, 0);

        let pwm = SysfsPwm::claim_at(base.path(), 0, 0, 25).unwrap();
        assert_eq!(
            fs::read_to_string(channel_dir.join("period")).unwrap(),
            "40000000"
        );
        assert_eq!(fs::read_to_string(channel_dir.join("enable")).unwrap(), "1");
        drop(pwm);
    }

    #[test]
    fn duty_writes_land_in_nanoseconds() {
        let base = tempfile::tempdir().unwrap();
        let channel_dir = fake_chip(base.path(), 0, 0);

        let mut pwm = SysfsPwm::claim_at(base.path(), 0, 0, 25).unwrap();
        pwm.set_duty_percent(50.0).unwrap();
        assert_eq!(
            fs::read_to_string(channel_dir.join("duty_cycle")).unwrap(),
            "20000000"
        );
    }

    #[test]
    fn out_of_range_duty_rejected() {
        let base = tempfile::tempdir().unwrap();
        fake_chip(base.path(), 0, 0);

        let mut pwm = SysfsPwm::claim_at(base.path(), 0, 0, 25).unwrap();
        assert!(matches!(
            pwm.set_duty_percent(101.0),
            Err(ActuatorError::InvalidDuty { .. })
        ));
        assert!(matches!(
            pwm.set_duty_percent(-1.0),
            Err(ActuatorError::InvalidDuty { .. })
        ));
    }

    #[test]
    fn release_disables_and_unexports_once() {
        let base = tempfile::tempdir().unwrap();
        let channel_dir = fake_chip(base.path(), 0, 0);

        let mut pwm = SysfsPwm::claim_at(base.path(), 0, 0, 25).unwrap();
        pwm.release().unwrap();
        assert_eq!(fs::read_to_string(channel_dir.join("enable")).unwrap(), "0");
        let chip_dir = channel_dir.parent().unwrap();
        assert_eq!(fs::read_to_string(chip_dir.join("unexport")).unwrap(), "0");

        // idempotent: second release (and the Drop guard) must not touch
        // the files again
        fs::write(chip_dir.join("unexport"), "sentinel").unwrap();
        pwm.release().unwrap();
        drop(pwm);
        assert_eq!(
            fs::read_to_string(chip_dir.join("unexport")).unwrap(),
            "sentinel"
        );
    }

    #[test]
    fn claim_fails_without_chip() {
        let base = tempfile::tempdir().unwrap();
        assert!(matches!(
            SysfsPwm::claim_at(base.path(), 3, 0, 25),
            Err(ActuatorError::Claim { chip: 3, .. })
        ));
    }
}
