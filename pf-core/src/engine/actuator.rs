//! Smoothing actuator: commanded duty follows the target gradually
//!
//! First-order exponential smoothing. Each application moves the commanded
//! duty `smoothing_factor` of the remaining distance toward the target and
//! writes the result to the PWM channel; abrupt jumps would be audible and
//! mechanically stressful, and spin-down is smoothed the same way as
//! spin-up.

use tracing::debug;

use crate::engine::ControllerState;
use crate::hw::PwmChannel;
use pf_error::ActuatorError;

/// Wraps a PWM channel with exponential smoothing of the duty command
#[derive(Debug)]
pub struct SmoothingActuator<P: PwmChannel> {
    channel: P,
    smoothing_factor: f32,
    speed_ceiling: f32,
}

impl<P: PwmChannel> SmoothingActuator<P> {
    pub fn new(channel: P, smoothing_factor: f32, speed_ceiling: f32) -> Self {
        Self {
            channel,
            smoothing_factor,
            speed_ceiling,
        }
    }

    /// Advance the accumulator one step toward `target` and write it out
    ///
    /// The accumulator in `state` is updated before the write and is kept
    /// on a write failure, so convergence resumes unharmed at the next
    /// successful write. Returns the duty actually committed.
    pub fn apply(
        &mut self,
        state: &mut ControllerState,
        target: f32,
    ) -> Result<f32, ActuatorError> {
        let next = state.commanded_speed
            + self.smoothing_factor * (target - state.commanded_speed);
        state.commanded_speed = next.clamp(0.0, self.speed_ceiling);

        debug!(
            "Fan speed adjust: {:.1}% (target: {:.1}%)",
            state.commanded_speed, target
        );

        self.channel.set_duty_percent(state.commanded_speed)?;
        Ok(state.commanded_speed)
    }

    /// Unsmoothed final write of 0, used once at shutdown
    pub fn force_off(&mut self, state: &mut ControllerState) -> Result<(), ActuatorError> {
        state.commanded_speed = 0.0;
        self.channel.set_duty_percent(0.0)
    }

    /// Release the underlying PWM channel
    pub fn release(&mut self) -> Result<(), ActuatorError> {
        self.channel.release()
    }
}
