//! Speed policy: averaged temperature to target duty
//!
//! Three-branch decision with an explicit dead band and a minimum-run-time
//! hold. The dead band between `off_temp` and `min_temp` deliberately makes
//! no decision at all: the previously commanded duty is carried unchanged,
//! which is what keeps the fan from hunting around the lower threshold.

use std::time::{Duration, Instant};

use crate::config::ControllerConfig;

/// Mutable controller state, exclusively owned by the control loop
#[derive(Debug, Clone)]
pub struct ControllerState {
    /// Whether the fan is considered active
    pub running: bool,
    /// Set on the OFF→ON transition, cleared on ON→OFF
    pub activated_at: Option<Instant>,
    /// Exponential-smoothing accumulator; persists across ticks and is
    /// never reset while the loop runs. Always within [0, speed_ceiling].
    pub commanded_speed: f32,
}

impl ControllerState {
    pub fn new() -> Self {
        Self {
            running: false,
            activated_at: None,
            commanded_speed: 0.0,
        }
    }

    /// Record the OFF→ON transition
    pub fn mark_activated(&mut self, now: Instant) {
        self.running = true;
        self.activated_at = Some(now);
    }

    /// Record the ON→OFF transition
    pub fn mark_stopped(&mut self) {
        self.running = false;
        self.activated_at = None;
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of one policy evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedDecision {
    /// Above `min_temp`: track the temperature ramp toward this target duty
    Ramp { target: f32 },
    /// Below `off_temp` with the run-time guard expired: smooth toward zero
    SpinDown,
    /// Below `off_temp` but inside the minimum run time: no output change
    Hold,
    /// Inside the dead band: no decision, previous command retained
    Unchanged,
}

/// Maps an averaged temperature to a duty decision
#[derive(Debug, Clone)]
pub struct SpeedPolicy {
    off_temp: f32,
    min_temp: f32,
    max_temp: f32,
    speed_floor: f32,
    speed_ceiling: f32,
    gain: f32,
    min_run_time: Duration,
}

impl SpeedPolicy {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            off_temp: config.off_temp,
            min_temp: config.min_temp,
            max_temp: config.max_temp,
            speed_floor: config.speed_floor,
            speed_ceiling: config.speed_ceiling,
            gain: config.gain(),
            min_run_time: Duration::from_secs(config.min_run_time_secs),
        }
    }

    /// Evaluate the three-way decision for one tick
    ///
    /// Branch order matters and is part of the contract: the ramp wins over
    /// everything, the off threshold is only consulted below `min_temp`,
    /// and the band between the two thresholds falls through to
    /// [`SpeedDecision::Unchanged`].
    pub fn decide(&self, avg_temp: f32, state: &ControllerState, now: Instant) -> SpeedDecision {
        if avg_temp > self.min_temp {
            let delta = (avg_temp.min(self.max_temp) - self.min_temp).max(0.0);
            let target = (self.speed_floor + delta * self.gain).min(self.speed_ceiling);
            SpeedDecision::Ramp { target }
        } else if avg_temp < self.off_temp {
            let held = state.running
                && state
                    .activated_at
                    .is_some_and(|t| now.duration_since(t) < self.min_run_time);
            if held {
                SpeedDecision::Hold
            } else {
                SpeedDecision::SpinDown
            }
        } else {
            SpeedDecision::Unchanged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_policy() -> SpeedPolicy {
        SpeedPolicy::from_config(&ControllerConfig::default())
    }

    fn ramp_target(policy: &SpeedPolicy, avg: f32) -> f32 {
        match policy.decide(avg, &ControllerState::new(), Instant::now()) {
            SpeedDecision::Ramp { target } => target,
            other => panic!("expected ramp at {avg}°C, got {other:?}"),
        }
    }

    #[test]
    fn ramp_is_monotonic() {
        let policy = test_policy();
        let mut last = 0.0;
        for tenths in 451..=700 {
            let target = ramp_target(&policy, tenths as f32 / 10.0);
            assert!(target >= last, "ramp regressed at {}°C", tenths as f32 / 10.0);
            last = target;
        }
    }

    #[test]
    fn ramp_saturates_at_ceiling_exactly() {
        let policy = test_policy();
        assert_eq!(ramp_target(&policy, 70.0), 100.0);
        assert_eq!(ramp_target(&policy, 85.0), 100.0);
        assert_eq!(ramp_target(&policy, 200.0), 100.0);
    }

    #[test]
    fn reference_scenario_target() {
        // avg 50°C: delta = 5, gain = 3.96, target = 1 + 5 * 3.96 = 20.8
        let policy = test_policy();
        let target = ramp_target(&policy, 50.0);
        assert!((target - 20.8).abs() < 1e-3, "got {target}");
    }

    #[test]
    fn dead_band_makes_no_decision() {
        let policy = test_policy();
        let state = ControllerState::new();
        let now = Instant::now();
        for avg in [40.0, 42.5, 45.0] {
            assert_eq!(policy.decide(avg, &state, now), SpeedDecision::Unchanged);
        }
    }

    #[test]
    fn hold_inside_minimum_run_time() {
        let policy = test_policy();
        let t0 = Instant::now();
        let mut state = ControllerState::new();
        state.mark_activated(t0);
        state.commanded_speed = 20.0;

        // 30s after activation, still guarded
        assert_eq!(
            policy.decide(35.0, &state, t0 + Duration::from_secs(30)),
            SpeedDecision::Hold
        );
        // 61s after activation, guard expired
        assert_eq!(
            policy.decide(35.0, &state, t0 + Duration::from_secs(61)),
            SpeedDecision::SpinDown
        );
    }

    #[test]
    fn spin_down_when_not_running() {
        // below off_temp with the fan already idle there is nothing to hold
        let policy = test_policy();
        assert_eq!(
            policy.decide(35.0, &ControllerState::new(), Instant::now()),
            SpeedDecision::SpinDown
        );
    }
}
