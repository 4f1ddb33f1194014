//! Thermal control loop
//!
//! One dedicated worker ticks the pipeline on a fixed period:
//! read temperature -> push into the sampling window -> run the speed
//! policy -> run the smoothing actuator. The loop is cooperatively
//! cancellable; the shutdown signal is checked at the top of every tick
//! and interrupts the inter-tick sleep, so cancellation latency is
//! bounded by one tick period at most.
//!
//! # Failure policy
//! - A sensor read failure aborts only that tick's decision; the previous
//!   commanded duty persists and the loop continues.
//! - An actuator write failure is logged and the loop continues; the
//!   smoothing accumulator keeps converging.
//! - On exit from any path the fan is commanded to 0 once and the PWM
//!   channel released once, in that order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use pf_core::constants::control;
use pf_core::hw::{PwmChannel, TemperatureSource};
use pf_core::{
    ControllerConfig, ControllerState, SampleWindow, SmoothingActuator, SpeedDecision,
    SpeedPolicy,
};

/// Cooperative shutdown flag shared between the signal handler and the loop
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    requested: AtomicBool,
    notify: Notify,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown and wake the loop out of its inter-tick sleep.
    /// Callable from any thread, including a signal handler thread.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Owns the controller state and ticks the control pipeline until shutdown
pub struct ControlLoop<S, P: PwmChannel> {
    tick_interval: Duration,
    sensor: S,
    window: SampleWindow,
    policy: SpeedPolicy,
    actuator: SmoothingActuator<P>,
    state: ControllerState,
    shutdown: Arc<ShutdownSignal>,
}

impl<S: TemperatureSource, P: PwmChannel> ControlLoop<S, P> {
    pub fn new(
        config: &ControllerConfig,
        sensor: S,
        channel: P,
        shutdown: Arc<ShutdownSignal>,
    ) -> Self {
        Self {
            tick_interval: Duration::from_millis(config.tick_interval_ms),
            sensor,
            window: SampleWindow::new(control::WINDOW_CAPACITY),
            policy: SpeedPolicy::from_config(config),
            actuator: SmoothingActuator::new(
                channel,
                config.smoothing_factor,
                config.speed_ceiling,
            ),
            state: ControllerState::new(),
            shutdown,
        }
    }

    /// Run until the shutdown signal is observed, then force the fan off
    /// and release the channel
    pub async fn run(mut self) {
        info!(
            "Control loop starting (tick every {} ms)",
            self.tick_interval.as_millis()
        );

        loop {
            if self.shutdown.is_requested() {
                info!("Control loop shutting down");
                break;
            }

            self.tick(Instant::now());

            tokio::select! {
                _ = tokio::time::sleep(self.tick_interval) => {}
                _ = self.shutdown.notified() => {
                    debug!("Inter-tick sleep interrupted by shutdown request");
                }
            }
        }

        self.finalize();
        info!("Control loop stopped");
    }

    /// One control iteration
    fn tick(&mut self, now: Instant) {
        let temp = match self.sensor.read() {
            Ok(t) => t,
            Err(e) => {
                warn!("{} - skipping this tick's decision", e);
                return;
            }
        };

        let avg = self.window.push(temp);
        debug!("CPU temp: {:.2}°C (average: {:.2}°C)", temp, avg);

        match self.policy.decide(avg, &self.state, now) {
            SpeedDecision::Ramp { target } => {
                if !self.state.running {
                    self.state.mark_activated(now);
                    info!("Fan activated ({:.2}°C average)", avg);
                }
                if let Err(e) = self.actuator.apply(&mut self.state, target) {
                    warn!("{} - keeping state for the next tick", e);
                }
            }
            SpeedDecision::SpinDown => {
                if self.state.running {
                    info!("Fan spinning down ({:.2}°C average)", avg);
                }
                self.state.mark_stopped();
                if let Err(e) = self.actuator.apply(&mut self.state, 0.0) {
                    warn!("{} - keeping state for the next tick", e);
                }
            }
            SpeedDecision::Hold => {
                debug!("Below off threshold but inside minimum run time, holding");
            }
            SpeedDecision::Unchanged => {
                debug!("Average in dead band, command unchanged");
            }
        }
    }

    /// Shutdown sequence: one final zero write, then one release.
    /// The ordering is a correctness requirement - the channel must not be
    /// given up while the fan is still commanded.
    fn finalize(&mut self) {
        if let Err(e) = self.actuator.force_off(&mut self.state) {
            warn!("Failed to force fan off during shutdown: {}", e);
        }
        if let Err(e) = self.actuator.release() {
            warn!("Failed to release PWM channel: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_core::test_utils::{ConstSensor, FailingSensor, MockPwm, ScriptedSensor};

    fn fast_config() -> ControllerConfig {
        ControllerConfig {
            tick_interval_ms: 50,
            ..ControllerConfig::default()
        }
    }

    #[tokio::test]
    async fn shutdown_forces_zero_write_and_single_release() {
        let pwm = MockPwm::new();
        let log = pwm.log();
        let shutdown = Arc::new(ShutdownSignal::new());

        let control = ControlLoop::new(&fast_config(), ConstSensor(50.0), pwm, shutdown.clone());
        let handle = tokio::spawn(control.run());

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.request();
        handle.await.unwrap();

        let writes = log.duty_writes();
        assert!(writes.len() >= 2, "expected ramp writes before shutdown");
        assert_eq!(*writes.last().unwrap(), 0.0);
        // at 50°C the ramp never commands 0, so the final forced write is
        // the only zero in the log
        assert_eq!(writes.iter().filter(|w| **w == 0.0).count(), 1);
        assert_eq!(log.release_calls(), 1);
    }

    #[tokio::test]
    async fn shutdown_before_first_tick_still_finalizes() {
        let pwm = MockPwm::new();
        let log = pwm.log();
        let shutdown = Arc::new(ShutdownSignal::new());
        shutdown.request();

        ControlLoop::new(&fast_config(), ConstSensor(50.0), pwm, shutdown)
            .run()
            .await;

        assert_eq!(log.duty_writes(), vec![0.0]);
        assert_eq!(log.release_calls(), 1);
    }

    #[tokio::test]
    async fn sensor_failure_skips_decisions_but_not_shutdown() {
        let pwm = MockPwm::new();
        let log = pwm.log();
        let shutdown = Arc::new(ShutdownSignal::new());

        let control = ControlLoop::new(&fast_config(), FailingSensor, pwm, shutdown.clone());
        let handle = tokio::spawn(control.run());

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.request();
        handle.await.unwrap();

        // no tick produced a command; only the shutdown write happened
        assert_eq!(log.duty_writes(), vec![0.0]);
        assert_eq!(log.release_calls(), 1);
    }

    #[tokio::test]
    async fn failed_reads_leave_previous_command_in_place() {
        let pwm = MockPwm::new();
        let log = pwm.log();
        let shutdown = Arc::new(ShutdownSignal::new());

        // two good reads, then failures until shutdown
        let sensor = ScriptedSensor::new([Some(50.0), Some(50.0), None]);
        let control = ControlLoop::new(&fast_config(), sensor, pwm, shutdown.clone());
        let handle = tokio::spawn(control.run());

        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown.request();
        handle.await.unwrap();

        let writes = log.duty_writes();
        // exactly the two good ticks plus the final forced zero
        assert_eq!(writes.len(), 3);
        assert!((writes[0] - 2.08).abs() < 1e-3);
        assert!((writes[1] - 3.952).abs() < 1e-3);
        assert_eq!(writes[2], 0.0);
    }

    #[tokio::test]
    async fn actuator_failure_does_not_kill_the_loop() {
        let pwm = MockPwm::failing();
        let log = pwm.log();
        let shutdown = Arc::new(ShutdownSignal::new());

        let control = ControlLoop::new(&fast_config(), ConstSensor(50.0), pwm, shutdown.clone());
        let handle = tokio::spawn(control.run());

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.request();
        handle.await.unwrap();

        // every write failed, including the final one, but the loop ran to
        // completion and still released the channel exactly once
        assert!(log.duty_writes().is_empty());
        assert_eq!(log.release_calls(), 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_long_sleep() {
        let config = ControllerConfig {
            tick_interval_ms: 60_000,
            ..ControllerConfig::default()
        };
        let pwm = MockPwm::new();
        let log = pwm.log();
        let shutdown = Arc::new(ShutdownSignal::new());

        let control = ControlLoop::new(&config, ConstSensor(50.0), pwm, shutdown.clone());
        let handle = tokio::spawn(control.run());

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.request();

        // must come back long before the 60s tick would elapse
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop did not observe shutdown during sleep")
            .unwrap();
        assert_eq!(log.release_calls(), 1);
    }
}
