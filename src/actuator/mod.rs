//! # Actuator Module
//!
//! The port through which motor commands leave the pipeline.
//!
//! An [`Actuator`] drives a two-wheel differential base: `drive(left, right)`
//! sets both wheel velocities (each in `-1.0..=1.0`), `rotate(a)` spins in
//! place and `stop()` zeroes both channels. Discrete actions are forwarded
//! by name.
//!
//! Implementations:
//! - [`logging::LoggingActuator`]: in-process stand-in that tracks velocities
//!   and logs every command
//! - [`crate::serial::SerialActuator`]: encodes commands as text lines on a
//!   serial port
//!
//! Transport failures are an implementation concern. They are logged and
//! swallowed; callers never see them.

pub mod logging;

use crate::controller::calibration::clamp_unit;

/// Action names every actuator understands.
pub const KNOWN_ACTIONS: &[&str] = &["forward", "backward", "left", "right", "stop"];

/// Motor command sink for a differential-drive robot.
#[cfg_attr(test, mockall::automock)]
pub trait Actuator: Send {
    /// Set left and right wheel velocities (`-1.0..=1.0`).
    fn drive(&mut self, left: f32, right: f32);

    /// Rotate in place. Positive values drive the right wheel forward.
    fn rotate(&mut self, angular: f32) {
        let angular = clamp_unit(angular);
        self.drive(-angular, angular);
    }

    /// Zero both channels. Calling it repeatedly is harmless.
    fn stop(&mut self);

    /// Perform a named action such as `"forward"` or `"jump"`.
    fn perform_action(&mut self, name: &str);

    /// Whether the actuator can currently deliver commands.
    fn is_connected(&self) -> bool;
}

/// A command as received by an actuator, for logging and test recording.
#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCommand {
    Drive { left: f32, right: f32 },
    Stop,
    Action(String),
}
