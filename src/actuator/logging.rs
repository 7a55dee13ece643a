//! In-process actuator that logs commands instead of moving hardware.
//!
//! Useful for bench testing a controller without a robot attached. It keeps
//! the last commanded wheel velocities so they can be inspected.

use tracing::{debug, info, warn};

use super::Actuator;
use crate::controller::calibration::clamp_unit;

/// Actuator stand-in that tracks velocities and logs every command.
#[derive(Debug)]
pub struct LoggingActuator {
    left: f32,
    right: f32,
    connected: bool,
}

impl Default for LoggingActuator {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingActuator {
    pub fn new() -> Self {
        info!("Logging actuator initialized");
        Self {
            left: 0.0,
            right: 0.0,
            connected: true,
        }
    }

    /// Last commanded `(left, right)` velocities.
    pub fn velocities(&self) -> (f32, f32) {
        (self.left, self.right)
    }
}

impl Actuator for LoggingActuator {
    fn drive(&mut self, left: f32, right: f32) {
        self.left = clamp_unit(left);
        self.right = clamp_unit(right);
        debug!("Drive: left={:.2}, right={:.2}", self.left, self.right);
    }

    fn stop(&mut self) {
        self.left = 0.0;
        self.right = 0.0;
        info!("Robot stopped");
    }

    fn perform_action(&mut self, name: &str) {
        info!("Performing action: {}", name);

        match name.to_lowercase().as_str() {
            "forward" => self.drive(1.0, 1.0),
            "backward" => self.drive(-1.0, -1.0),
            "left" => self.drive(-1.0, 1.0),
            "right" => self.drive(1.0, -1.0),
            "stop" => self.stop(),
            _ => warn!("Unknown action: {}", name),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
