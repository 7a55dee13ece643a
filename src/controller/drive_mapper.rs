//! # Drive Mapper Module
//!
//! Maps canonical controller events to differential-drive commands.
//!
//! ## Axis Assignments
//!
//! | Axis | Command | Notes |
//! |------|---------|-------|
//! | Left Stick Y | `drive(-y, -y)` | Inverted: stick up reports negative |
//! | Left Stick X | `rotate(x)` = `drive(-x, x)` | Spin in place |
//! | Right Stick X | `drive(-x, x)` | "Strafe"; same as rotation on two wheels |
//! | Right Stick Y | none | Logged only |
//! | L2 / R2 | none | Recorded in [`ControlState`] |
//!
//! ## Button Assignments
//!
//! | Button | Action |
//! |--------|--------|
//! | Cross | `jump` |
//! | Circle | `action1` |
//! | Square | `action2` |
//! | Triangle | `action3` |
//! | L1 | `boost` |
//! | R1 | `strafe` |
//! | Options | stop |
//!
//! Other buttons and all releases do nothing.

use tracing::{debug, info, warn};

use super::calibration::{clamp_unit, Calibration};
use super::classifier::{CanonicalAxis, CanonicalButton, CanonicalEvent};
use crate::actuator::Actuator;

/// What a button press does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    /// Forward a named action to the actuator.
    Perform(&'static str),
    /// Stop the robot immediately.
    Stop,
}

/// Button → action table.
pub const BUTTON_ACTIONS: &[(CanonicalButton, ButtonAction)] = &[
    (CanonicalButton::Cross, ButtonAction::Perform("jump")),
    (CanonicalButton::Circle, ButtonAction::Perform("action1")),
    (CanonicalButton::Square, ButtonAction::Perform("action2")),
    (CanonicalButton::Triangle, ButtonAction::Perform("action3")),
    (CanonicalButton::L1, ButtonAction::Perform("boost")),
    (CanonicalButton::R1, ButtonAction::Perform("strafe")),
    (CanonicalButton::Options, ButtonAction::Stop),
];

/// Looks up the action bound to `button`.
#[must_use]
pub fn button_action(button: CanonicalButton) -> Option<ButtonAction> {
    BUTTON_ACTIONS
        .iter()
        .find(|(b, _)| *b == button)
        .map(|(_, action)| *action)
}

/// Latest calibrated stick and trigger values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlState {
    pub left_stick_x: f32,
    pub left_stick_y: f32,
    pub right_stick_x: f32,
    pub left_trigger: f32,
    pub right_trigger: f32,
}

/// Per-wheel velocity command, each side in `-1.0..=1.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotorCommand {
    pub left: f32,
    pub right: f32,
}

impl MotorCommand {
    /// Creates a command, clamping both sides.
    #[must_use]
    pub fn new(left: f32, right: f32) -> Self {
        Self {
            left: clamp_unit(left),
            right: clamp_unit(right),
        }
    }

    /// Symmetric forward/backward motion.
    #[must_use]
    pub fn straight(speed: f32) -> Self {
        Self::new(speed, speed)
    }

    /// Opposite wheel motion (spin in place).
    #[must_use]
    pub fn spin(angular: f32) -> Self {
        Self::new(negate(angular), angular)
    }
}

/// Negation that maps `0.0` to `+0.0` instead of `-0.0`.
fn negate(value: f32) -> f32 {
    0.0 - value
}

/// Mapper lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapperPhase {
    /// No event seen yet.
    Idle,
    /// Handling events.
    Active,
    /// The controller was lost; further events are ignored.
    Disconnected,
}

/// Turns canonical events into actuator calls.
///
/// Owns the [`ControlState`]. Not thread-safe; the poll loop is its only
/// user.
///
/// # Examples
///
/// ```
/// use drive_bridge::actuator::logging::LoggingActuator;
/// use drive_bridge::controller::classifier::{CanonicalAxis, CanonicalEvent};
/// use drive_bridge::controller::drive_mapper::{DriveMapper, MotorCommand};
///
/// let mut mapper = DriveMapper::new(Box::new(LoggingActuator::new()));
/// let command = mapper.handle_event(CanonicalEvent::AxisMoved(CanonicalAxis::LeftStickY, -0.8));
///
/// assert_eq!(command, Some(MotorCommand { left: 0.8, right: 0.8 }));
/// ```
pub struct DriveMapper {
    actuator: Box<dyn Actuator>,
    calibration: Calibration,
    state: ControlState,
    phase: MapperPhase,
}

impl std::fmt::Debug for DriveMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveMapper")
            .field("calibration", &self.calibration)
            .field("state", &self.state)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl DriveMapper {
    /// Creates a mapper with the default 0.15 dead zone and 1.0 sensitivity.
    pub fn new(actuator: Box<dyn Actuator>) -> Self {
        Self::with_calibration(actuator, Calibration::default())
    }

    pub fn with_calibration(actuator: Box<dyn Actuator>, calibration: Calibration) -> Self {
        Self {
            actuator,
            calibration,
            state: ControlState::default(),
            phase: MapperPhase::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ControlState {
        &self.state
    }

    #[must_use]
    pub fn phase(&self) -> MapperPhase {
        self.phase
    }

    /// Whether the underlying actuator reports a live connection.
    #[must_use]
    pub fn actuator_connected(&self) -> bool {
        self.actuator.is_connected()
    }

    /// Handles one event.
    ///
    /// Returns the motor command sent to the actuator, if the event produced
    /// one. Events arriving after a disconnection are ignored.
    pub fn handle_event(&mut self, event: CanonicalEvent) -> Option<MotorCommand> {
        match self.phase {
            MapperPhase::Disconnected => {
                debug!("Ignoring {:?} after disconnection", event);
                return None;
            }
            MapperPhase::Idle => self.phase = MapperPhase::Active,
            MapperPhase::Active => {}
        }

        match event {
            CanonicalEvent::ButtonPressed(button) => {
                self.handle_button(button);
                None
            }
            CanonicalEvent::ButtonReleased(button) => {
                debug!("Button released: {:?}", button);
                None
            }
            CanonicalEvent::AxisMoved(axis, raw) => self.handle_axis(axis, raw),
        }
    }

    /// Stops the robot once after the controller is lost.
    ///
    /// Later calls do nothing.
    pub fn handle_disconnect(&mut self) {
        if self.phase == MapperPhase::Disconnected {
            return;
        }
        warn!("Controller disconnected, stopping robot");
        self.phase = MapperPhase::Disconnected;
        self.actuator.stop();
    }

    /// Sends a final stop when the poll loop exits normally.
    pub fn shutdown(&mut self) {
        info!("Stopping robot");
        self.actuator.stop();
    }

    fn handle_button(&mut self, button: CanonicalButton) {
        debug!("Button pressed: {:?}", button);

        match button_action(button) {
            Some(ButtonAction::Perform(name)) => {
                info!("{:?} pressed, performing '{}'", button, name);
                self.actuator.perform_action(name);
            }
            Some(ButtonAction::Stop) => {
                info!("{:?} pressed, stopping robot", button);
                self.actuator.stop();
            }
            None => {}
        }
    }

    fn handle_axis(&mut self, axis: CanonicalAxis, raw: f32) -> Option<MotorCommand> {
        let value = self.calibration.apply(raw);

        match axis {
            CanonicalAxis::LeftStickY => {
                self.state.left_stick_y = value;
                // Stick up reports negative but means forward
                let command = MotorCommand::straight(negate(value));
                debug!("Movement: {:.2}", command.left);
                self.actuator.drive(command.left, command.right);
                Some(command)
            }
            CanonicalAxis::LeftStickX => {
                self.state.left_stick_x = value;
                let angular = clamp_unit(value);
                debug!("Rotation: {:.2}", angular);
                self.actuator.rotate(angular);
                Some(MotorCommand::spin(angular))
            }
            CanonicalAxis::RightStickX => {
                self.state.right_stick_x = value;
                // A two-wheel base cannot strafe; this is the rotation formula
                let command = MotorCommand::spin(value);
                debug!("Strafe: {:.2}", value);
                self.actuator.drive(command.left, command.right);
                Some(command)
            }
            CanonicalAxis::RightStickY => {
                debug!("Right stick Y: {:.2}", value);
                None
            }
            CanonicalAxis::L2Trigger => {
                self.state.left_trigger = value;
                debug!("Left trigger: {:.2}", value);
                None
            }
            CanonicalAxis::R2Trigger => {
                self.state.right_trigger = value;
                debug!("Right trigger: {:.2}", value);
                None
            }
        }
    }
}
