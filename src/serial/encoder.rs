//! # Serial Command Encoder
//!
//! Encodes actuator commands as newline-terminated ASCII lines for a motor
//! controller board (Arduino, Raspberry Pi Pico, ...).
//!
//! ## Line Format
//!
//! | Command | Line | Notes |
//! |---------|------|-------|
//! | Drive | `M:<left>,<right>\n` | Velocities in percent, truncated toward zero |
//! | Stop | `STOP\n` | |
//! | Action | `ACTION:<name>\n` | Name forwarded verbatim |

use bytes::{BufMut, Bytes, BytesMut};

use crate::actuator::ActuatorCommand;
use crate::controller::calibration::clamp_unit;

/// Line terminator used by every command.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Stop command line.
pub const STOP_LINE: &[u8] = b"STOP\n";

/// Converts a velocity (-1.0 to 1.0) to a whole percentage (-100 to 100).
///
/// # Examples
///
/// ```
/// use drive_bridge::serial::encoder::velocity_to_percent;
///
/// assert_eq!(velocity_to_percent(0.5), 50);
/// assert_eq!(velocity_to_percent(-0.257), -25);
/// assert_eq!(velocity_to_percent(1.4), 100);
/// ```
#[must_use]
pub fn velocity_to_percent(velocity: f32) -> i32 {
    (clamp_unit(velocity) * 100.0) as i32
}

/// Encode an actuator command into one command line
///
/// # Examples
///
/// ```
/// use drive_bridge::actuator::ActuatorCommand;
/// use drive_bridge::serial::encoder::encode_command;
///
/// let line = encode_command(&ActuatorCommand::Drive { left: -0.5, right: 0.5 });
/// assert_eq!(&line[..], b"M:-50,50\n");
/// ```
#[must_use]
pub fn encode_command(command: &ActuatorCommand) -> Bytes {
    let mut line = BytesMut::with_capacity(16);

    match command {
        ActuatorCommand::Drive { left, right } => {
            line.put_slice(
                format!(
                    "M:{},{}",
                    velocity_to_percent(*left),
                    velocity_to_percent(*right)
                )
                .as_bytes(),
            );
            line.put_u8(LINE_TERMINATOR);
        }
        ActuatorCommand::Stop => line.put_slice(STOP_LINE),
        ActuatorCommand::Action(name) => {
            line.put_slice(b"ACTION:");
            line.put_slice(name.as_bytes());
            line.put_u8(LINE_TERMINATOR);
        }
    }

    line.freeze()
}
