//! # Serial Communication Module
//!
//! Drives robot hardware over a USB serial link.
//!
//! This module handles:
//! - Opening the motor controller's serial port
//! - Encoding actuator commands as text lines
//! - Logging and swallowing write failures so the control loop never stalls

pub mod encoder;
pub mod port_trait;

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::actuator::{Actuator, ActuatorCommand, KNOWN_ACTIONS};
use crate::error::{DriveBridgeError, Result};
use encoder::encode_command;
use port_trait::{SerialPortIO, SystemSerialPort};

/// Default motor controller baud rate
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Write timeout for the serial port
const WRITE_TIMEOUT_MS: u64 = 100;

/// Actuator that sends text commands to a motor controller board
///
/// A `SerialActuator` without a port (see [`SerialActuator::disconnected`])
/// logs a warning for every command and sends nothing.
pub struct SerialActuator<P: SerialPortIO = SystemSerialPort> {
    /// Serial port handle
    port: Option<P>,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl<P: SerialPortIO> std::fmt::Debug for SerialActuator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialActuator")
            .field("device_path", &self.device_path)
            .field("connected", &self.port.is_some())
            .finish_non_exhaustive()
    }
}

impl SerialActuator<SystemSerialPort> {
    /// Open connection to the motor controller
    ///
    /// # Arguments
    ///
    /// * `path` - Device path (e.g., "/dev/ttyUSB0")
    /// * `baud_rate` - Baud rate the board listens at
    ///
    /// # Errors
    ///
    /// Returns `Serial` error if the port cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use drive_bridge::serial::SerialActuator;
    ///
    /// let actuator = SerialActuator::open("/dev/ttyUSB0", 9600)?;
    /// println!("Connected to: {}", actuator.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        debug!("Trying to open serial port: {}", path);

        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(Duration::from_millis(WRITE_TIMEOUT_MS))
            .open()
            .map_err(|e| DriveBridgeError::Serial(format!("Failed to open {}: {}", path, e)))?;

        info!("Serial robot connected on {} at {} baud", path, baud_rate);
        Ok(Self::with_port(SystemSerialPort::new(port), path))
    }
}

impl<P: SerialPortIO> SerialActuator<P> {
    /// Wrap an already opened port
    pub fn with_port(port: P, device_path: &str) -> Self {
        Self {
            port: Some(port),
            device_path: device_path.to_string(),
        }
    }

    /// An actuator whose port could not be opened
    pub fn disconnected(device_path: &str) -> Self {
        Self {
            port: None,
            device_path: device_path.to_string(),
        }
    }

    /// Get the device path of the serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Close the connection; later commands are dropped with a warning
    pub fn close(&mut self) {
        if self.port.take().is_some() {
            info!("Serial robot disconnected from {}", self.device_path);
        }
    }

    /// Encode and write one command, logging any failure
    fn send(&mut self, command: &ActuatorCommand) {
        let Some(port) = self.port.as_mut() else {
            warn!("Robot not connected, dropping {:?}", command);
            return;
        };

        let line = encode_command(command);
        let result = port.write_all(&line).and_then(|_| port.flush());

        match result {
            Ok(()) => debug!(
                "Command sent: {}",
                String::from_utf8_lossy(&line).trim_end()
            ),
            Err(e) => error!("Failed to send command to {}: {}", self.device_path, e),
        }
    }
}

impl<P: SerialPortIO> Actuator for SerialActuator<P> {
    fn drive(&mut self, left: f32, right: f32) {
        self.send(&ActuatorCommand::Drive { left, right });
    }

    fn stop(&mut self) {
        self.send(&ActuatorCommand::Stop);
        info!("Stop command sent");
    }

    fn perform_action(&mut self, name: &str) {
        if !KNOWN_ACTIONS.contains(&name.to_lowercase().as_str()) {
            debug!("Forwarding custom action '{}'", name);
        }
        self.send(&ActuatorCommand::Action(name.to_string()));
        info!("Action performed: {}", name);
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}
