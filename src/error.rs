//! # Error Types
//!
//! Custom error types for Drive Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for Drive Bridge
#[derive(Debug, Error)]
pub enum DriveBridgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No usable gamepad was found during acquisition
    #[error("No controller found")]
    DeviceNotFound,

    /// Device access errors other than a lost connection
    #[error("Controller error: {0}")]
    Device(String),

    /// The device stopped answering polls
    #[error("Controller disconnected: {0}")]
    Disconnected(String),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),
}

/// Result type alias for Drive Bridge
pub type Result<T> = std::result::Result<T, DriveBridgeError>;
