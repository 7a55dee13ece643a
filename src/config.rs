//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional; missing values take the defaults
//! below.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::controller::classifier::{ButtonRule, CanonicalButton, NamePattern};
use crate::controller::device::DEFAULT_NAME_HINTS;
use crate::error::{DriveBridgeError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub classifier: ClassifierConfig,
    pub drive: DriveConfig,
    pub supervisor: SupervisorConfig,
    pub actuator: ActuatorConfig,
    pub logging: LoggingConfig,
}

/// Controller device configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    /// Explicit `/dev/input/eventX` path; empty means auto-detect
    #[serde(default)]
    pub device_path: String,

    #[serde(default = "default_name_hints")]
    pub name_hints: Vec<String>,
}

/// Event classifier configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default = "default_classifier_dead_zone")]
    pub dead_zone: f32,

    /// Extra button rules, checked before the built-in ones
    #[serde(default)]
    pub button_aliases: Vec<ButtonAlias>,
}

/// One extra `(pattern, button)` classifier row
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ButtonAlias {
    pub pattern: String,
    pub button: CanonicalButton,

    /// Match a whole token instead of a substring
    #[serde(default)]
    pub token: bool,
}

/// Drive mapping configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DriveConfig {
    #[serde(default = "default_drive_dead_zone")]
    pub dead_zone: f32,

    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,
}

/// Poll loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SupervisorConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Which actuator receives motor commands
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorKind {
    /// Log commands only
    Log,
    /// Text commands over a serial port
    Serial,
}

/// Actuator configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ActuatorConfig {
    #[serde(default = "default_actuator_kind")]
    pub kind: ActuatorKind,

    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default level; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily log files; empty logs to the console only
    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_name_hints() -> Vec<String> {
    DEFAULT_NAME_HINTS.iter().map(|h| h.to_string()).collect()
}

fn default_classifier_dead_zone() -> f32 { 0.1 }

fn default_drive_dead_zone() -> f32 { 0.15 }
fn default_sensitivity() -> f32 { 1.0 }

fn default_poll_interval_ms() -> u64 { 16 }

fn default_actuator_kind() -> ActuatorKind { ActuatorKind::Log }
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 9600 }

fn default_log_level() -> String { "info".to_string() }

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_path: String::new(),
            name_hints: default_name_hints(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            dead_zone: default_classifier_dead_zone(),
            button_aliases: Vec::new(),
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            dead_zone: default_drive_dead_zone(),
            sensitivity: default_sensitivity(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            kind: default_actuator_kind(),
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

impl ClassifierConfig {
    /// Classifier rows for the configured aliases, in file order
    pub fn button_rules(&self) -> Vec<ButtonRule> {
        self.button_aliases
            .iter()
            .map(|alias| {
                let pattern = if alias.token {
                    NamePattern::token(&alias.pattern)
                } else {
                    NamePattern::contains(&alias.pattern)
                };
                ButtonRule::new(pattern, alias.button)
            })
            .collect()
    }
}

fn invalid(msg: impl std::fmt::Display) -> DriveBridgeError {
    DriveBridgeError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use drive_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Validate dead zones
        if !(0.0..0.5).contains(&self.classifier.dead_zone) {
            return Err(invalid("classifier dead_zone must be between 0.0 and 0.5"));
        }

        if !(0.0..0.5).contains(&self.drive.dead_zone) {
            return Err(invalid("drive dead_zone must be between 0.0 and 0.5"));
        }

        if self.drive.sensitivity <= 0.0 || self.drive.sensitivity > 4.0 {
            return Err(invalid("sensitivity must be greater than 0.0 and at most 4.0"));
        }

        for alias in &self.classifier.button_aliases {
            if alias.pattern.trim().is_empty() {
                return Err(invalid("button alias pattern cannot be empty"));
            }
        }

        // Validate timing
        if self.supervisor.poll_interval_ms == 0 || self.supervisor.poll_interval_ms > 1000 {
            return Err(invalid("poll_interval_ms must be between 1 and 1000"));
        }

        // Validate actuator
        if self.actuator.kind == ActuatorKind::Serial && self.actuator.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if ![9600, 19200, 38400, 57600, 115200].contains(&self.actuator.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200",
            ));
        }

        // Validate logging
        if !["trace", "debug", "info", "warn", "error"]
            .contains(&self.logging.level.to_lowercase().as_str())
        {
            return Err(invalid(
                "log level must be one of: trace, debug, info, warn, error",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config.device.device_path, "");
        assert_eq!(config.device.name_hints, default_name_hints());
        assert_eq!(config.classifier.dead_zone, 0.1);
        assert_eq!(config.drive.dead_zone, 0.15);
        assert_eq!(config.drive.sensitivity, 1.0);
        assert_eq!(config.supervisor.poll_interval_ms, 16);
        assert_eq!(config.actuator.kind, ActuatorKind::Log);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[device]
device_path = "/dev/input/event5"

[classifier]
dead_zone = 0.05

[[classifier.button_aliases]]
pattern = "btn_south"
button = "cross"

[[classifier.button_aliases]]
pattern = "7"
button = "options"
token = true

[drive]
sensitivity = 0.8

[supervisor]
poll_interval_ms = 20

[actuator]
kind = "serial"
port = "/dev/ttyACM0"
baud_rate = 115200

[logging]
level = "debug"
log_dir = "./logs"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.device.device_path, "/dev/input/event5");
        assert_eq!(config.classifier.dead_zone, 0.05);
        assert_eq!(config.classifier.button_aliases.len(), 2);
        assert_eq!(config.classifier.button_aliases[1].button, CanonicalButton::Options);
        assert_eq!(config.drive.sensitivity, 0.8);
        assert_eq!(config.drive.dead_zone, 0.15);
        assert_eq!(config.supervisor.poll_interval_ms, 20);
        assert_eq!(config.actuator.kind, ActuatorKind::Serial);
        assert_eq!(config.actuator.port, "/dev/ttyACM0");
        assert_eq!(config.actuator.baud_rate, 115200);
        assert_eq!(config.logging.log_dir, "./logs");
    }

    #[test]
    fn test_shipped_default_file_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        let config = Config::load(path).unwrap();
        let defaults = Config::default();

        assert_eq!(config.device.name_hints, defaults.device.name_hints);
        assert_eq!(config.classifier.dead_zone, defaults.classifier.dead_zone);
        assert!(config.classifier.button_aliases.is_empty());
        assert_eq!(config.drive.dead_zone, defaults.drive.dead_zone);
        assert_eq!(config.supervisor.poll_interval_ms, defaults.supervisor.poll_interval_ms);
        assert_eq!(config.actuator.kind, defaults.actuator.kind);
        assert_eq!(config.actuator.baud_rate, defaults.actuator.baud_rate);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/drive-bridge.toml");
        assert!(matches!(result, Err(DriveBridgeError::Io(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::from_toml("[drive\nsensitivity = ");
        assert!(matches!(result, Err(DriveBridgeError::Config(_))));
    }

    #[test]
    fn test_unknown_button_name_rejected() {
        let result = Config::from_toml(
            r#"
[[classifier.button_aliases]]
pattern = "a"
button = "start"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_actuator_kind_rejected() {
        let result = Config::from_toml("[actuator]\nkind = \"can\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_button_rules_from_aliases() {
        let config = Config::from_toml(
            r#"
[[classifier.button_aliases]]
pattern = "BTN_SOUTH"
button = "cross"

[[classifier.button_aliases]]
pattern = "ps"
button = "ps"
token = true
"#,
        )
        .unwrap();

        assert_eq!(
            config.classifier.button_rules(),
            vec![
                ButtonRule::new(NamePattern::contains("btn_south"), CanonicalButton::Cross),
                ButtonRule::new(NamePattern::token("ps"), CanonicalButton::PS),
            ]
        );
    }

    #[test]
    fn test_empty_alias_pattern() {
        let mut config = Config::default();
        config.classifier.button_aliases.push(ButtonAlias {
            pattern: "  ".to_string(),
            button: CanonicalButton::Cross,
            token: false,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_classifier_dead_zone_negative() {
        let mut config = Config::default();
        config.classifier.dead_zone = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_classifier_dead_zone_too_high() {
        let mut config = Config::default();
        config.classifier.dead_zone = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_drive_dead_zone_zero_allowed() {
        let mut config = Config::default();
        config.drive.dead_zone = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_drive_dead_zone_too_high() {
        let mut config = Config::default();
        config.drive.dead_zone = 0.6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sensitivity_zero() {
        let mut config = Config::default();
        config.drive.sensitivity = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sensitivity_too_high() {
        let mut config = Config::default();
        config.drive.sensitivity = 4.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval_zero() {
        let mut config = Config::default();
        config.supervisor.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval_too_high() {
        let mut config = Config::default();
        config.supervisor.poll_interval_ms = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_serial_port_with_serial_actuator() {
        let mut config = Config::default();
        config.actuator.kind = ActuatorKind::Serial;
        config.actuator.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_serial_port_with_log_actuator() {
        let mut config = Config::default();
        config.actuator.port = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = Config::default();
        config.actuator.baud_rate = 420000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_baud_rates() {
        for &baud in &[9600, 19200, 38400, 57600, 115200] {
            let mut config = Config::default();
            config.actuator.baud_rate = baud;
            assert!(config.validate().is_ok(), "Baud rate {} should be valid", baud);
        }
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_case_insensitive() {
        let mut config = Config::default();
        config.logging.level = "WARN".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_name_hints(), vec!["ps", "sony", "playstation", "wireless"]);
        assert_eq!(default_classifier_dead_zone(), 0.1);
        assert_eq!(default_drive_dead_zone(), 0.15);
        assert_eq!(default_sensitivity(), 1.0);
        assert_eq!(default_poll_interval_ms(), 16);
        assert_eq!(default_actuator_kind(), ActuatorKind::Log);
        assert_eq!(default_serial_port(), "/dev/ttyUSB0");
        assert_eq!(default_baud_rate(), 9600);
        assert_eq!(default_log_level(), "info");
    }
}
