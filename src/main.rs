//! # Drive Bridge
//!
//! Drive a differential-drive robot with a PS4-style gamepad.
//!
//! Gamepad samples are classified into canonical button/axis events, mapped to
//! left/right wheel velocities and sent to an actuator: a logging stand-in or
//! a motor controller board on a serial port.

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use drive_bridge::actuator::logging::LoggingActuator;
use drive_bridge::actuator::Actuator;
use drive_bridge::config::{ActuatorKind, Config, LoggingConfig};
use drive_bridge::controller::calibration::Calibration;
use drive_bridge::controller::classifier::EventClassifier;
use drive_bridge::controller::device::EvdevSource;
use drive_bridge::controller::drive_mapper::DriveMapper;
use drive_bridge::serial::SerialActuator;
use drive_bridge::supervisor::{LoopExit, Supervisor};

/// Configuration file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Prefix for daily log files
const LOG_FILE_PREFIX: &str = "drive-bridge.log";

const CONNECT_HINT: &str =
    "Make sure your PS4 controller is connected via USB or wireless adapter";

/// Main entry point for Drive Bridge
///
/// # Control Flow
///
/// 1. Load configuration (first argument, else `config/default.toml`, else defaults)
/// 2. Set up logging
/// 3. Open the gamepad; exit with a failure status if none is found
/// 4. Build the actuator, classifier and drive mapper
/// 5. Poll until Ctrl+C or the gamepad disconnects, then stop the robot
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let config = load_config()?;
    let _log_guard = init_logging(&config.logging)?;

    info!("Drive Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let source = match open_source(&config) {
        Ok(source) => source,
        Err(e) => {
            report_missing_controller(&e);
            // The log guard flushes the file when main returns
            return Ok(ExitCode::FAILURE);
        }
    };
    info!("Controller connected: {}", source.device_path());

    let classifier = EventClassifier::new()
        .with_dead_zone(config.classifier.dead_zone)
        .with_button_rules(config.classifier.button_rules());

    let mapper = DriveMapper::with_calibration(
        build_actuator(&config),
        Calibration::new(config.drive.dead_zone, config.drive.sensitivity),
    );

    let mut supervisor = Supervisor::new(
        Box::new(source),
        classifier,
        mapper,
        Duration::from_millis(config.supervisor.poll_interval_ms),
    );

    info!("Press Ctrl+C to exit");
    let exit = supervisor
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        })
        .await;

    match exit {
        LoopExit::Stopped => info!("Drive Bridge stopped"),
        LoopExit::Disconnected => warn!("Controller disconnected, robot stopped"),
        LoopExit::Aborted => error!("Polling ended unexpectedly"),
    }

    Ok(ExitCode::SUCCESS)
}

fn report_missing_controller(e: &drive_bridge::error::DriveBridgeError) {
    error!("No controller found: {}", e);
    error!("{}", CONNECT_HINT);
}

/// Resolve and load the configuration file
fn load_config() -> Result<Config> {
    if let Some(path) = std::env::args().nth(1) {
        return Config::load(&path).with_context(|| format!("Failed to load config {}", path));
    }

    if Path::new(DEFAULT_CONFIG_PATH).exists() {
        return Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load config {}", DEFAULT_CONFIG_PATH));
    }

    Ok(Config::default())
}

/// Install the global subscriber
///
/// `RUST_LOG` overrides the configured level. When `log_dir` is set, output
/// is also written to a daily rolling file; the returned guard flushes it on
/// drop and must live until exit.
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(logging.level.to_lowercase()))
        .context("Invalid log filter")?;

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());

    if logging.log_dir.is_empty() {
        registry.try_init().context("Failed to install logger")?;
        return Ok(None);
    }

    let appender = tracing_appender::rolling::daily(&logging.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    registry
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer),
        )
        .try_init()
        .context("Failed to install logger")?;

    Ok(Some(guard))
}

fn open_source(config: &Config) -> drive_bridge::error::Result<EvdevSource> {
    if config.device.device_path.is_empty() {
        EvdevSource::open(&config.device.name_hints)
    } else {
        EvdevSource::open_path(&config.device.device_path)
    }
}

/// Build the configured actuator
///
/// A serial port that cannot be opened is not fatal: the robot stays
/// disconnected and commands are dropped with a warning.
fn build_actuator(config: &Config) -> Box<dyn Actuator> {
    match config.actuator.kind {
        ActuatorKind::Log => {
            info!("Using logging actuator");
            Box::new(LoggingActuator::new())
        }
        ActuatorKind::Serial => {
            match SerialActuator::open(&config.actuator.port, config.actuator.baud_rate) {
                Ok(actuator) => Box::new(actuator),
                Err(e) => {
                    error!("Failed to connect to robot: {}", e);
                    Box::new(<SerialActuator>::disconnected(&config.actuator.port))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        assert_eq!(DEFAULT_CONFIG_PATH, "config/default.toml");
    }

    #[test]
    fn test_log_actuator_selected_by_default() {
        let actuator = build_actuator(&Config::default());
        assert!(actuator.is_connected());
    }

    #[test]
    fn test_unopenable_serial_port_is_disconnected() {
        let mut config = Config::default();
        config.actuator.kind = ActuatorKind::Serial;
        config.actuator.port = "/dev/nonexistent_serial_device_12345".to_string();

        let actuator = build_actuator(&config);
        assert!(!actuator.is_connected());
    }

    #[test]
    fn test_missing_controller_hint_reaches_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let logging = LoggingConfig {
            level: "info".to_string(),
            log_dir: dir.path().to_string_lossy().to_string(),
        };

        let guard = init_logging(&logging).unwrap();
        report_missing_controller(&drive_bridge::error::DriveBridgeError::DeviceNotFound);
        drop(guard);

        let logged: String = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
            .collect();
        assert!(logged.contains(CONNECT_HINT), "log file: {:?}", logged);
    }

    #[test]
    fn test_missing_device_path_fails() {
        let mut config = Config::default();
        config.device.device_path = "/dev/input/nonexistent_event_12345".to_string();
        assert!(open_source(&config).is_err());
    }
}
