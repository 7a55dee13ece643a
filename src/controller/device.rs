//! # Device Source Module
//!
//! Owns the raw gamepad handle and turns each poll into a batch of
//! [`RawComponentSample`]s.
//!
//! ## Linux evdev
//!
//! [`EvdevSource`] reads `/dev/input/event*` through evdev. Kernel key and axis
//! codes are rendered as HID-style component names so the name-based
//! classifier can match them:
//!
//! | evdev Code | Component name | Range |
//! |------------|----------------|-------|
//! | ABS_X / ABS_Y | left stick x / y | -1.0..1.0 |
//! | ABS_RX / ABS_RY | right stick x / y | -1.0..1.0 |
//! | ABS_Z / ABS_RZ | left / right trigger | 0.0..1.0 |
//! | BTN_SOUTH | cross | 0 / 1 |
//! | BTN_EAST | circle | 0 / 1 |
//! | BTN_WEST | square | 0 / 1 |
//! | BTN_NORTH | triangle | 0 / 1 |
//!
//! Codes missing from the table keep their lower-cased evdev name
//! (e.g. `btn_dpad_up`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use evdev::{AbsoluteAxisType, Device, EventStream, InputEvent, InputEventKind, Key};
use tracing::{debug, info, warn};

use super::calibration::{normalize_axis, normalize_trigger};
use crate::error::{DriveBridgeError, Result};

/// Default substrings that identify a PlayStation controller by device name.
pub const DEFAULT_NAME_HINTS: &[&str] = &["ps", "sony", "playstation", "wireless"];

/// One hardware component reading produced by a poll.
#[derive(Debug, Clone, PartialEq)]
pub struct RawComponentSample {
    /// Vendor/driver specific component name.
    pub name: String,
    /// `true` for sticks and triggers, `false` for buttons.
    pub is_analog: bool,
    /// Raw value; 0.0/1.0 for buttons.
    pub value: f32,
}

impl RawComponentSample {
    /// Creates an analog sample.
    pub fn analog(name: impl Into<String>, value: f32) -> Self {
        Self {
            name: name.into(),
            is_analog: true,
            value,
        }
    }

    /// Creates a digital (button) sample.
    pub fn digital(name: impl Into<String>, value: f32) -> Self {
        Self {
            name: name.into(),
            is_analog: false,
            value,
        }
    }
}

/// Connection lifecycle of a device source.
///
/// `Disconnected` is terminal: a source that lost its device is never
/// polled again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Polling,
}

/// A pollable source of raw controller input.
#[async_trait]
pub trait DeviceSource: Send {
    /// Drains every event the hardware queued since the last poll, in
    /// hardware order, without waiting for new ones.
    ///
    /// # Errors
    ///
    /// Returns [`DriveBridgeError::Disconnected`] once the device is gone. The
    /// source stays `Disconnected` and every later poll fails the same way.
    async fn poll(&mut self) -> Result<Vec<RawComponentSample>>;

    /// Current connection state.
    fn connection_state(&self) -> ConnectionState;

    /// Human-readable description for logs.
    fn description(&self) -> &str;
}

/// Value range of an evdev absolute axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisRange {
    /// 0-255, centered at 128.
    Stick,
    /// 0-255, released at 0.
    Trigger,
    /// -1/0/1.
    Hat,
}

const AXIS_COMPONENTS: &[(AbsoluteAxisType, &str, AxisRange)] = &[
    (AbsoluteAxisType::ABS_X, "left stick x", AxisRange::Stick),
    (AbsoluteAxisType::ABS_Y, "left stick y", AxisRange::Stick),
    (AbsoluteAxisType::ABS_RX, "right stick x", AxisRange::Stick),
    (AbsoluteAxisType::ABS_RY, "right stick y", AxisRange::Stick),
    (AbsoluteAxisType::ABS_Z, "left trigger", AxisRange::Trigger),
    (AbsoluteAxisType::ABS_RZ, "right trigger", AxisRange::Trigger),
    (AbsoluteAxisType::ABS_HAT0X, "hat x", AxisRange::Hat),
    (AbsoluteAxisType::ABS_HAT0Y, "hat y", AxisRange::Hat),
];

const KEY_COMPONENTS: &[(Key, &str)] = &[
    (Key::BTN_SOUTH, "cross"),
    (Key::BTN_EAST, "circle"),
    (Key::BTN_WEST, "square"),
    (Key::BTN_NORTH, "triangle"),
    (Key::BTN_TL, "l1"),
    (Key::BTN_TR, "r1"),
    (Key::BTN_TL2, "l2"),
    (Key::BTN_TR2, "r2"),
    (Key::BTN_SELECT, "share"),
    (Key::BTN_START, "options"),
    (Key::BTN_MODE, "ps"),
    (Key::BTN_THUMBL, "l3"),
    (Key::BTN_THUMBR, "r3"),
    (Key::BTN_TOUCH, "touchpad"),
];

/// Component name for an evdev key code.
fn key_component_name(key: Key) -> String {
    KEY_COMPONENTS
        .iter()
        .find(|(code, _)| *code == key)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| format!("{:?}", key).to_lowercase())
}

/// Component name and normalized value for an evdev axis reading.
fn axis_component(axis: AbsoluteAxisType, raw: i32) -> (String, f32) {
    match AXIS_COMPONENTS.iter().find(|(code, _, _)| *code == axis) {
        Some((_, name, range)) => {
            let value = match range {
                AxisRange::Stick => normalize_axis(raw),
                AxisRange::Trigger => normalize_trigger(raw),
                AxisRange::Hat => raw as f32,
            };
            ((*name).to_string(), value)
        }
        None => (format!("{:?}", axis).to_lowercase(), raw as f32),
    }
}

/// Converts an evdev event into a raw sample.
///
/// Returns `None` for synchronization and other non-input events.
fn sample_from_event(event: &InputEvent) -> Option<RawComponentSample> {
    match event.kind() {
        InputEventKind::Key(key) => Some(RawComponentSample::digital(
            key_component_name(key),
            event.value() as f32,
        )),
        InputEventKind::AbsAxis(axis) => {
            let (name, value) = axis_component(axis, event.value());
            Some(RawComponentSample::analog(name, value))
        }
        _ => None,
    }
}

/// Gamepad read through the Linux evdev interface.
pub struct EvdevSource {
    stream: EventStream,
    device_path: String,
    description: String,
    state: ConnectionState,
}

impl std::fmt::Debug for EvdevSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevSource")
            .field("device_path", &self.device_path)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl EvdevSource {
    /// Detect and open a controller
    ///
    /// Scans `/dev/input/event*` in numeric order. Only devices exposing
    /// gamepad buttons are considered. The first one whose name contains one
    /// of `name_hints` (case-insensitive) wins; otherwise the first gamepad is
    /// used.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `DeviceNotFound`: no usable controller on the system
    /// - `Device`: `/dev/input` is missing or unreadable
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use drive_bridge::controller::device::{EvdevSource, DEFAULT_NAME_HINTS};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let hints: Vec<String> = DEFAULT_NAME_HINTS.iter().map(|h| h.to_string()).collect();
    /// let source = EvdevSource::open(&hints)?;
    /// println!("Connected to controller at: {}", source.device_path());
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(name_hints: &[String]) -> Result<Self> {
        let input_dir = Path::new("/dev/input");

        if !input_dir.exists() {
            return Err(DriveBridgeError::Device(
                "/dev/input directory not found".to_string(),
            ));
        }

        let mut entries: Vec<PathBuf> = std::fs::read_dir(input_dir)
            .map_err(|e| DriveBridgeError::Device(format!("Failed to read /dev/input: {}", e)))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| {
                DriveBridgeError::Device(format!("Failed to read directory entry: {}", e))
            })?;

        // Numeric order so event9 comes before event10
        entries.sort_by_key(|path| (event_number(path), path.clone()));

        let mut devices: Vec<(PathBuf, Device)> = Vec::new();
        let mut candidates: Vec<Candidate> = Vec::new();

        for path in entries {
            if event_number(&path).is_none() {
                continue;
            }

            let device = match Device::open(&path) {
                Ok(device) => device,
                Err(e) => {
                    debug!("Could not open {}: {}", path.display(), e);
                    continue;
                }
            };

            let candidate = Candidate {
                name: device.name().unwrap_or_default().to_string(),
                has_gamepad_buttons: is_gamepad(&device),
            };
            debug!(
                "Found input device: {} ({}, gamepad buttons: {})",
                path.display(),
                candidate.name,
                candidate.has_gamepad_buttons
            );

            candidates.push(candidate);
            devices.push((path, device));
        }

        let Some(selection) = select_candidate(&candidates, name_hints) else {
            return Err(DriveBridgeError::DeviceNotFound);
        };

        let (path, device) = devices.swap_remove(selection.index);
        let name = &candidates[selection.index].name;
        if selection.hinted {
            info!("Found controller '{}' at {}", name, path.display());
        } else {
            warn!(
                "No PlayStation controller found, using '{}' at {}",
                name,
                path.display()
            );
        }
        Self::from_device(device, &path)
    }

    /// Open a specific `/dev/input/eventX` node.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let device = Device::open(path).map_err(|e| {
            DriveBridgeError::Device(format!("Failed to open {}: {}", path.display(), e))
        })?;
        info!(
            "Opened controller '{}' at {}",
            device.name().unwrap_or("unknown"),
            path.display()
        );
        Self::from_device(device, path)
    }

    fn from_device(device: Device, path: &Path) -> Result<Self> {
        let description = format!(
            "{} ({})",
            device.name().unwrap_or("unknown controller"),
            path.display()
        );
        let stream = device.into_event_stream().map_err(|e| {
            DriveBridgeError::Device(format!("Failed to stream {}: {}", path.display(), e))
        })?;

        Ok(Self {
            stream,
            device_path: path.to_string_lossy().to_string(),
            description,
            state: ConnectionState::Connected,
        })
    }

    /// The `/dev/input/eventX` path this source reads from.
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[async_trait]
impl DeviceSource for EvdevSource {
    async fn poll(&mut self) -> Result<Vec<RawComponentSample>> {
        if self.state == ConnectionState::Disconnected {
            return Err(DriveBridgeError::Disconnected(self.device_path.clone()));
        }

        let mut samples = Vec::new();
        loop {
            // A zero timeout returns whatever is already queued and never waits
            match tokio::time::timeout(Duration::ZERO, self.stream.next_event()).await {
                Ok(Ok(event)) => samples.extend(sample_from_event(&event)),
                Ok(Err(e)) => {
                    self.state = ConnectionState::Disconnected;
                    return Err(DriveBridgeError::Disconnected(format!(
                        "{}: {}",
                        self.device_path, e
                    )));
                }
                Err(_) => break,
            }
        }

        self.state = ConnectionState::Polling;
        Ok(samples)
    }

    fn connection_state(&self) -> ConnectionState {
        self.state
    }

    fn description(&self) -> &str {
        &self.description
    }
}

fn matches_name_hint(name: &str, hints: &[String]) -> bool {
    let name = name.to_lowercase();
    hints
        .iter()
        .any(|hint| !hint.is_empty() && name.contains(&hint.to_lowercase()))
}

/// Name and capabilities of one scanned input node.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    name: String,
    has_gamepad_buttons: bool,
}

/// Index of the chosen candidate, and whether its name matched a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Selection {
    index: usize,
    hinted: bool,
}

/// Pick the node to read from.
///
/// Only nodes with gamepad buttons qualify: touchpads, mice and the motion
/// sensor node of a DualShock also carry "ps"/"wireless" in their names but
/// report absolute X/Y that would read as a fully deflected stick. Among
/// gamepads, the first hinted name wins over the first unhinted one.
fn select_candidate(candidates: &[Candidate], hints: &[String]) -> Option<Selection> {
    let gamepads = || {
        candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.has_gamepad_buttons)
    };

    gamepads()
        .find(|(_, c)| matches_name_hint(&c.name, hints))
        .map(|(index, _)| Selection { index, hinted: true })
        .or_else(|| {
            gamepads()
                .next()
                .map(|(index, _)| Selection { index, hinted: false })
        })
}

/// `N` for an `eventN` node, `None` for anything else.
fn event_number(path: &Path) -> Option<u32> {
    path.file_name()?
        .to_str()?
        .strip_prefix("event")?
        .parse()
        .ok()
}

fn is_gamepad(device: &Device) -> bool {
    device
        .supported_keys()
        .map(|keys| keys.contains(Key::BTN_SOUTH))
        .unwrap_or(false)
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Device source that replays a fixed script of poll results.
    ///
    /// `Err` entries simulate a lost device. Once the script is exhausted every
    /// poll returns an empty batch.
    pub struct ScriptedSource {
        script: VecDeque<std::result::Result<Vec<RawComponentSample>, String>>,
        state: ConnectionState,
        pub polls: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        pub fn new(
            script: Vec<std::result::Result<Vec<RawComponentSample>, String>>,
        ) -> Self {
            Self {
                script: script.into(),
                state: ConnectionState::Connected,
                polls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn poll_count(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.polls)
        }
    }

    #[async_trait]
    impl DeviceSource for ScriptedSource {
        async fn poll(&mut self) -> Result<Vec<RawComponentSample>> {
            if self.state == ConnectionState::Disconnected {
                return Err(DriveBridgeError::Disconnected("scripted".to_string()));
            }
            self.polls.fetch_add(1, Ordering::SeqCst);

            match self.script.pop_front() {
                Some(Ok(samples)) => {
                    self.state = ConnectionState::Polling;
                    Ok(samples)
                }
                Some(Err(reason)) => {
                    self.state = ConnectionState::Disconnected;
                    Err(DriveBridgeError::Disconnected(reason))
                }
                None => {
                    self.state = ConnectionState::Polling;
                    Ok(Vec::new())
                }
            }
        }

        fn connection_state(&self) -> ConnectionState {
            self.state
        }

        fn description(&self) -> &str {
            "scripted source"
        }
    }
}
