//! # Calibration Module
//!
//! Dead zones, sensitivity and range conversion for analog inputs.
//!
//! ## Dead Zone
//!
//! A dead zone absorbs stick-centering noise. Any input whose magnitude is
//! strictly below the threshold becomes exactly `0.0`; inputs at or above it
//! pass through unchanged (there is no rescaling of the remaining range).
//!
//! Two dead zones are applied on the way to the motors: a fine one (0.1) when
//! raw samples are classified, and a coarser one (0.15) when the drive mapper
//! turns axis values into motor commands.
//!
//! ## Sensitivity
//!
//! After the dead zone the value is multiplied by the sensitivity factor
//! (1.0 = unchanged). Outgoing motor values are clamped separately with
//! [`clamp_unit`].
//!
//! ## Usage
//!
//! ```
//! use drive_bridge::controller::calibration::Calibration;
//!
//! let cal = Calibration::new(0.15, 1.0);
//!
//! // Input near center (within dead zone)
//! assert_eq!(cal.apply(0.1), 0.0);
//!
//! // Input outside the dead zone is untouched
//! assert_eq!(cal.apply(0.5), 0.5);
//! ```

/// Dead zone applied by the classifier to raw analog samples.
pub const CLASSIFIER_DEAD_ZONE: f32 = 0.1;

/// Dead zone applied by the drive mapper before computing motor commands.
pub const DRIVE_DEAD_ZONE: f32 = 0.15;

/// Default stick sensitivity multiplier.
pub const DEFAULT_SENSITIVITY: f32 = 1.0;

/// Applies a dead zone and a sensitivity multiplier to a normalized input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Magnitude below which input is treated as neutral.
    dead_zone: f32,
    /// Multiplier applied to input outside the dead zone.
    sensitivity: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            dead_zone: DRIVE_DEAD_ZONE,
            sensitivity: DEFAULT_SENSITIVITY,
        }
    }
}

impl Calibration {
    /// Creates a calibration with the given dead zone and sensitivity.
    ///
    /// Negative values are treated as zero.
    #[must_use]
    pub fn new(dead_zone: f32, sensitivity: f32) -> Self {
        Self {
            dead_zone: dead_zone.max(0.0),
            sensitivity: sensitivity.max(0.0),
        }
    }

    /// Creates a calibration that only suppresses the dead zone.
    ///
    /// # Examples
    ///
    /// ```
    /// use drive_bridge::controller::calibration::Calibration;
    ///
    /// let cal = Calibration::dead_zone_only(0.1);
    /// assert_eq!(cal.apply(-0.05), 0.0);
    /// assert_eq!(cal.apply(-0.7), -0.7);
    /// ```
    #[must_use]
    pub fn dead_zone_only(dead_zone: f32) -> Self {
        Self::new(dead_zone, 1.0)
    }

    /// Returns the configured dead zone.
    #[must_use]
    pub fn dead_zone(&self) -> f32 {
        self.dead_zone
    }

    /// Returns the configured sensitivity.
    #[must_use]
    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    /// Applies dead zone and sensitivity to a normalized input.
    ///
    /// Inputs with `|input| < dead_zone` come back as exactly `0.0`.
    #[must_use]
    pub fn apply(&self, input: f32) -> f32 {
        if input.abs() < self.dead_zone {
            0.0
        } else {
            input * self.sensitivity
        }
    }
}

/// Clamps a motor velocity component to `-1.0..=1.0`.
///
/// # Examples
///
/// ```
/// use drive_bridge::controller::calibration::clamp_unit;
///
/// assert_eq!(clamp_unit(1.7), 1.0);
/// assert_eq!(clamp_unit(-3.0), -1.0);
/// assert_eq!(clamp_unit(0.25), 0.25);
/// ```
#[must_use]
pub fn clamp_unit(value: f32) -> f32 {
    value.max(-1.0).min(1.0)
}

/// Converts raw stick value (0-255) to normalized value (-1.0 to 1.0).
///
/// # Examples
///
/// ```
/// use drive_bridge::controller::calibration::normalize_axis;
///
/// assert!((normalize_axis(0) - (-1.0)).abs() < 0.01);
/// assert!((normalize_axis(128) - 0.0).abs() < 0.01);
/// assert!((normalize_axis(255) - 1.0).abs() < 0.01);
/// ```
#[must_use]
pub fn normalize_axis(raw: i32) -> f32 {
    // 128 is center (0.0); 0 would land just below -1.0
    clamp_unit(((raw as f32) - 128.0) / 127.0)
}

/// Converts raw trigger value (0-255) to normalized value (0.0 to 1.0).
#[must_use]
pub fn normalize_trigger(raw: i32) -> f32 {
    (raw as f32 / 255.0).clamp(0.0, 1.0)
}
