//! # Event Classifier Module
//!
//! Turns loosely named [`RawComponentSample`]s into canonical controller
//! events.
//!
//! Raw HID component names differ between vendors and drivers, so components
//! are identified by ordered, first-match-wins name rules instead of a fixed
//! per-device table. Supporting another controller means adding rows.
//!
//! ## Button Rules
//!
//! | Pattern | Button |
//! |---------|--------|
//! | "cross", token "0" | Cross |
//! | "circle", token "1" | Circle |
//! | "square", token "2" | Square |
//! | "triangle", token "3" | Triangle |
//! | "l1", "lb" | L1 |
//! | "r1", "rb" | R1 |
//! | "l2", "lt" | L2 |
//! | "r2", "rt" | R2 |
//! | "share" | Share |
//! | "options" | Options |
//! | "l3" / "r3" / "touchpad" / token "ps" | L3 / R3 / Touchpad / PS |
//!
//! ## Axis Rules
//!
//! | Pattern | Axis |
//! |---------|------|
//! | "x" and "left" | LeftStickX |
//! | "y" and "left" | LeftStickY |
//! | "x" and "right" | RightStickX |
//! | "y" and "right" | RightStickY |
//! | "z", or "trigger" and "left" | L2Trigger |
//! | "rz", or "trigger" and "right" | R2Trigger |
//!
//! Rules are tried top to bottom, so any name containing "z" (including
//! "rz") is the left trigger; only "trigger" and "right" reaches R2Trigger.
//! Names that match no rule are dropped without an error.

use serde::Deserialize;
use tracing::trace;

use super::calibration::{Calibration, CLASSIFIER_DEAD_ZONE};
use super::device::RawComponentSample;

/// Canonical controller buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalButton {
    Cross,
    Circle,
    Square,
    Triangle,
    L1,
    R1,
    L2,
    R2,
    Share,
    Options,
    L3,
    R3,
    #[serde(rename = "ps")]
    PS,
    Touchpad,
}

/// Canonical analog axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalAxis {
    LeftStickX,
    LeftStickY,
    RightStickX,
    RightStickY,
    L2Trigger,
    R2Trigger,
}

/// A hardware-independent controller event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanonicalEvent {
    ButtonPressed(CanonicalButton),
    ButtonReleased(CanonicalButton),
    /// Axis value after the classifier dead zone.
    AxisMoved(CanonicalAxis, f32),
}

/// How a rule looks for text inside a lower-cased component name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamePattern {
    /// Anywhere in the name.
    Contains(String),
    /// A whole token, where tokens are split on non-alphanumeric characters.
    Token(String),
}

impl NamePattern {
    pub fn contains(text: &str) -> Self {
        Self::Contains(text.to_lowercase())
    }

    pub fn token(text: &str) -> Self {
        Self::Token(text.to_lowercase())
    }

    /// `name` must already be lower-cased.
    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Contains(text) => name.contains(text.as_str()),
            Self::Token(text) => name
                .split(|c: char| !c.is_alphanumeric())
                .any(|token| token == text),
        }
    }
}

/// A button rule: the first pattern that matches assigns the button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonRule {
    pub pattern: NamePattern,
    pub button: CanonicalButton,
}

impl ButtonRule {
    pub fn new(pattern: NamePattern, button: CanonicalButton) -> Self {
        Self { pattern, button }
    }
}

/// An axis rule: matches when every pattern of any alternative matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisRule {
    pub alternatives: Vec<Vec<NamePattern>>,
    pub axis: CanonicalAxis,
}

impl AxisRule {
    fn matches(&self, name: &str) -> bool {
        self.alternatives
            .iter()
            .any(|all| all.iter().all(|pattern| pattern.matches(name)))
    }
}

/// Built-in button rules, evaluated in order.
pub fn default_button_rules() -> Vec<ButtonRule> {
    use CanonicalButton::*;
    use NamePattern as P;

    [
        (P::contains("cross"), Cross),
        (P::token("0"), Cross),
        (P::contains("circle"), Circle),
        (P::token("1"), Circle),
        (P::contains("square"), Square),
        (P::token("2"), Square),
        (P::contains("triangle"), Triangle),
        (P::token("3"), Triangle),
        (P::contains("l1"), L1),
        (P::contains("lb"), L1),
        (P::contains("r1"), R1),
        (P::contains("rb"), R1),
        (P::contains("l2"), L2),
        (P::contains("lt"), L2),
        (P::contains("r2"), R2),
        (P::contains("rt"), R2),
        (P::contains("share"), Share),
        (P::contains("options"), Options),
        (P::contains("l3"), L3),
        (P::contains("r3"), R3),
        (P::contains("touchpad"), Touchpad),
        (P::token("ps"), PS),
    ]
    .into_iter()
    .map(|(pattern, button)| ButtonRule::new(pattern, button))
    .collect()
}

/// Built-in axis rules, evaluated in order.
pub fn default_axis_rules() -> Vec<AxisRule> {
    use CanonicalAxis::*;
    use NamePattern as P;

    let all = |words: &[&str]| words.iter().map(|w| P::contains(w)).collect::<Vec<_>>();

    vec![
        AxisRule { alternatives: vec![all(&["x", "left"])], axis: LeftStickX },
        AxisRule { alternatives: vec![all(&["y", "left"])], axis: LeftStickY },
        AxisRule { alternatives: vec![all(&["x", "right"])], axis: RightStickX },
        AxisRule { alternatives: vec![all(&["y", "right"])], axis: RightStickY },
        AxisRule {
            alternatives: vec![all(&["z"]), all(&["trigger", "left"])],
            axis: L2Trigger,
        },
        AxisRule {
            alternatives: vec![all(&["rz"]), all(&["trigger", "right"])],
            axis: R2Trigger,
        },
    ]
}

/// Classifies raw samples into canonical events.
///
/// # Examples
///
/// ```
/// use drive_bridge::controller::classifier::{
///     CanonicalAxis, CanonicalButton, CanonicalEvent, EventClassifier,
/// };
/// use drive_bridge::controller::device::RawComponentSample;
///
/// let classifier = EventClassifier::new();
///
/// let event = classifier.classify(&RawComponentSample::digital("0", 1.0));
/// assert_eq!(event, Some(CanonicalEvent::ButtonPressed(CanonicalButton::Cross)));
///
/// let event = classifier.classify(&RawComponentSample::analog("x axis left", 0.5));
/// assert_eq!(event, Some(CanonicalEvent::AxisMoved(CanonicalAxis::LeftStickX, 0.5)));
/// ```
#[derive(Debug, Clone)]
pub struct EventClassifier {
    button_rules: Vec<ButtonRule>,
    axis_rules: Vec<AxisRule>,
    dead_zone: Calibration,
}

impl Default for EventClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl EventClassifier {
    /// Creates a classifier with the built-in rules and a 0.1 dead zone.
    #[must_use]
    pub fn new() -> Self {
        Self {
            button_rules: default_button_rules(),
            axis_rules: default_axis_rules(),
            dead_zone: Calibration::dead_zone_only(CLASSIFIER_DEAD_ZONE),
        }
    }

    /// Replaces the analog dead zone.
    #[must_use]
    pub fn with_dead_zone(mut self, dead_zone: f32) -> Self {
        self.dead_zone = Calibration::dead_zone_only(dead_zone);
        self
    }

    /// Puts extra button rules ahead of the existing ones.
    #[must_use]
    pub fn with_button_rules(mut self, rules: Vec<ButtonRule>) -> Self {
        let builtin = std::mem::take(&mut self.button_rules);
        self.button_rules = rules.into_iter().chain(builtin).collect();
        self
    }

    /// Classifies one raw sample.
    ///
    /// Returns `None` for digital values other than 0.0/1.0 and for names no
    /// rule recognizes.
    #[must_use]
    pub fn classify(&self, sample: &RawComponentSample) -> Option<CanonicalEvent> {
        let name = sample.name.to_lowercase();

        let event = if sample.is_analog {
            let value = self.dead_zone.apply(sample.value);
            self.match_axis(&name)
                .map(|axis| CanonicalEvent::AxisMoved(axis, value))
        } else if sample.value == 1.0 {
            self.match_button(&name).map(CanonicalEvent::ButtonPressed)
        } else if sample.value == 0.0 {
            self.match_button(&name).map(CanonicalEvent::ButtonReleased)
        } else {
            None
        };

        if event.is_none() {
            trace!("Dropped unclassified sample: {:?}", sample);
        }
        event
    }

    fn match_button(&self, name: &str) -> Option<CanonicalButton> {
        self.button_rules
            .iter()
            .find(|rule| rule.pattern.matches(name))
            .map(|rule| rule.button)
    }

    fn match_axis(&self, name: &str) -> Option<CanonicalAxis> {
        self.axis_rules
            .iter()
            .find(|rule| rule.matches(name))
            .map(|rule| rule.axis)
    }
}
