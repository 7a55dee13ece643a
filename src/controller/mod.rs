//! # Controller Module
//!
//! Gamepad input handling, from raw device samples to motor commands.
//!
//! This module handles:
//! - Gamepad detection and connection via evdev
//! - Classifying vendor-specific component names into canonical events
//! - Applying dead zones and sensitivity
//! - Mapping canonical events to differential-drive commands

pub mod calibration;
pub mod classifier;
pub mod device;
pub mod drive_mapper;
