//! # Drive Bridge Library
//!
//! Drive a differential-drive robot with a PlayStation controller.
//!
//! This library provides the input pipeline that turns raw gamepad events into
//! per-wheel velocity commands: a polled device source, a name-based event
//! classifier, a differential-drive control mapper and a supervisor that runs
//! the fixed-rate poll loop.

pub mod actuator;
pub mod config;
pub mod controller;
pub mod error;
pub mod serial;
pub mod supervisor;
