//! # Long-Range Link Module
//!
//! Handles the long-range radio carrying command frames.
//!
//! This module handles:
//! - The radio abstraction polled by the control loop
//! - Hard module restarts (session end, reset pulse, reinit)
//! - Link liveness tracking and recovery
//! - The UART-attached LoRa module binding

pub mod radio;
pub mod health;
pub mod serial;

pub use health::{HealthSettings, LinkHealthMonitor, LinkState};
pub use radio::{Delay, LongRangeRadio, RestartTimings, StdDelay};
