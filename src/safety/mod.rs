//! # Safety Module
//!
//! Fail-to-safe supervision independent of link diagnostics.

pub mod failsafe;

pub use failsafe::{FailsafeSettings, FailsafeSupervisor};
