//! # ROV Link Library
//!
//! Command and safety data plane of a remotely operated vehicle.
//!
//! An operator node sends CRC-checked command frames over a long-range LoRa
//! link to the vehicle node. The vehicle validates each frame, fail-safes on
//! communication loss, restarts a silent radio, drives its tracks, and relays
//! the landing-gear state to a landing actuator node over a short-range link
//! until that node confirms deployment.

pub mod config;
pub mod error;
pub mod io;
pub mod link;
pub mod motor;
pub mod node;
pub mod protocol;
pub mod relay;
pub mod safety;
