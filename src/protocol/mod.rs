//! # Command Protocol Module
//!
//! Fixed-size framed command packets exchanged over the long-range link.
//!
//! This module handles:
//! - Frame layout and field types
//! - Encoding operator intent into frames
//! - Length, CRC16 and robot id validation of received frames

pub mod packet;
pub mod encoder;
pub mod decoder;
pub mod crc;
