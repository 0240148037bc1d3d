//! # Error Types
//!
//! Custom error types for ROV Link using `thiserror`.
//!
//! Frame and command rejections live next to the code that produces them
//! ([`FrameError`](crate::protocol::packet::FrameError),
//! [`CommandConflict`](crate::motor::CommandConflict)); they are dropped
//! locally and never travel through this type.

use thiserror::Error;

use crate::relay::peer::PeerAddress;

/// Main error type for ROV Link
#[derive(Debug, Error)]
pub enum RovLinkError {
    /// Long-range radio could not be brought up at boot
    #[error("Transport initialization failed: {0}")]
    TransportInit(String),

    /// Long-range radio runtime errors
    #[error("Radio error: {0}")]
    Radio(String),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// Short-range relay channel errors (send failures included)
    #[error("Relay error: {0}")]
    Relay(String),

    /// Peer is already registered in the short-range peer table
    #[error("Peer {0} is already registered")]
    DuplicatePeer(PeerAddress),

    /// Peer has no known endpoint or is not registered
    #[error("Unknown peer {0}")]
    UnknownPeer(PeerAddress),

    /// Malformed hardware address text
    #[error("Invalid peer address: {0}")]
    InvalidPeerAddress(String),

    /// GPIO access errors
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// PWM access errors
    #[error("PWM error: {0}")]
    Pwm(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ROV Link
pub type Result<T> = std::result::Result<T, RovLinkError>;
