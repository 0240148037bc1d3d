//! # Relay Module
//!
//! Landing-gear relay over the secondary short-range channel.
//!
//! This module handles:
//! - Fixed 6-byte peer addressing
//! - The short-range link abstraction and its bounded receive queue
//! - The acknowledgment-latched landing-state handshake
//! - A UDP binding of the short-range channel

pub mod peer;
pub mod transport;
pub mod handshake;
pub mod udp;

pub use handshake::{RelayHandshake, DEFAULT_ACK_CODE};
pub use peer::PeerAddress;
pub use transport::{event_channel, EventInbox, EventSender, RelayEvent, ShortRangeLink};
pub use udp::UdpPeerLink;
