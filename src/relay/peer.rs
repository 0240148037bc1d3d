//! Fixed 6-byte hardware addresses of short-range peers.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::RovLinkError;

/// Length of a hardware address
pub const PEER_ADDRESS_LEN: usize = 6;

/// Hardware address, written `AA:BB:CC:DD:EE:FF`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct PeerAddress([u8; PEER_ADDRESS_LEN]);

impl PeerAddress {
    pub const fn new(bytes: [u8; PEER_ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn octets(&self) -> [u8; PEER_ADDRESS_LEN] {
        self.0
    }

    /// Read an address from the start of `bytes`
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let octets: [u8; PEER_ADDRESS_LEN] = bytes.get(..PEER_ADDRESS_LEN)?.try_into().ok()?;
        Some(Self(octets))
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}", a, b, c, d, e, g)
    }
}

impl FromStr for PeerAddress {
    type Err = RovLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RovLinkError::InvalidPeerAddress(s.to_string());

        let mut octets = [0u8; PEER_ADDRESS_LEN];
        let mut parts = s.split(':');

        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self(octets))
    }
}

impl TryFrom<String> for PeerAddress {
    type Error = RovLinkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
