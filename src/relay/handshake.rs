//! # Relay Handshake
//!
//! Forwards landing-state changes to the landing actuator node and stops
//! forwarding once that node confirms deployment.
//!
//! The local status output follows every change whether or not the relay has
//! latched, so operator feedback survives the relay going quiet.

use tracing::{debug, info, warn};

use super::peer::PeerAddress;
use super::transport::{add_peer_if_absent, RelayEvent, ShortRangeLink};
use crate::error::Result;
use crate::io::DigitalOutput;

/// Default deployment-confirmed acknowledgment byte
pub const DEFAULT_ACK_CODE: u8 = 200;

/// Change-triggered landing-state relay with an acknowledgment latch
#[derive(Debug)]
pub struct RelayHandshake<O: DigitalOutput> {
    peer: PeerAddress,
    ack_code: u8,
    status: Option<(O, u32)>,
    previous: bool,
    acknowledged: bool,
}

impl<O: DigitalOutput> RelayHandshake<O> {
    /// Create a relay toward `peer`.
    ///
    /// # Arguments
    ///
    /// * `peer` - Address of the landing actuator node
    /// * `ack_code` - Byte the peer sends once deployment is complete
    /// * `status` - Local output and pin mirroring the landing state
    pub fn new(peer: PeerAddress, ack_code: u8, status: Option<(O, u32)>) -> Self {
        Self {
            peer,
            ack_code,
            status,
            previous: false,
            acknowledged: false,
        }
    }

    /// Register the peer on `link` unless it is already known
    ///
    /// # Errors
    ///
    /// Returns an error if the link refuses the peer (no endpoint known)
    pub fn init<L: ShortRangeLink + ?Sized>(&mut self, link: &mut L) -> Result<()> {
        add_peer_if_absent(link, self.peer)?;
        info!("Relay to {} ready (ack code {})", self.peer, self.ack_code);
        Ok(())
    }

    /// Feed the landing state for this cycle.
    ///
    /// Acts only when the value differs from the last one seen. Returns
    /// `true` if a command byte was handed to the link.
    pub fn observe<L: ShortRangeLink + ?Sized>(&mut self, landing: bool, link: &mut L) -> bool {
        if landing == self.previous {
            return false;
        }
        self.previous = landing;

        if let Some((output, pin)) = self.status.as_mut() {
            if let Err(e) = output.write(*pin, landing) {
                warn!("Failed to mirror landing state on GPIO {}: {}", pin, e);
            }
        }

        if self.acknowledged {
            debug!("Landing state {} not relayed, deployment already confirmed", landing);
            return false;
        }

        match link.send(&self.peer, &[u8::from(landing)]) {
            Ok(()) => {
                debug!("Relayed landing state {} to {}", landing, self.peer);
                true
            }
            Err(e) => {
                warn!("Relay send to {} failed: {}", self.peer, e);
                false
            }
        }
    }

    /// Handle one message drained from the receive queue.
    ///
    /// Returns `true` if this message latched the relay.
    pub fn on_event(&mut self, event: &RelayEvent) -> bool {
        if event.sender != self.peer || event.byte != self.ack_code {
            debug!("Ignoring relay byte 0x{:02X} from {}", event.byte, event.sender);
            return false;
        }

        if self.acknowledged {
            return false;
        }

        self.acknowledged = true;
        info!("Deployment confirmed by {}, relay disabled", self.peer);
        true
    }

    /// Whether the deployment acknowledgment has been received
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    /// Last landing state observed
    pub fn landing_state(&self) -> bool {
        self.previous
    }

    pub fn peer(&self) -> PeerAddress {
        self.peer
    }
}
