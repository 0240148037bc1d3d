//! # Short-Range Transport
//!
//! Fire-and-forget 1-byte messages to fixed peers.
//!
//! The receive path runs outside the control loop (a driver callback or a
//! socket task). It only records who sent what and posts a [`RelayEvent`]
//! into a bounded queue; the loop drains the queue in FIFO order each cycle.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::peer::PeerAddress;
use crate::error::Result;

/// Secondary channel with a peer table
pub trait ShortRangeLink {
    fn has_peer(&self, peer: &PeerAddress) -> bool;

    /// Register `peer`; registering twice is an error
    fn add_peer(&mut self, peer: PeerAddress) -> Result<()>;

    /// Send `payload` once; no retransmission
    fn send(&mut self, peer: &PeerAddress, payload: &[u8]) -> Result<()>;
}

impl<T: ShortRangeLink + ?Sized> ShortRangeLink for Box<T> {
    fn has_peer(&self, peer: &PeerAddress) -> bool {
        (**self).has_peer(peer)
    }

    fn add_peer(&mut self, peer: PeerAddress) -> Result<()> {
        (**self).add_peer(peer)
    }

    fn send(&mut self, peer: &PeerAddress, payload: &[u8]) -> Result<()> {
        (**self).send(peer, payload)
    }
}

/// Register `peer` unless the table already holds it
pub fn add_peer_if_absent<L: ShortRangeLink + ?Sized>(link: &mut L, peer: PeerAddress) -> Result<()> {
    if link.has_peer(&peer) {
        return Ok(());
    }
    link.add_peer(peer)?;
    debug!("Registered short-range peer {}", peer);
    Ok(())
}

/// One received 1-byte message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayEvent {
    pub sender: PeerAddress,
    pub byte: u8,
}

/// Receive-side handle; safe to use from a callback or another task
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<RelayEvent>,
}

impl EventSender {
    /// Queue a raw message. Anything but a single byte is discarded, as is
    /// any message arriving while the queue is full.
    pub fn post(&self, sender: PeerAddress, payload: &[u8]) -> bool {
        let [byte] = payload else {
            warn!("Ignoring {}-byte relay message from {}", payload.len(), sender);
            return false;
        };

        match self.tx.try_send(RelayEvent { sender, byte: *byte }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!("Relay queue full, dropped 0x{:02X} from {}", event.byte, event.sender);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Loop-side handle
#[derive(Debug)]
pub struct EventInbox {
    rx: mpsc::Receiver<RelayEvent>,
}

impl EventInbox {
    /// Take every queued event without waiting
    pub fn drain(&mut self) -> Vec<RelayEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Create a bounded event queue holding up to `depth` messages
pub fn event_channel(depth: usize) -> (EventSender, EventInbox) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (EventSender { tx }, EventInbox { rx })
}
