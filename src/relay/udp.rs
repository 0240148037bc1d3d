//! # UDP Peer Link
//!
//! Short-range channel carried over UDP datagrams on a local network.
//!
//! Datagram layout:
//!
//! | Bytes | Field |
//! |-------|-------|
//! | 0-5 | sender hardware address |
//! | 6.. | payload (one byte for relay messages) |
//!
//! Peers are addressed by hardware address. Endpoints come from the configured
//! directory and from datagrams received, so a node can answer a sender it
//! was never configured with.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::peer::{PeerAddress, PEER_ADDRESS_LEN};
use super::transport::{EventSender, ShortRangeLink};
use crate::error::{Result, RovLinkError};

/// Largest datagram accepted by the receive task
const MAX_DATAGRAM_SIZE: usize = 64;

/// Pause after a failed receive
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Consecutive receive failures after which the receive task stops
const MAX_RECV_ERRORS: u32 = 50;

/// Tracks consecutive receive failures of the receive task
#[derive(Debug, Default)]
struct RecvBackoff {
    failures: u32,
}

impl RecvBackoff {
    /// Record a failure; `None` once the task should give up
    fn on_error(&mut self) -> Option<Duration> {
        self.failures += 1;
        if self.failures >= MAX_RECV_ERRORS {
            None
        } else {
            Some(RECV_ERROR_BACKOFF)
        }
    }

    fn on_success(&mut self) {
        self.failures = 0;
    }
}

type Directory = Arc<Mutex<HashMap<PeerAddress, SocketAddr>>>;

/// Hardware-addressed datagram link
///
/// Receives go through the tokio socket; sends are issued on a cloned
/// handle of the same socket so they do not depend on reactor readiness.
#[derive(Debug)]
pub struct UdpPeerLink {
    local: PeerAddress,
    socket: Arc<UdpSocket>,
    sender: std::net::UdpSocket,
    directory: Directory,
    peers: HashSet<PeerAddress>,
}

fn lock(directory: &Directory) -> MutexGuard<'_, HashMap<PeerAddress, SocketAddr>> {
    directory.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl UdpPeerLink {
    /// Bind the link socket.
    ///
    /// # Arguments
    ///
    /// * `bind` - Local socket address, e.g. "0.0.0.0:4210"
    /// * `local` - This node's hardware address, stamped on every datagram
    /// * `endpoints` - Known peer endpoints
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound
    pub async fn bind(
        bind: SocketAddr,
        local: PeerAddress,
        endpoints: HashMap<PeerAddress, SocketAddr>,
    ) -> Result<Self> {
        let bind_error =
            |e: std::io::Error| RovLinkError::Relay(format!("Failed to bind {}: {}", bind, e));

        let std_socket = std::net::UdpSocket::bind(bind).map_err(bind_error)?;
        std_socket.set_nonblocking(true).map_err(bind_error)?;
        let sender = std_socket.try_clone().map_err(bind_error)?;
        let socket = UdpSocket::from_std(std_socket).map_err(bind_error)?;

        info!("Short-range link {} on {}", local, socket.local_addr()?);

        Ok(Self {
            local,
            socket: Arc::new(socket),
            sender,
            directory: Arc::new(Mutex::new(endpoints)),
            peers: HashSet::new(),
        })
    }

    pub fn local_address(&self) -> PeerAddress {
        self.local
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Endpoint currently known for `peer`
    pub fn endpoint(&self, peer: &PeerAddress) -> Option<SocketAddr> {
        lock(&self.directory).get(peer).copied()
    }

    /// Spawn the receive task.
    ///
    /// The task records each sender's endpoint and posts the payload to
    /// `events`; everything else happens on the control loop.
    pub fn spawn_receiver(&self, events: EventSender) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let directory = Arc::clone(&self.directory);

        tokio::spawn(async move {
            let mut buf = [0u8; MAX_DATAGRAM_SIZE];
            let mut backoff = RecvBackoff::default();
            loop {
                let (len, from) = match socket.recv_from(&mut buf).await {
                    Ok(received) => {
                        backoff.on_success();
                        received
                    }
                    Err(e) => {
                        warn!("Short-range receive failed: {}", e);
                        match backoff.on_error() {
                            Some(pause) => {
                                tokio::time::sleep(pause).await;
                                continue;
                            }
                            None => {
                                error!(
                                    "Short-range receive failed {} times in a row, stopping",
                                    MAX_RECV_ERRORS
                                );
                                break;
                            }
                        }
                    }
                };

                let Some(sender) = PeerAddress::from_slice(&buf[..len]) else {
                    debug!("Dropping {}-byte datagram from {}", len, from);
                    continue;
                };

                lock(&directory).insert(sender, from);
                events.post(sender, &buf[PEER_ADDRESS_LEN..len]);
            }
        })
    }
}

impl ShortRangeLink for UdpPeerLink {
    fn has_peer(&self, peer: &PeerAddress) -> bool {
        self.peers.contains(peer)
    }

    fn add_peer(&mut self, peer: PeerAddress) -> Result<()> {
        if self.peers.contains(&peer) {
            return Err(RovLinkError::DuplicatePeer(peer));
        }
        if !lock(&self.directory).contains_key(&peer) {
            return Err(RovLinkError::UnknownPeer(peer));
        }
        self.peers.insert(peer);
        Ok(())
    }

    fn send(&mut self, peer: &PeerAddress, payload: &[u8]) -> Result<()> {
        if !self.peers.contains(peer) {
            return Err(RovLinkError::UnknownPeer(*peer));
        }
        let endpoint = self.endpoint(peer).ok_or(RovLinkError::UnknownPeer(*peer))?;

        let mut datagram = Vec::with_capacity(PEER_ADDRESS_LEN + payload.len());
        datagram.extend_from_slice(&self.local.octets());
        datagram.extend_from_slice(payload);

        self.sender
            .send_to(&datagram, endpoint)
            .map_err(|e| RovLinkError::Relay(format!("Send to {} ({}) failed: {}", peer, endpoint, e)))?;
        Ok(())
    }
}
