//! # Node Module
//!
//! Per-role control cycles wiring the protocol, link, safety, motor and relay
//! pieces together.
//!
//! | Role | Cycle |
//! |------|-------|
//! | vehicle | poll radio, validate, feed health/failsafe, actuate, relay landing state |
//! | operator | sample buttons, encode, transmit, relay landing state |
//! | actuator | drain relay commands, move landing servos, acknowledge deployment |
//!
//! Each cycle takes the current time as an argument and never blocks beyond
//! the bounded radio restart sequence.

pub mod vehicle;
pub mod operator;
pub mod actuator;

pub use actuator::{ActuatorNode, ServoSettings};
pub use operator::{OperatorButtons, OperatorNode};
pub use vehicle::{CycleReport, VehicleNode};

use tokio::runtime::{Handle, RuntimeFlavor};

use crate::error::Result;
use crate::io::DigitalOutput;
use crate::relay::{EventInbox, RelayHandshake, ShortRangeLink};

/// Run a cycle that may block (radio restart, UART I/O) from async code.
///
/// On a multi-threaded runtime the worker is handed off for the duration of
/// `f` so other tasks keep running; elsewhere `f` runs in place.
pub fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Relay handshake bundled with its link and receive queue
#[derive(Debug)]
pub struct RelayPort<O: DigitalOutput, L: ShortRangeLink> {
    handshake: RelayHandshake<O>,
    link: L,
    inbox: EventInbox,
}

impl<O: DigitalOutput, L: ShortRangeLink> RelayPort<O, L> {
    /// Bundle the parts and register the handshake's peer on `link`
    pub fn new(mut handshake: RelayHandshake<O>, mut link: L, inbox: EventInbox) -> Result<Self> {
        handshake.init(&mut link)?;
        Ok(Self {
            handshake,
            link,
            inbox,
        })
    }

    /// Hand queued messages to the handshake, oldest first
    pub fn service(&mut self) {
        for event in self.inbox.drain() {
            self.handshake.on_event(&event);
        }
    }

    /// Feed this cycle's landing state
    pub fn observe(&mut self, landing: bool) -> bool {
        self.handshake.observe(landing, &mut self.link)
    }

    pub fn handshake(&self) -> &RelayHandshake<O> {
        &self.handshake
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_run_blocking_outside_runtime() {
        assert_eq!(run_blocking(|| 7), 7);
    }

    #[tokio::test]
    async fn test_run_blocking_on_current_thread_runtime() {
        assert_eq!(run_blocking(|| "cycle"), "cycle");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_blocking_on_worker_thread() {
        let task = tokio::spawn(async {
            run_blocking(|| {
                std::thread::sleep(Duration::from_millis(20));
                42
            })
        });

        assert_eq!(task.await.unwrap(), 42);
    }
}
