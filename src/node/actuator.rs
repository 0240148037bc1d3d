//! # Landing Actuator Node
//!
//! Moves the landing servos on relay commands and confirms deployment back
//! to the commanding node.
//!
//! | Byte | Action |
//! |------|--------|
//! | `1` | open servos, acknowledge once per session |
//! | `0` | close servos |
//!
//! Any other byte is ignored.

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::io::PwmOutput;
use crate::relay::transport::add_peer_if_absent;
use crate::relay::{EventInbox, PeerAddress, RelayEvent, ShortRangeLink};

/// Relay command opening the landing gear
pub const COMMAND_OPEN: u8 = 1;

/// Relay command closing the landing gear
pub const COMMAND_CLOSE: u8 = 0;

/// Servo wiring and geometry.
///
/// The servo PWM output is expected to count duty in microseconds of high
/// time, i.e. its maximum duty equals `period_us`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServoSettings {
    pub channels: Vec<u32>,
    pub period_us: u16,
    pub min_pulse_us: u16,
    pub max_pulse_us: u16,
    pub open_angle: u16,
    pub closed_angle: u16,
}

impl Default for ServoSettings {
    fn default() -> Self {
        Self {
            channels: vec![0, 1],
            period_us: 20_000,
            min_pulse_us: 544,
            max_pulse_us: 2400,
            open_angle: 175,
            closed_angle: 5,
        }
    }
}

impl ServoSettings {
    /// Pulse width for `angle` degrees (0..=180)
    pub fn pulse_us(&self, angle: u16) -> u16 {
        let angle = u32::from(angle.min(180));
        let span = u32::from(self.max_pulse_us.saturating_sub(self.min_pulse_us));
        let pulse = u32::from(self.min_pulse_us) + span * angle / 180;
        pulse.min(u32::from(self.period_us)) as u16
    }
}

/// Landing actuator control loop state
pub struct ActuatorNode<P: PwmOutput, L: ShortRangeLink> {
    servos: P,
    settings: ServoSettings,
    link: L,
    inbox: EventInbox,
    ack_code: u8,
    open: bool,
    acknowledged: bool,
}

impl<P: PwmOutput, L: ShortRangeLink> ActuatorNode<P, L> {
    pub fn new(servos: P, settings: ServoSettings, link: L, inbox: EventInbox, ack_code: u8) -> Self {
        Self {
            servos,
            settings,
            link,
            inbox,
            ack_code,
            open: false,
            acknowledged: false,
        }
    }

    /// Drive the servos to the closed position
    pub fn init(&mut self) -> Result<()> {
        self.set_open(false)?;
        info!("Landing servos closed, waiting for relay commands");
        Ok(())
    }

    /// Handle every queued relay command, oldest first
    pub fn cycle(&mut self) {
        for event in self.inbox.drain() {
            self.handle(event);
        }
    }

    fn handle(&mut self, event: RelayEvent) {
        match event.byte {
            COMMAND_OPEN => {
                if let Err(e) = self.set_open(true) {
                    warn!("Failed to open landing servos: {}", e);
                    return;
                }
                info!("Landing gear opened on command from {}", event.sender);
                if !self.acknowledged {
                    self.acknowledge(event.sender);
                }
            }
            COMMAND_CLOSE => match self.set_open(false) {
                Ok(()) => info!("Landing gear closed on command from {}", event.sender),
                Err(e) => warn!("Failed to close landing servos: {}", e),
            },
            other => debug!("Ignoring relay byte 0x{:02X} from {}", other, event.sender),
        }
    }

    fn acknowledge(&mut self, sender: PeerAddress) {
        let sent = add_peer_if_absent(&mut self.link, sender)
            .and_then(|()| self.link.send(&sender, &[self.ack_code]));

        match sent {
            Ok(()) => {
                self.acknowledged = true;
                info!("Deployment acknowledged to {}", sender);
            }
            Err(e) => warn!("Deployment acknowledgment to {} failed: {}", sender, e),
        }
    }

    fn set_open(&mut self, open: bool) -> Result<()> {
        let angle = if open {
            self.settings.open_angle
        } else {
            self.settings.closed_angle
        };
        let pulse = self.settings.pulse_us(angle);

        let mut first_error = None;
        for &channel in &self.settings.channels {
            if let Err(e) = self.servos.write(channel, pulse) {
                first_error.get_or_insert(e);
            }
        }
        self.open = open;

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Whether the deployment acknowledgment went out this session
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::mocks::MockPins;
    use crate::relay::transport::mocks::MockLink;
    use crate::relay::{event_channel, EventSender, DEFAULT_ACK_CODE};

    const VEHICLE: PeerAddress = PeerAddress::new([0x02, 0, 0, 0, 0, 0x01]);

    fn node() -> (ActuatorNode<MockPins, MockLink>, MockPins, MockLink, EventSender) {
        let pins = MockPins::new();
        let link = MockLink::new();
        let (events, inbox) = event_channel(8);
        let mut node = ActuatorNode::new(
            pins.clone(),
            ServoSettings::default(),
            link.clone(),
            inbox,
            DEFAULT_ACK_CODE,
        );
        node.init().unwrap();
        (node, pins, link, events)
    }

    #[test]
    fn test_pulse_width_mapping() {
        let settings = ServoSettings::default();
        assert_eq!(settings.pulse_us(0), 544);
        assert_eq!(settings.pulse_us(90), 1472);
        assert_eq!(settings.pulse_us(180), 2400);
        assert_eq!(settings.pulse_us(250), 2400);
    }

    #[test]
    fn test_init_closes_servos() {
        let (node, pins, _link, _events) = node();
        let closed = ServoSettings::default().pulse_us(5);

        assert!(!node.is_open());
        assert_eq!(pins.duty_writes(), vec![(0, closed), (1, closed)]);
    }

    #[test]
    fn test_open_acknowledges_once() {
        let (mut node, pins, link, events) = node();
        let open = ServoSettings::default().pulse_us(175);

        events.post(VEHICLE, &[COMMAND_OPEN]);
        events.post(VEHICLE, &[COMMAND_CLOSE]);
        events.post(VEHICLE, &[COMMAND_OPEN]);
        node.cycle();

        assert!(node.is_open());
        assert!(node.is_acknowledged());
        assert_eq!(pins.duty(0), Some(open));
        assert_eq!(pins.duty(1), Some(open));
        assert_eq!(link.sent(), vec![(VEHICLE, vec![DEFAULT_ACK_CODE])]);
        assert_eq!(link.add_calls(), 1);
    }

    #[test]
    fn test_close_does_not_acknowledge() {
        let (mut node, _pins, link, events) = node();

        events.post(VEHICLE, &[COMMAND_CLOSE]);
        node.cycle();

        assert!(!node.is_open());
        assert!(link.sent().is_empty());
    }

    #[test]
    fn test_unknown_byte_ignored() {
        let (mut node, pins, link, events) = node();
        pins.clear();

        events.post(VEHICLE, &[7]);
        node.cycle();

        assert!(pins.duty_writes().is_empty());
        assert!(link.sent().is_empty());
    }

    #[test]
    fn test_failed_ack_retried_on_next_open() {
        let (mut node, _pins, link, events) = node();

        link.set_fail_sends(true);
        events.post(VEHICLE, &[COMMAND_OPEN]);
        node.cycle();
        assert!(!node.is_acknowledged());

        link.set_fail_sends(false);
        events.post(VEHICLE, &[COMMAND_OPEN]);
        node.cycle();

        assert!(node.is_acknowledged());
        assert_eq!(link.sent(), vec![(VEHICLE, vec![DEFAULT_ACK_CODE])]);
    }
}
