//! # Vehicle Node
//!
//! Receives command frames over the long-range radio and drives the tracks.
//!
//! One cycle:
//! 1. Hand queued relay messages to the handshake
//! 2. Drain received frames: decode, refresh health and failsafe, actuate
//! 3. Advance the link health state machine (may restart the radio)
//! 4. Check the failsafe; while engaged the motors are held stopped

use std::time::Instant;

use tracing::{debug, warn};

use super::RelayPort;
use crate::io::{DigitalOutput, PwmOutput};
use crate::link::{Delay, LinkHealthMonitor, LinkState, LongRangeRadio};
use crate::motor::MotorActuator;
use crate::protocol::decoder::decode;
use crate::protocol::packet::CommandPacket;
use crate::relay::ShortRangeLink;
use crate::safety::FailsafeSupervisor;

/// Upper bound on frames handled in one cycle
const MAX_FRAMES_PER_CYCLE: usize = 8;

/// Outcome of one control cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Frames accepted for actuation
    pub accepted: usize,
    /// Frames dropped (bad length, CRC, or foreign robot id)
    pub dropped: usize,
    pub link_state: LinkState,
    pub failsafe_active: bool,
}

/// Vehicle-side control loop state
pub struct VehicleNode<R, D, P, O, L>
where
    R: LongRangeRadio,
    D: Delay,
    P: PwmOutput,
    O: DigitalOutput,
    L: ShortRangeLink,
{
    robot_id: u8,
    radio: R,
    delay: D,
    health: LinkHealthMonitor,
    failsafe: FailsafeSupervisor,
    motors: MotorActuator<P>,
    relay: Option<RelayPort<O, L>>,
}

impl<R, D, P, O, L> VehicleNode<R, D, P, O, L>
where
    R: LongRangeRadio,
    D: Delay,
    P: PwmOutput,
    O: DigitalOutput,
    L: ShortRangeLink,
{
    /// Assemble a vehicle node around an already started radio
    ///
    /// # Arguments
    ///
    /// * `robot_id` - Id frames must carry to be actuated
    /// * `relay` - Landing relay, if this vehicle forwards landing state
    pub fn new(
        robot_id: u8,
        radio: R,
        delay: D,
        health: LinkHealthMonitor,
        failsafe: FailsafeSupervisor,
        motors: MotorActuator<P>,
        relay: Option<RelayPort<O, L>>,
    ) -> Self {
        Self {
            robot_id,
            radio,
            delay,
            health,
            failsafe,
            motors,
            relay,
        }
    }

    /// Run one control cycle at `now`
    pub fn cycle(&mut self, now: Instant) -> CycleReport {
        if let Some(relay) = self.relay.as_mut() {
            relay.service();
        }

        let mut accepted = 0;
        let mut dropped = 0;

        for _ in 0..MAX_FRAMES_PER_CYCLE {
            let frame = match self.radio.poll_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!("Long-range receive failed: {}", e);
                    break;
                }
            };

            if self.handle_frame(&frame, now) {
                accepted += 1;
            } else {
                dropped += 1;
            }
        }

        let link_state = self.health.poll(now, &mut self.radio, &mut self.delay);

        self.failsafe.check(now);
        if self.failsafe.is_active() {
            if let Err(e) = self.motors.stop() {
                warn!("Failsafe stop incomplete: {}", e);
            }
        }

        CycleReport {
            accepted,
            dropped,
            link_state,
            failsafe_active: self.failsafe.is_active(),
        }
    }

    fn handle_frame(&mut self, frame: &[u8], now: Instant) -> bool {
        match decode(frame, self.robot_id) {
            Ok(packet) => {
                self.health.record_valid_frame(now);
                self.failsafe.reset(now);
                self.apply(&packet);
                true
            }
            Err(e) => {
                if e.is_crc_valid() {
                    self.health.record_valid_frame(now);
                }
                debug!("Dropping frame: {}", e);
                false
            }
        }
    }

    fn apply(&mut self, packet: &CommandPacket) {
        self.motors.handle_speed_toggle(packet.speed_edge);

        if let Err(e) = self.motors.execute(packet.motor_command) {
            warn!("Motor command {} not fully applied: {}", packet.motor_command, e);
        }

        if let Some(relay) = self.relay.as_mut() {
            relay.observe(packet.landing_state);
        }
    }

    /// Leave DISCONNECTED and start monitoring afresh
    pub fn reset_link(&mut self, now: Instant) {
        self.health.reset(now);
    }

    pub fn health(&self) -> &LinkHealthMonitor {
        &self.health
    }

    pub fn failsafe(&self) -> &FailsafeSupervisor {
        &self.failsafe
    }

    pub fn motors(&self) -> &MotorActuator<P> {
        &self.motors
    }

    pub fn relay(&self) -> Option<&RelayPort<O, L>> {
        self.relay.as_ref()
    }

    /// Stop the motors and end the radio session
    pub fn shutdown(&mut self) {
        if let Err(e) = self.motors.stop() {
            warn!("Stop on shutdown incomplete: {}", e);
        }
        self.radio.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::mocks::MockPins;
    use crate::link::radio::mocks::RecordingDelay;
    use crate::link::radio::MockLongRangeRadio;
    use crate::link::HealthSettings;
    use crate::motor::{MotorChannels, SpeedSelector};
    use crate::protocol::encoder::encode;
    use crate::protocol::packet::MotorCommand;
    use crate::relay::transport::mocks::MockLink;
    use crate::relay::{event_channel, EventSender, PeerAddress, RelayHandshake, DEFAULT_ACK_CODE};
    use crate::safety::FailsafeSettings;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const ROBOT_ID: u8 = 69;
    const PEER: PeerAddress = PeerAddress::new([0x1C, 0xDB, 0xD4, 0xD4, 0x0F, 0x80]);
    const STATUS_PIN: u32 = 22;

    type TestNode = VehicleNode<MockLongRangeRadio, RecordingDelay, MockPins, MockPins, MockLink>;

    struct Harness {
        node: TestNode,
        frames: Arc<Mutex<VecDeque<Vec<u8>>>>,
        pins: MockPins,
        link: MockLink,
        events: EventSender,
        start: Instant,
    }

    impl Harness {
        fn at(&self, ms: u64) -> Instant {
            self.start + Duration::from_millis(ms)
        }

        fn push(&self, frame: Vec<u8>) {
            self.frames.lock().unwrap().push_back(frame);
        }

        fn push_command(&self, bits: u8, speed_edge: bool, landing: bool) {
            self.push(encode(ROBOT_ID, MotorCommand::from_bits(bits), speed_edge, landing).to_vec());
        }
    }

    fn harness(radio: MockLongRangeRadio, frames: Arc<Mutex<VecDeque<Vec<u8>>>>) -> Harness {
        let start = Instant::now();
        let pins = MockPins::new();
        let link = MockLink::new();
        let (events, inbox) = event_channel(8);

        let handshake = RelayHandshake::new(PEER, DEFAULT_ACK_CODE, Some((pins.clone(), STATUS_PIN)));
        let relay = RelayPort::new(handshake, link.clone(), inbox).unwrap();

        let motors = MotorActuator::new(
            pins.clone(),
            MotorChannels::from_array([0, 1, 2, 3]),
            SpeedSelector::default(),
        );

        let node = VehicleNode::new(
            ROBOT_ID,
            radio,
            RecordingDelay::default(),
            LinkHealthMonitor::new(HealthSettings::default(), start),
            FailsafeSupervisor::new(FailsafeSettings::default(), start),
            motors,
            Some(relay),
        );

        Harness {
            node,
            frames,
            pins,
            link,
            events,
            start,
        }
    }

    fn frame_radio() -> (MockLongRangeRadio, Arc<Mutex<VecDeque<Vec<u8>>>>) {
        let frames = Arc::new(Mutex::new(VecDeque::new()));
        let queue = Arc::clone(&frames);
        let mut radio = MockLongRangeRadio::new();
        radio
            .expect_poll_frame()
            .returning(move || Ok(queue.lock().unwrap().pop_front()));
        (radio, frames)
    }

    fn setup() -> Harness {
        let (radio, frames) = frame_radio();
        harness(radio, frames)
    }

    #[test]
    fn test_valid_frame_drives_motors() {
        let mut h = setup();
        h.push_command(0b0101, false, false);

        let report = h.node.cycle(h.at(10));

        assert_eq!(report.accepted, 1);
        assert_eq!(report.link_state, LinkState::Ok);
        assert!(!report.failsafe_active);
        assert_eq!(h.node.motors().applied(), Some([255, 0, 255, 0]));
    }

    #[test]
    fn test_corrupted_frame_never_actuates() {
        let mut h = setup();
        let mut frame = encode(ROBOT_ID, MotorCommand::from_bits(0b0101), false, true).to_vec();
        frame[1] ^= 0b1000;
        h.push(frame);

        let report = h.node.cycle(h.at(10));

        assert_eq!(report.dropped, 1);
        assert!(h.pins.duty_writes().is_empty());
        assert!(h.link.sent().is_empty());
    }

    #[test]
    fn test_wrong_length_dropped() {
        let mut h = setup();
        h.push(vec![ROBOT_ID, 0b0101, 0, 0]);

        let report = h.node.cycle(h.at(10));

        assert_eq!(report.dropped, 1);
        assert_eq!(h.node.motors().applied(), None);
    }

    #[test]
    fn test_failsafe_engages_then_clears() {
        let mut h = setup();
        h.push_command(0b1010, false, false);
        h.node.cycle(h.at(10));

        for ms in (20..=300).step_by(10) {
            assert!(!h.node.cycle(h.at(ms)).failsafe_active, "at {} ms", ms);
        }

        let report = h.node.cycle(h.at(320));
        assert!(report.failsafe_active);
        assert_eq!(h.node.motors().applied(), Some([0; 4]));

        h.push_command(0b1010, false, false);
        let report = h.node.cycle(h.at(330));
        assert!(!report.failsafe_active);
        assert_eq!(h.node.motors().applied(), Some([0, 255, 0, 255]));
    }

    #[test]
    fn test_foreign_robot_refreshes_link_only() {
        let mut h = setup();

        for ms in (100..=6000).step_by(100) {
            h.push(encode(ROBOT_ID + 1, MotorCommand::from_bits(0b0101), false, false).to_vec());
            h.node.cycle(h.at(ms));
        }

        assert_eq!(h.node.health().state(), LinkState::Ok);
        assert_eq!(h.node.health().restart_count(), 0);
        assert!(h.node.failsafe().is_active());
        assert!(h.pins.duty_writes().iter().all(|(_, duty)| *duty == 0));
    }

    #[test]
    fn test_conflicting_command_stops() {
        let mut h = setup();
        h.push_command(0b0101, false, false);
        h.node.cycle(h.at(10));

        h.push_command(0b0111, false, false);
        let report = h.node.cycle(h.at(20));

        assert_eq!(report.accepted, 1);
        assert_eq!(h.node.motors().applied(), Some([0; 4]));
    }

    #[test]
    fn test_speed_edge_selects_next_level() {
        let mut h = setup();
        h.push_command(0b0001, true, false);
        h.node.cycle(h.at(10));

        assert_eq!(h.node.motors().speed().duty(), 120);
        assert_eq!(h.pins.duty(0), Some(120));
    }

    #[test]
    fn test_landing_state_relayed_until_ack() {
        let mut h = setup();

        h.push_command(0, false, true);
        h.node.cycle(h.at(10));
        h.push_command(0, false, true);
        h.node.cycle(h.at(20));
        assert_eq!(h.link.sent(), vec![(PEER, vec![1])]);

        h.events.post(PEER, &[DEFAULT_ACK_CODE]);
        h.push_command(0, false, false);
        h.node.cycle(h.at(30));

        assert!(h.node.relay().unwrap().handshake().is_acknowledged());
        assert_eq!(h.link.sent().len(), 1);
        assert_eq!(
            h.pins.output_writes(),
            vec![(STATUS_PIN, true), (STATUS_PIN, false)]
        );
    }

    #[test]
    fn test_unrelated_relay_bytes_ignored() {
        let mut h = setup();
        h.events.post(PEER, &[1]);
        h.node.cycle(h.at(10));

        assert!(!h.node.relay().unwrap().handshake().is_acknowledged());
    }

    #[test]
    fn test_silence_restarts_radio_and_recovers() {
        let (mut radio, frames) = frame_radio();
        radio.expect_end().times(1).return_const(());
        radio.expect_set_reset().times(2).returning(|_| Ok(()));
        radio.expect_begin().times(1).returning(|_| Ok(()));
        let mut h = harness(radio, frames);

        let report = h.node.cycle(h.at(5000));
        assert_eq!(report.link_state, LinkState::Reconnecting);
        assert_eq!(h.node.health().restart_count(), 1);

        h.push_command(0, false, false);
        h.node.cycle(h.at(5100));
        assert_eq!(h.node.health().state(), LinkState::Ok);
    }
}
