//! # Operator Node
//!
//! Samples the operator's buttons and transmits one command frame per cycle.
//!
//! - The four drive buttons map straight onto the motor bitmask
//! - The speed button is sent as a one-cycle rising-edge flag
//! - The landing button flips a latched landing state on each press

use tracing::{debug, info};

use super::RelayPort;
use crate::error::Result;
use crate::io::{DigitalInput, DigitalOutput, RisingEdge, Toggle};
use crate::link::LongRangeRadio;
use crate::protocol::encoder::encode;
use crate::protocol::packet::{MotorCommand, FRAME_SIZE};
use crate::relay::ShortRangeLink;

/// GPIO pins of the operator's controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorButtons {
    pub left_forward: u32,
    pub left_reverse: u32,
    pub right_forward: u32,
    pub right_reverse: u32,
    pub speed: u32,
    pub landing: u32,
}

/// Operator-side control loop state
pub struct OperatorNode<R, I, O, L>
where
    R: LongRangeRadio,
    I: DigitalInput,
    O: DigitalOutput,
    L: ShortRangeLink,
{
    robot_id: u8,
    radio: R,
    inputs: I,
    buttons: OperatorButtons,
    speed_edge: RisingEdge,
    landing: Toggle,
    relay: Option<RelayPort<O, L>>,
}

impl<R, I, O, L> OperatorNode<R, I, O, L>
where
    R: LongRangeRadio,
    I: DigitalInput,
    O: DigitalOutput,
    L: ShortRangeLink,
{
    pub fn new(
        robot_id: u8,
        radio: R,
        inputs: I,
        buttons: OperatorButtons,
        relay: Option<RelayPort<O, L>>,
    ) -> Self {
        Self {
            robot_id,
            radio,
            inputs,
            buttons,
            speed_edge: RisingEdge::new(),
            landing: Toggle::new(false),
            relay,
        }
    }

    /// Sample the controls, then encode and transmit one frame.
    ///
    /// # Returns
    ///
    /// The frame handed to the radio
    ///
    /// # Errors
    ///
    /// Returns an error if a button cannot be read or the radio rejects the frame
    pub fn cycle(&mut self) -> Result<[u8; FRAME_SIZE]> {
        if let Some(relay) = self.relay.as_mut() {
            relay.service();
        }

        let b = self.buttons;
        let command = MotorCommand::from_flags(
            self.inputs.read(b.left_forward)?,
            self.inputs.read(b.left_reverse)?,
            self.inputs.read(b.right_forward)?,
            self.inputs.read(b.right_reverse)?,
        );
        let speed_edge = self.speed_edge.update(self.inputs.read(b.speed)?);

        let was_landing = self.landing.state();
        let landing = self.landing.update(self.inputs.read(b.landing)?);
        if landing != was_landing {
            info!("Landing state -> {}", landing);
        }

        if let Some(relay) = self.relay.as_mut() {
            relay.observe(landing);
        }

        let frame = encode(self.robot_id, command, speed_edge, landing);
        self.radio.transmit(&frame)?;

        if speed_edge {
            debug!("Speed toggle sent");
        }

        Ok(frame)
    }

    pub fn landing_state(&self) -> bool {
        self.landing.state()
    }

    pub fn relay(&self) -> Option<&RelayPort<O, L>> {
        self.relay.as_ref()
    }

    pub fn shutdown(&mut self) {
        self.radio.end();
    }
}
