//! # Hardware I/O Module
//!
//! Discrete GPIO and PWM primitives consumed by the nodes.
//!
//! This module handles:
//! - `read(pin)` / `write(pin, level)` / `write(channel, duty)` abstractions
//! - Rising-edge detection and edge-toggled latches for operator controls
//! - Linux sysfs bindings for GPIO and PWM

pub mod edge;
pub mod sysfs;

pub use edge::{RisingEdge, Toggle};

use crate::error::Result;

/// Discrete input read, e.g. an operator button
pub trait DigitalInput {
    /// Read the logical level of `pin` (`true` = asserted/pressed)
    fn read(&mut self, pin: u32) -> Result<bool>;
}

/// Discrete output write, e.g. a status LED or a reset line
pub trait DigitalOutput {
    /// Drive `pin` high (`true`) or low (`false`)
    fn write(&mut self, pin: u32, high: bool) -> Result<()>;
}

/// PWM duty write
pub trait PwmOutput {
    /// Set `channel` to `duty`, in units of the output's configured maximum
    fn write(&mut self, channel: u32, duty: u16) -> Result<()>;
}

impl<T: DigitalInput + ?Sized> DigitalInput for Box<T> {
    fn read(&mut self, pin: u32) -> Result<bool> {
        (**self).read(pin)
    }
}

impl<T: DigitalOutput + ?Sized> DigitalOutput for Box<T> {
    fn write(&mut self, pin: u32, high: bool) -> Result<()> {
        (**self).write(pin, high)
    }
}

impl<T: PwmOutput + ?Sized> PwmOutput for Box<T> {
    fn write(&mut self, channel: u32, duty: u16) -> Result<()> {
        (**self).write(channel, duty)
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Recording GPIO/PWM double shared between a node and its test
    #[derive(Clone, Default)]
    pub struct MockPins {
        pub inputs: Arc<Mutex<HashMap<u32, bool>>>,
        pub outputs: Arc<Mutex<Vec<(u32, bool)>>>,
        pub duties: Arc<Mutex<Vec<(u32, u16)>>>,
    }

    impl MockPins {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_input(&self, pin: u32, level: bool) {
            self.inputs.lock().unwrap().insert(pin, level);
        }

        pub fn output_writes(&self) -> Vec<(u32, bool)> {
            self.outputs.lock().unwrap().clone()
        }

        pub fn duty_writes(&self) -> Vec<(u32, u16)> {
            self.duties.lock().unwrap().clone()
        }

        /// Latest duty written per channel
        pub fn duty(&self, channel: u32) -> Option<u16> {
            self.duties
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(ch, _)| *ch == channel)
                .map(|(_, duty)| *duty)
        }

        pub fn clear(&self) {
            self.outputs.lock().unwrap().clear();
            self.duties.lock().unwrap().clear();
        }
    }

    impl DigitalInput for MockPins {
        fn read(&mut self, pin: u32) -> Result<bool> {
            Ok(*self.inputs.lock().unwrap().get(&pin).unwrap_or(&false))
        }
    }

    impl DigitalOutput for MockPins {
        fn write(&mut self, pin: u32, high: bool) -> Result<()> {
            self.outputs.lock().unwrap().push((pin, high));
            Ok(())
        }
    }

    impl PwmOutput for MockPins {
        fn write(&mut self, channel: u32, duty: u16) -> Result<()> {
            self.duties.lock().unwrap().push((channel, duty));
            Ok(())
        }
    }
}
