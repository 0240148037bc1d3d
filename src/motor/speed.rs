//! Discrete speed level selection.

use tracing::info;

use crate::io::RisingEdge;

/// Number of selectable speed levels
pub const SPEED_LEVEL_COUNT: usize = 3;

/// Default duty table, full speed first
pub const DEFAULT_SPEED_LEVELS: [u16; SPEED_LEVEL_COUNT] = [255, 120, 90];

/// Cycles through a fixed duty table on rising edges of the toggle input
#[derive(Debug, Clone)]
pub struct SpeedSelector {
    levels: [u16; SPEED_LEVEL_COUNT],
    index: usize,
    edge: RisingEdge,
}

impl Default for SpeedSelector {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED_LEVELS, 0)
    }
}

impl SpeedSelector {
    /// `initial` is wrapped into the table range
    pub fn new(levels: [u16; SPEED_LEVEL_COUNT], initial: usize) -> Self {
        Self {
            levels,
            index: initial % SPEED_LEVEL_COUNT,
            edge: RisingEdge::new(),
        }
    }

    /// Feed the toggle input for this poll; returns `true` if the level advanced
    pub fn update(&mut self, pressed: bool) -> bool {
        if !self.edge.update(pressed) {
            return false;
        }

        let previous = self.levels[self.index];
        self.index = (self.index + 1) % SPEED_LEVEL_COUNT;
        info!("Speed level {} -> {}", previous, self.levels[self.index]);
        true
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Duty for the current level
    pub fn duty(&self) -> u16 {
        self.levels[self.index]
    }
}
