//! Edge detection for polled discrete inputs.

/// Reports a not-pressed to pressed transition between consecutive polls.
///
/// A level held high reports `true` exactly once.
#[derive(Debug, Clone, Copy, Default)]
pub struct RisingEdge {
    previous: bool,
}

impl RisingEdge {
    pub const fn new() -> Self {
        Self { previous: false }
    }

    /// Feed the current level; returns `true` on a rising edge
    pub fn update(&mut self, level: bool) -> bool {
        let rising = level && !self.previous;
        self.previous = level;
        rising
    }

    pub fn previous(&self) -> bool {
        self.previous
    }
}

/// Boolean latch flipped on each rising edge of its input
#[derive(Debug, Clone, Copy, Default)]
pub struct Toggle {
    edge: RisingEdge,
    state: bool,
}

impl Toggle {
    pub const fn new(initial: bool) -> Self {
        Self {
            edge: RisingEdge::new(),
            state: initial,
        }
    }

    /// Feed the current level; returns the latched state after this poll
    pub fn update(&mut self, level: bool) -> bool {
        if self.edge.update(level) {
            self.state = !self.state;
        }
        self.state
    }

    pub fn state(&self) -> bool {
        self.state
    }
}
