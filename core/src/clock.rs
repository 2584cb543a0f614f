//! Round clock: owns the tick count and the Setup → Running → Finished phase.

use crate::types::Tick;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    Setup,
    Running,
    Finished,
}

impl RoundPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Running => "running",
            Self::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimClock {
    pub current_tick: Tick,
    pub max_ticks: Tick,
    pub phase: RoundPhase,
}

impl SimClock {
    pub fn new(max_ticks: Tick) -> Self {
        Self {
            current_tick: 0,
            max_ticks,
            phase: RoundPhase::Setup,
        }
    }

    pub fn start(&mut self) {
        self.phase = RoundPhase::Running;
    }

    /// Advance one tick. Returns the new tick number and flips to
    /// Finished when the last tick has been played.
    /// Panics if called outside Running; callers must check.
    pub fn advance(&mut self) -> Tick {
        assert_eq!(self.phase, RoundPhase::Running, "advance() called outside Running");
        self.current_tick += 1;
        if self.current_tick >= self.max_ticks {
            self.phase = RoundPhase::Finished;
        }
        self.current_tick
    }

    pub fn finish(&mut self) {
        self.phase = RoundPhase::Finished;
    }

    pub fn is_running(&self) -> bool {
        self.phase == RoundPhase::Running
    }

    pub fn is_finished(&self) -> bool {
        self.phase == RoundPhase::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finishes_on_last_tick() {
        let mut clock = SimClock::new(2);
        assert_eq!(clock.phase, RoundPhase::Setup);
        clock.start();
        assert_eq!(clock.advance(), 1);
        assert!(clock.is_running());
        assert_eq!(clock.advance(), 2);
        assert!(clock.is_finished());
    }

    #[test]
    #[should_panic(expected = "outside Running")]
    fn advance_before_start_panics() {
        SimClock::new(5).advance();
    }
}
