// src/clock.rs - Virtual simulation clock
use serde::{Deserialize, Serialize};

use crate::config::SimulationMode;

/// Simulated day/hour/minute display tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimTime {
    pub day: i64,
    pub hour: u8,
    pub minute: u8,
}

impl SimTime {
    pub fn from_virtual_minute(minute: i64) -> Self {
        let day = minute.div_euclid(24 * 60);
        let rem = minute.rem_euclid(24 * 60);
        Self {
            day,
            hour: (rem / 60) as u8,
            minute: (rem % 60) as u8,
        }
    }

    pub fn to_virtual_minute(&self) -> i64 {
        self.day * 24 * 60 + self.hour as i64 * 60 + self.minute as i64
    }
}

impl std::fmt::Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "day {} {:02}:{:02}", self.day, self.hour, self.minute)
    }
}

/// Clock lifecycle. `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockPhase {
    Idle,
    Running,
    Paused,
    Finished,
}

/// Result of one tick attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The clock advanced to this virtual minute.
    Advanced(i64),
    /// The horizon was reached; the clock is now finished and frozen.
    HorizonReached,
    /// The clock was not running; nothing changed.
    Halted,
}

/// Virtual clock: one simulated minute per tick, bounded by the mode's
/// horizon. `virtual_minute` is single-writer (the tick handler); the
/// display and the scheduler only read it.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    start_minute: i64,
    virtual_minute: i64,
    horizon_minute: Option<i64>,
    phase: ClockPhase,
}

impl VirtualClock {
    pub fn new(start_minute: i64, mode: SimulationMode) -> Self {
        Self {
            start_minute,
            virtual_minute: start_minute,
            horizon_minute: mode.horizon_minutes().map(|h| start_minute + h),
            phase: ClockPhase::Idle,
        }
    }

    /// Select a new simulation start. Resets the current minute and
    /// recomputes the horizon; must run before the first tick of the new
    /// run so the old horizon is never checked against the new start.
    pub fn rearm(&mut self, start_minute: i64, mode: SimulationMode) {
        self.start_minute = start_minute;
        self.virtual_minute = start_minute;
        self.horizon_minute = mode.horizon_minutes().map(|h| start_minute + h);
        self.phase = ClockPhase::Idle;
    }

    pub fn start(&mut self) {
        match self.phase {
            ClockPhase::Idle | ClockPhase::Paused => self.phase = ClockPhase::Running,
            ClockPhase::Running | ClockPhase::Finished => {}
        }
    }

    pub fn pause(&mut self) {
        if self.phase == ClockPhase::Running {
            self.phase = ClockPhase::Paused;
        }
    }

    /// Terminal stop, used by the horizon check and the collapse detector.
    pub fn finish(&mut self) {
        self.phase = ClockPhase::Finished;
    }

    /// Advance by one simulated minute. The horizon is checked before
    /// advancing, and again after, so the clock lands exactly on the
    /// horizon and never overshoots it.
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != ClockPhase::Running {
            return TickOutcome::Halted;
        }
        if let Some(horizon) = self.horizon_minute {
            if self.virtual_minute >= horizon {
                self.finish();
                return TickOutcome::HorizonReached;
            }
        }
        self.virtual_minute += 1;
        if let Some(horizon) = self.horizon_minute {
            if self.virtual_minute >= horizon {
                self.finish();
                return TickOutcome::HorizonReached;
            }
        }
        TickOutcome::Advanced(self.virtual_minute)
    }

    pub fn virtual_minute(&self) -> i64 {
        self.virtual_minute
    }

    pub fn start_minute(&self) -> i64 {
        self.start_minute
    }

    /// Virtual minutes elapsed since the configured start.
    pub fn elapsed_minutes(&self) -> i64 {
        self.virtual_minute - self.start_minute
    }

    pub fn display(&self) -> SimTime {
        SimTime::from_virtual_minute(self.virtual_minute)
    }

    pub fn phase(&self) -> ClockPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == ClockPhase::Running
    }

    pub fn is_finished(&self) -> bool {
        self.phase == ClockPhase::Finished
    }
}
