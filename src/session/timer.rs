use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    NotStarted,
    Running { started_at: Instant },
    /// Budget exhausted; terminal
    Expired,
    /// Interview ended before the budget ran out; terminal
    Halted { remaining: Duration },
}

/// Outcome of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Timer not running (not started, or already terminal)
    Idle,
    Remaining(Duration),
    /// The budget ran out on this tick. Reported exactly once.
    Expired,
}

/// Countdown over the whole interview (not per question)
#[derive(Debug, Clone)]
pub struct InterviewTimer {
    budget: Duration,
    phase: TimerPhase,
}

impl InterviewTimer {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            phase: TimerPhase::NotStarted,
        }
    }

    /// Start counting; ignored unless the timer has never run
    pub fn start(&mut self, now: Instant) -> bool {
        if self.phase != TimerPhase::NotStarted {
            return false;
        }
        self.phase = TimerPhase::Running { started_at: now };
        true
    }

    pub fn tick(&mut self, now: Instant) -> Tick {
        match self.phase {
            TimerPhase::Running { .. } => {
                let remaining = self.remaining(now);
                if remaining.is_zero() {
                    self.phase = TimerPhase::Expired;
                    Tick::Expired
                } else {
                    Tick::Remaining(remaining)
                }
            }
            _ => Tick::Idle,
        }
    }

    /// Stop a running timer without expiring it
    pub fn halt(&mut self, now: Instant) {
        if let TimerPhase::Running { .. } = self.phase {
            self.phase = TimerPhase::Halted {
                remaining: self.remaining(now),
            };
        }
    }

    /// `budget - elapsed`, clamped to `[0, budget]`
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.phase {
            TimerPhase::NotStarted => self.budget,
            TimerPhase::Running { started_at } => self
                .budget
                .saturating_sub(now.saturating_duration_since(started_at)),
            TimerPhase::Expired => Duration::ZERO,
            TimerPhase::Halted { remaining } => remaining,
        }
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn is_expired(&self) -> bool {
        self.phase == TimerPhase::Expired
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}
