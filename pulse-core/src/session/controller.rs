//! Timer-driven workout state machine.
//!
//! `Setup → Countdown → Active → Finished`, strictly forward. The controller is
//! a plain value; callers serialize access (see [`super::Session`]).

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::SessionError;
use super::summary::SessionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    TimeUp,
    TargetReached,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub reps: u32,
    pub elapsed_seconds: u32,
    pub reason: FinishReason,
}

impl From<Outcome> for SessionResult {
    fn from(o: Outcome) -> Self {
        SessionResult {
            success: o.success,
            reps: o.reps,
            elapsed_seconds: o.elapsed_seconds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Setup,
    /// Ticks left before the workout goes live.
    Countdown(u32),
    /// Seconds left on the clock.
    Active(u32),
    Finished(Outcome),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Setup => "setup",
            SessionState::Countdown(_) => "countdown",
            SessionState::Active(_) => "active",
            SessionState::Finished(_) => "finished",
        }
    }

    /// Position in the forward-only lifecycle.
    pub fn rank(&self) -> u8 {
        match self {
            SessionState::Setup => 0,
            SessionState::Countdown(_) => 1,
            SessionState::Active(_) => 2,
            SessionState::Finished(_) => 3,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, SessionState::Finished(_))
    }
}

#[derive(Debug, Clone)]
pub struct SessionController {
    target_reps: u32,
    target_duration_seconds: u32,
    countdown_ticks: u32,
    state: SessionState,
    reps: u32,
    halted: bool,
}

impl SessionController {
    pub fn new(target_reps: u32, target_duration_seconds: u32, countdown_ticks: u32) -> Self {
        Self {
            target_reps,
            target_duration_seconds,
            countdown_ticks,
            state: SessionState::Setup,
            reps: 0,
            halted: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn reps(&self) -> u32 {
        self.reps
    }

    /// True once `stop()` cancelled the session before it went live.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.state {
            SessionState::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn begin_countdown(&mut self) -> Result<SessionState, SessionError> {
        if self.halted || self.state != SessionState::Setup {
            return Err(SessionError::InvalidTransition {
                from: self.state.name(),
                action: "begin_countdown",
            });
        }
        self.state = if self.countdown_ticks == 0 {
            SessionState::Active(self.target_duration_seconds)
        } else {
            SessionState::Countdown(self.countdown_ticks)
        };
        debug!("Session entered {:?}", self.state);
        Ok(self.state)
    }

    /// Advances the clock by one second. Returns the new state when it changed.
    pub fn tick(&mut self) -> Option<SessionState> {
        if self.halted {
            return None;
        }
        match self.state {
            SessionState::Setup | SessionState::Finished(_) => return None,
            SessionState::Countdown(n) => {
                let n = n.saturating_sub(1);
                self.state = if n == 0 {
                    info!(
                        "Workout live: {}s, target {} reps",
                        self.target_duration_seconds, self.target_reps
                    );
                    SessionState::Active(self.target_duration_seconds)
                } else {
                    SessionState::Countdown(n)
                };
            }
            SessionState::Active(t) => {
                let t = t.saturating_sub(1);
                if t == 0 {
                    let success = self.target_reps == 0 || self.reps >= self.target_reps;
                    self.finish(FinishReason::TimeUp, success, 0);
                } else {
                    self.state = SessionState::Active(t);
                }
            }
        }
        Some(self.state)
    }

    /// Records the classifier's rep count and finishes early once a non-zero
    /// target is met. Returns the new state when it changed.
    pub fn report_reps(&mut self, reps: u32) -> Option<SessionState> {
        let SessionState::Active(time_left) = self.state else {
            return None;
        };
        if self.halted {
            return None;
        }
        self.reps = self.reps.max(reps);
        if self.target_reps > 0 && self.reps >= self.target_reps {
            self.finish(FinishReason::TargetReached, true, time_left);
            return Some(self.state);
        }
        None
    }

    /// Ends the session from any state. Only an active session produces an outcome.
    pub fn stop(&mut self) -> Option<SessionState> {
        match self.state {
            SessionState::Active(time_left) => {
                self.finish(FinishReason::Stopped, false, time_left);
                Some(self.state)
            }
            SessionState::Setup | SessionState::Countdown(_) => {
                if !self.halted {
                    debug!("Session halted during {}", self.state.name());
                }
                self.halted = true;
                None
            }
            SessionState::Finished(_) => None,
        }
    }

    fn finish(&mut self, reason: FinishReason, success: bool, time_left: u32) {
        let outcome = Outcome {
            success,
            reps: self.reps,
            elapsed_seconds: self.target_duration_seconds.saturating_sub(time_left),
            reason,
        };
        info!(
            "Workout finished ({:?}): success={} reps={} elapsed={}s",
            reason, outcome.success, outcome.reps, outcome.elapsed_seconds
        );
        self.state = SessionState::Finished(outcome);
    }
}
