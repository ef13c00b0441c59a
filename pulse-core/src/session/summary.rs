use serde::{Deserialize, Serialize};

use super::SessionState;
use crate::exercise::Stage;

/// What a finished workout reports to the caller for display or persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    pub success: bool,
    pub reps: u32,
    pub elapsed_seconds: u32,
}

/// Point-in-time view for HUD rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSnapshot {
    pub state: SessionState,
    pub reps: u32,
    pub stage: Stage,
    pub feedback: String,
}

impl WorkoutSnapshot {
    /// Seconds left on the workout clock, if it is running.
    pub fn time_left(&self) -> Option<u32> {
        match self.state {
            SessionState::Active(t) => Some(t),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<SessionResult> {
        match self.state {
            SessionState::Finished(outcome) => Some(outcome.into()),
            _ => None,
        }
    }
}
