use chrono::{DateTime, Utc};

use super::{SessionResult, SessionState};

/// Progress notifications published by a running [`super::Session`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),

    RepCounted {
        reps: u32,
        feedback: String,
    },

    Finished {
        result: SessionResult,
        at: DateTime<Utc>,
    },
}
