//! Workout sessions.
//!
//! [`Workout`] composes the timer state machine with the active classifier and
//! is driven synchronously. [`Session`] wraps a `Workout` in a single owner task
//! so ticks, landmark frames and control calls from different threads are
//! applied one at a time.

mod commands;
mod controller;
mod events;
mod session;
mod summary;
mod workout;

pub use controller::{FinishReason, Outcome, SessionController, SessionState};
pub use events::SessionEvent;
pub use session::Session;
pub use summary::{SessionResult, WorkoutSnapshot};
pub use workout::{FrameUpdate, Workout};

use thiserror::Error;

use crate::coach::CoachError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid workout config: {0}")]
    InvalidConfig(String),

    #[error("cannot {action} while {from}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },

    #[error("session is closed")]
    Closed,

    #[error("coaching error: {0}")]
    Coach(#[from] CoachError),
}
