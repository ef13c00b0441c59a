//! Live spoken coaching over a duplex audio/video channel.
//!
//! Microphone audio is framed and streamed to a remote voice agent while the
//! agent's speech is scheduled for gapless playback. When the agent reports
//! that the user talked over it, everything queued for playback is dropped.

mod agent;
mod devices;
pub mod pcm;
mod pipeline;
mod playback;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{AgentConnector, AgentEvent, AgentSession, OutboundMessage};
pub use devices::{CaptureDevice, PlaybackDevice};
pub use pipeline::CoachPipeline;
pub use playback::{PlaybackScheduler, ScheduledUnit, UnitId};

use log::{debug, error};
use thiserror::Error;

pub type CoachResult<T> = Result<T, CoachError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoachError {
    /// Camera or microphone access was refused. Restart the whole flow.
    #[error("capture permission denied: {0}")]
    PermissionDenied(String),

    /// The agent session failed to open or dropped. Never retried internally.
    #[error("voice agent connection error: {0}")]
    Connection(String),

    /// A single inbound chunk could not be decoded; it was dropped.
    #[error("audio decode error: {0}")]
    Decode(String),

    #[error("audio device error: {0}")]
    Device(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
    Errored,
}

/// Receives pipeline notifications. Called from pipeline tasks, never while
/// pipeline state is locked.
pub trait CoachListener: Send + Sync {
    fn on_playback_activity(&self, talking: bool) {
        debug!("Coach talking: {}", talking);
    }

    fn on_error(&self, err: &CoachError) {
        error!("Coach pipeline error: {}", err);
    }
}

/// Listener that only logs.
#[derive(Debug, Default)]
pub struct LogListener;

impl CoachListener for LogListener {}
