//! The remote voice agent, seen through an abstract streaming session.
//!
//! The wire format (websocket frames, base64 payloads and so on) belongs to the
//! connector implementation. The pipeline only deals in raw PCM and JPEG bytes.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::CoachResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// PCM16 LE mono microphone audio.
    Audio { pcm: Vec<u8>, sample_rate: u32 },
    /// A JPEG camera frame for the agent to look at.
    Image { jpeg: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// PCM16 LE mono speech at the playback rate.
    Audio(Vec<u8>),
    /// The agent heard the user talk over it; stop playback now.
    Interrupted,
    Closed,
    Error(String),
}

/// An open agent session. `send` must not block: implementations queue
/// onto their own writer.
pub trait AgentSession: Send + Sync {
    fn send(&self, message: OutboundMessage) -> CoachResult<()>;
    fn close(&self);
}

#[async_trait]
pub trait AgentConnector: Send + Sync {
    /// Opens a session whose inbound traffic is delivered on `events`.
    /// Dropping the sender counts as the session closing.
    async fn open(
        &self,
        events: mpsc::UnboundedSender<AgentEvent>,
    ) -> CoachResult<Arc<dyn AgentSession>>;
}
