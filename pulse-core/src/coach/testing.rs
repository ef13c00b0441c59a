//! In-memory devices and agent for pipeline tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::playback::{ScheduledUnit, UnitId};
use super::{
    AgentConnector, AgentEvent, AgentSession, CaptureDevice, CoachError, CoachListener,
    CoachResult, OutboundMessage, PlaybackDevice,
};

#[derive(Default)]
pub struct FakeSession {
    pub sent: Mutex<Vec<OutboundMessage>>,
    pub closed: Mutex<bool>,
    pub fail_images: bool,
    pub fail_audio: bool,
}

impl FakeSession {
    pub fn audio_chunks(&self) -> Vec<Vec<u8>> {
        self.sent
            .lock()
            .iter()
            .filter_map(|m| match m {
                OutboundMessage::Audio { pcm, .. } => Some(pcm.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }
}

impl AgentSession for FakeSession {
    fn send(&self, message: OutboundMessage) -> CoachResult<()> {
        match message {
            OutboundMessage::Image { .. } if self.fail_images => {
                Err(CoachError::Connection("image rejected".into()))
            }
            OutboundMessage::Audio { .. } if self.fail_audio => {
                Err(CoachError::Connection("socket closed".into()))
            }
            message => {
                self.sent.lock().push(message);
                Ok(())
            }
        }
    }

    fn close(&self) {
        *self.closed.lock() = true;
    }
}

#[derive(Default)]
pub struct FakeConnector {
    pub fail: Option<CoachError>,
    /// How long `open` takes.
    pub open_delay: Option<Duration>,
    pub fail_images: bool,
    pub fail_audio: bool,
    pub events: Mutex<Option<mpsc::UnboundedSender<AgentEvent>>>,
    pub sessions: Mutex<Vec<Arc<FakeSession>>>,
}

impl FakeConnector {
    /// Plays the agent side: pushes an inbound event.
    pub fn emit(&self, event: AgentEvent) {
        if let Some(tx) = self.events.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    pub fn last_session(&self) -> Arc<FakeSession> {
        self.sessions.lock().last().cloned().expect("no session opened")
    }
}

#[async_trait]
impl AgentConnector for FakeConnector {
    async fn open(
        &self,
        events: mpsc::UnboundedSender<AgentEvent>,
    ) -> CoachResult<Arc<dyn AgentSession>> {
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.fail {
            return Err(err.clone());
        }
        let session = Arc::new(FakeSession {
            fail_images: self.fail_images,
            fail_audio: self.fail_audio,
            ..Default::default()
        });
        *self.events.lock() = Some(events);
        self.sessions.lock().push(session.clone());
        Ok(session)
    }
}

#[derive(Default)]
pub struct FakeCapture {
    pub deny: bool,
    pub sink: Mutex<Option<mpsc::UnboundedSender<Vec<f32>>>>,
    pub started_at: Mutex<Option<u32>>,
    pub stops: Mutex<u32>,
}

impl FakeCapture {
    pub fn speak(&self, samples: Vec<f32>) {
        if let Some(tx) = self.sink.lock().as_ref() {
            let _ = tx.send(samples);
        }
    }

    pub fn is_running(&self) -> bool {
        self.sink.lock().is_some()
    }
}

impl CaptureDevice for FakeCapture {
    fn start(&self, sample_rate: u32, sink: mpsc::UnboundedSender<Vec<f32>>) -> CoachResult<()> {
        if self.deny {
            return Err(CoachError::PermissionDenied("microphone".into()));
        }
        *self.started_at.lock() = Some(sample_rate);
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    fn stop(&self) {
        *self.stops.lock() += 1;
        self.sink.lock().take();
    }
}

#[derive(Default)]
pub struct FakePlayback {
    pub clock: Mutex<f64>,
    pub rate: Mutex<Option<u32>>,
    pub scheduled: Mutex<Vec<ScheduledUnit>>,
    pub cancelled: Mutex<Vec<UnitId>>,
    pub finished: Mutex<Option<mpsc::UnboundedSender<UnitId>>>,
    pub releases: Mutex<u32>,
}

impl FakePlayback {
    pub fn set_clock(&self, now: f64) {
        *self.clock.lock() = now;
    }

    /// Reports a unit as played out.
    pub fn finish(&self, id: UnitId) {
        if let Some(tx) = self.finished.lock().as_ref() {
            let _ = tx.send(id);
        }
    }

    pub fn starts(&self) -> Vec<f64> {
        self.scheduled.lock().iter().map(|u| u.start).collect()
    }
}

impl PlaybackDevice for FakePlayback {
    fn acquire(
        &self,
        sample_rate: u32,
        finished: mpsc::UnboundedSender<UnitId>,
    ) -> CoachResult<()> {
        *self.rate.lock() = Some(sample_rate);
        *self.finished.lock() = Some(finished);
        Ok(())
    }

    fn now(&self) -> f64 {
        *self.clock.lock()
    }

    fn schedule(&self, unit: &ScheduledUnit, _samples: Arc<[f32]>) {
        self.scheduled.lock().push(*unit);
    }

    fn cancel(&self, id: UnitId) {
        self.cancelled.lock().push(id);
    }

    fn release(&self) {
        *self.releases.lock() += 1;
        self.finished.lock().take();
    }
}

#[derive(Default)]
pub struct RecordingListener {
    pub activity: Mutex<Vec<bool>>,
    pub errors: Mutex<Vec<CoachError>>,
}

impl CoachListener for RecordingListener {
    fn on_playback_activity(&self, talking: bool) {
        self.activity.lock().push(talking);
    }

    fn on_error(&self, err: &CoachError) {
        self.errors.lock().push(err.clone());
    }
}
