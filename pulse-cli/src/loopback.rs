//! Stand-in coaching devices for the terminal.
//!
//! The microphone hums a quiet tone, the agent answers every few chunks with a
//! short beep, and the speaker only keeps time: each unit is reported finished
//! once the playback clock passes its end.

use std::collections::HashMap;
use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use pulse::coach::{
    AgentConnector, AgentEvent, AgentSession, CaptureDevice, CoachError, CoachListener,
    CoachPipeline, CoachResult, ConnectionState, OutboundMessage, PlaybackDevice, ScheduledUnit,
    UnitId, pcm,
};
use pulse::config::AudioConfig;

const MIC_BUFFER: Duration = Duration::from_millis(100);
const REPLY_SECONDS: f32 = 0.4;

fn tone(sample_rate: u32, seconds: f32, hz: f32, gain: f32) -> Vec<f32> {
    let n = (sample_rate as f32 * seconds) as usize;
    (0..n)
        .map(|i| gain * (TAU * hz * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Agent that replies to every `reply_every`-th audio chunk.
pub struct LoopbackAgent {
    reply_every: u64,
    reply_rate: u32,
}

#[async_trait]
impl AgentConnector for LoopbackAgent {
    async fn open(
        &self,
        events: mpsc::UnboundedSender<AgentEvent>,
    ) -> CoachResult<Arc<dyn AgentSession>> {
        debug!("Loopback agent session opened");
        Ok(Arc::new(LoopbackSession {
            events: Mutex::new(Some(events)),
            received: Mutex::new(0),
            reply_every: self.reply_every,
            reply: pcm::encode_pcm16(&tone(self.reply_rate, REPLY_SECONDS, 660.0, 0.3)),
        }))
    }
}

struct LoopbackSession {
    events: Mutex<Option<mpsc::UnboundedSender<AgentEvent>>>,
    received: Mutex<u64>,
    reply_every: u64,
    reply: Vec<u8>,
}

impl AgentSession for LoopbackSession {
    fn send(&self, message: OutboundMessage) -> CoachResult<()> {
        let events = self.events.lock();
        let Some(events) = events.as_ref() else {
            return Err(CoachError::Connection("loopback closed".into()));
        };
        if let OutboundMessage::Audio { .. } = message {
            let mut received = self.received.lock();
            *received += 1;
            if *received % self.reply_every == 0 {
                trace!("Loopback agent replying to chunk {}", *received);
                let _ = events.send(AgentEvent::Audio(self.reply.clone()));
            }
        }
        Ok(())
    }

    fn close(&self) {
        self.events.lock().take();
    }
}

/// Microphone producing a quiet tone in fixed buffers.
#[derive(Default)]
pub struct LoopbackMic {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CaptureDevice for LoopbackMic {
    fn start(&self, sample_rate: u32, sink: mpsc::UnboundedSender<Vec<f32>>) -> CoachResult<()> {
        let buffer = tone(sample_rate, MIC_BUFFER.as_secs_f32(), 220.0, 0.05);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(MIC_BUFFER);
            loop {
                interval.tick().await;
                if sink.send(buffer.clone()).is_err() {
                    break;
                }
            }
        });
        if let Some(old) = self.task.lock().replace(task) {
            old.abort();
        }
        Ok(())
    }

    fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

/// Speaker with a clock but no output.
pub struct ClockSpeaker {
    origin: Instant,
    finished: Mutex<Option<mpsc::UnboundedSender<UnitId>>>,
    timers: Mutex<HashMap<UnitId, JoinHandle<()>>>,
}

impl Default for ClockSpeaker {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            finished: Mutex::new(None),
            timers: Mutex::new(HashMap::new()),
        }
    }
}

impl PlaybackDevice for ClockSpeaker {
    fn acquire(
        &self,
        _sample_rate: u32,
        finished: mpsc::UnboundedSender<UnitId>,
    ) -> CoachResult<()> {
        *self.finished.lock() = Some(finished);
        Ok(())
    }

    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn schedule(&self, unit: &ScheduledUnit, _samples: Arc<[f32]>) {
        let Some(finished) = self.finished.lock().clone() else {
            return;
        };
        let id = unit.id;
        let end = self.origin + Duration::from_secs_f64(unit.end());
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(end).await;
            let _ = finished.send(id);
        });
        let mut timers = self.timers.lock();
        timers.retain(|_, t| !t.is_finished());
        timers.insert(id, timer);
    }

    fn cancel(&self, id: UnitId) {
        if let Some(timer) = self.timers.lock().remove(&id) {
            timer.abort();
        }
    }

    fn release(&self) {
        for (_, timer) in self.timers.lock().drain() {
            timer.abort();
        }
        self.finished.lock().take();
    }
}

/// Collects pipeline notifications for the HUD event list.
#[derive(Default)]
pub struct CoachLog {
    lines: Mutex<Vec<String>>,
}

impl CoachLog {
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }
}

impl CoachListener for CoachLog {
    fn on_playback_activity(&self, talking: bool) {
        let line = if talking {
            "coach started talking"
        } else {
            "coach stopped talking"
        };
        self.lines.lock().push(line.to_string());
    }

    fn on_error(&self, err: &CoachError) {
        self.lines.lock().push(format!("coach error: {}", err));
    }
}

pub struct Loopback {
    pub pipeline: Arc<CoachPipeline>,
    pub log: Arc<CoachLog>,
}

impl Loopback {
    pub fn new(audio: AudioConfig, reply_every: u64) -> Self {
        let log = Arc::new(CoachLog::default());
        let agent = LoopbackAgent {
            reply_every: reply_every.max(1),
            reply_rate: audio.playback_sample_rate,
        };
        let pipeline = CoachPipeline::new(
            Arc::new(agent),
            Arc::new(LoopbackMic::default()),
            Arc::new(ClockSpeaker::default()),
            log.clone(),
            audio,
        );
        Self {
            pipeline: Arc::new(pipeline),
            log,
        }
    }

    pub fn hud_line(&self) -> String {
        let state = match self.pipeline.connection_state() {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
            ConnectionState::Errored => "errored",
        };
        format!(
            "Coach:    {}{}, {} chunks sent",
            state,
            if self.pipeline.is_talking() { ", talking" } else { "" },
            self.pipeline.chunks_sent()
        )
    }
}
