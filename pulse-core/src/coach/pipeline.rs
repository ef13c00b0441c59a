use std::mem;
use std::sync::Arc;

use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::agent::{AgentConnector, AgentEvent, AgentSession, OutboundMessage};
use super::devices::{CaptureDevice, PlaybackDevice};
use super::pcm::{self, FrameSlicer};
use super::playback::{PlaybackScheduler, UnitId};
use super::{CoachError, CoachListener, CoachResult, ConnectionState};
use crate::config::AudioConfig;

/// Duplex coaching pipeline against one voice agent.
///
/// All audio-session state sits behind a single lock. Each connect starts a new
/// generation; pipeline tasks check their generation under that lock before
/// touching anything, so a disconnect takes effect the moment it returns.
pub struct CoachPipeline {
    shared: Arc<Shared>,
}

struct Shared {
    connector: Arc<dyn AgentConnector>,
    capture: Arc<dyn CaptureDevice>,
    playback: Arc<dyn PlaybackDevice>,
    listener: Arc<dyn CoachListener>,
    audio: AudioConfig,
    state: Mutex<PipelineState>,
    /// Held for the whole of a connect attempt, so attempts never overlap.
    connecting: tokio::sync::Mutex<()>,
}

struct PipelineState {
    connection: ConnectionState,
    generation: u64,
    session: Option<Arc<dyn AgentSession>>,
    scheduler: PlaybackScheduler,
    chunks_sent: u64,
    tasks: Vec<JoinHandle<()>>,
}

impl PipelineState {
    fn is_live(&self, generation: u64) -> bool {
        self.connection == ConnectionState::Open && self.generation == generation
    }
}

impl CoachPipeline {
    pub fn new(
        connector: Arc<dyn AgentConnector>,
        capture: Arc<dyn CaptureDevice>,
        playback: Arc<dyn PlaybackDevice>,
        listener: Arc<dyn CoachListener>,
        audio: AudioConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                connector,
                capture,
                playback,
                listener,
                audio,
                state: Mutex::new(PipelineState {
                    connection: ConnectionState::Idle,
                    generation: 0,
                    session: None,
                    scheduler: PlaybackScheduler::new(0.0),
                    chunks_sent: 0,
                    tasks: Vec::new(),
                }),
                connecting: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Opens the agent session, acquires playback, starts the microphone and
    /// spawns the capture and inbound tasks. Must be called within a Tokio
    /// runtime. A no-op while already open; a call made while another connect
    /// is in flight waits for it and then behaves the same way.
    pub async fn connect(&self) -> CoachResult<()> {
        let shared = &self.shared;
        let _attempt = shared.connecting.lock().await;
        let generation = {
            let mut st = shared.state.lock();
            if st.connection == ConnectionState::Open {
                debug!("Coach pipeline already connected");
                return Ok(());
            }
            st.generation += 1;
            st.connection = ConnectionState::Connecting;
            st.generation
        };
        info!("Connecting coach pipeline (generation {})", generation);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let session = match shared.connector.open(event_tx).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Voice agent session failed to open: {}", e);
                shared.abandon(generation);
                return Err(e);
            }
        };
        if !shared.is_connecting(generation) {
            session.close();
            return Err(cancelled());
        }

        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        if let Err(e) = shared
            .playback
            .acquire(shared.audio.playback_sample_rate, finished_tx)
        {
            warn!("Playback device unavailable: {}", e);
            session.close();
            shared.abandon(generation);
            return Err(e);
        }
        if !shared.is_connecting(generation) {
            shared.playback.release();
            session.close();
            return Err(cancelled());
        }

        let (mic_tx, mic_rx) = mpsc::unbounded_channel();
        if let Err(e) = shared
            .capture
            .start(shared.audio.capture_sample_rate, mic_tx)
        {
            warn!("Microphone capture failed to start: {}", e);
            shared.playback.release();
            session.close();
            shared.abandon(generation);
            return Err(e);
        }

        let mut st = shared.state.lock();
        if st.generation != generation {
            drop(st);
            debug!("Connect superseded by disconnect, releasing devices");
            shared.capture.stop();
            shared.playback.release();
            session.close();
            return Err(cancelled());
        }
        st.connection = ConnectionState::Open;
        st.session = Some(session);
        st.scheduler = PlaybackScheduler::new(shared.playback.now());
        st.chunks_sent = 0;
        st.tasks = vec![
            tokio::spawn(capture_loop(shared.clone(), generation, mic_rx)),
            tokio::spawn(inbound_loop(shared.clone(), generation, event_rx, finished_rx)),
        ];
        info!("Coach pipeline open");
        Ok(())
    }

    /// Stops capture, closes the session, drops all scheduled playback and
    /// releases both devices. Idempotent, and safe before `connect` succeeded.
    pub fn disconnect(&self) {
        self.shared.teardown(None, ConnectionState::Closed, None);
    }

    /// Sends one chunk of 16 kHz mono PCM16 straight to the agent.
    pub fn send_audio_chunk(&self, samples: &[i16]) -> CoachResult<()> {
        self.shared.send_audio(None, pcm::i16_to_le_bytes(samples))
    }

    /// Best-effort camera relay: failures are logged and the frame is dropped.
    pub fn send_image_frame(&self, jpeg: Vec<u8>) {
        let session = {
            let st = self.shared.state.lock();
            if st.connection != ConnectionState::Open {
                trace!("Dropping image frame: pipeline not open");
                return;
            }
            st.session.clone()
        };
        if let Some(session) = session {
            if let Err(e) = session.send(OutboundMessage::Image { jpeg }) {
                warn!("Dropping image frame: {}", e);
            }
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state.lock().connection
    }

    pub fn chunks_sent(&self) -> u64 {
        self.shared.state.lock().chunks_sent
    }

    pub fn is_talking(&self) -> bool {
        self.shared.state.lock().scheduler.is_talking()
    }

    pub fn scheduled_units(&self) -> usize {
        self.shared.state.lock().scheduler.active_len()
    }
}

impl Drop for CoachPipeline {
    fn drop(&mut self) {
        self.shared.teardown(None, ConnectionState::Closed, None);
    }
}

impl Shared {
    fn is_connecting(&self, generation: u64) -> bool {
        let st = self.state.lock();
        st.connection == ConnectionState::Connecting && st.generation == generation
    }

    /// Marks a failed connect attempt, unless a disconnect has already moved on.
    fn abandon(&self, generation: u64) {
        let mut st = self.state.lock();
        if st.generation == generation && st.connection == ConnectionState::Connecting {
            st.connection = ConnectionState::Errored;
        }
    }

    /// Tears the audio session down. With `expected` set, only that generation
    /// is torn down; stale tasks calling in are ignored.
    fn teardown(&self, expected: Option<u64>, final_state: ConnectionState, err: Option<CoachError>) {
        let (session, tasks, was_talking) = {
            let mut st = self.state.lock();
            if expected.is_some_and(|g| g != st.generation) {
                return;
            }
            st.generation += 1;
            match st.connection {
                ConnectionState::Open => {}
                // The attempt sees the new generation and releases what it opened.
                ConnectionState::Connecting => {
                    debug!("Cancelling in-flight connect");
                    st.connection = final_state;
                    return;
                }
                _ => return,
            }
            st.connection = final_state;
            let was_talking = st.scheduler.is_talking();
            for id in st.scheduler.interrupt(self.playback.now()) {
                self.playback.cancel(id);
            }
            (st.session.take(), mem::take(&mut st.tasks), was_talking)
        };

        info!("Coach pipeline torn down ({:?})", final_state);
        self.capture.stop();
        for task in tasks {
            task.abort();
        }
        if let Some(session) = session {
            session.close();
        }
        self.playback.release();

        if was_talking {
            self.listener.on_playback_activity(false);
        }
        if let Some(err) = err {
            self.listener.on_error(&err);
        }
    }

    fn send_audio(&self, generation: Option<u64>, pcm: Vec<u8>) -> CoachResult<()> {
        let (session, current) = {
            let mut st = self.state.lock();
            let live = match generation {
                Some(g) => st.is_live(g),
                None => st.connection == ConnectionState::Open,
            };
            let Some(session) = st.session.clone().filter(|_| live) else {
                return Err(CoachError::Connection("not connected".into()));
            };
            (session, st.generation)
        };

        let message = OutboundMessage::Audio {
            pcm,
            sample_rate: self.audio.capture_sample_rate,
        };
        if let Err(e) = session.send(message) {
            warn!("Outbound audio failed: {}", e);
            self.teardown(Some(current), ConnectionState::Errored, Some(e.clone()));
            return Err(e);
        }
        let mut st = self.state.lock();
        if st.generation == current {
            st.chunks_sent += 1;
        }
        Ok(())
    }

    fn play(&self, generation: u64, bytes: &[u8]) {
        let samples = match pcm::decode_pcm16(bytes) {
            Ok(samples) if !samples.is_empty() => samples,
            Ok(_) => return,
            Err(e) => {
                warn!("Dropping inbound audio chunk: {}", e);
                return;
            }
        };
        let duration = samples.len() as f64 / self.audio.playback_sample_rate as f64;

        let started_talking = {
            let mut st = self.state.lock();
            if !st.is_live(generation) {
                return;
            }
            let (unit, started) = st.scheduler.schedule(self.playback.now(), duration);
            trace!(
                "Scheduled unit {} at {:.3}s for {:.3}s",
                unit.id, unit.start, unit.duration
            );
            self.playback.schedule(&unit, samples.into());
            started
        };
        if started_talking {
            self.listener.on_playback_activity(true);
        }
    }

    fn interrupt(&self, generation: u64) {
        let was_talking = {
            let mut st = self.state.lock();
            if !st.is_live(generation) {
                return;
            }
            let was_talking = st.scheduler.is_talking();
            for id in st.scheduler.interrupt(self.playback.now()) {
                self.playback.cancel(id);
            }
            was_talking
        };
        debug!("Agent interrupted, playback cleared");
        if was_talking {
            self.listener.on_playback_activity(false);
        }
    }

    fn unit_finished(&self, generation: u64, id: UnitId) {
        let stopped_talking = {
            let mut st = self.state.lock();
            if !st.is_live(generation) {
                return;
            }
            st.scheduler.complete(id)
        };
        if stopped_talking {
            self.listener.on_playback_activity(false);
        }
    }
}

fn cancelled() -> CoachError {
    CoachError::Connection("connect cancelled".into())
}

async fn capture_loop(
    shared: Arc<Shared>,
    generation: u64,
    mut mic: mpsc::UnboundedReceiver<Vec<f32>>,
) {
    let mut slicer = FrameSlicer::new(shared.audio.frame_samples);
    while let Some(buffer) = mic.recv().await {
        for frame in slicer.push(&buffer) {
            if shared
                .send_audio(Some(generation), pcm::encode_pcm16(&frame))
                .is_err()
            {
                return;
            }
        }
    }
    debug!("Microphone stream ended");
}

async fn inbound_loop(
    shared: Arc<Shared>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<AgentEvent>,
    mut finished: mpsc::UnboundedReceiver<UnitId>,
) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(AgentEvent::Audio(bytes)) => shared.play(generation, &bytes),
                Some(AgentEvent::Interrupted) => shared.interrupt(generation),
                Some(AgentEvent::Error(message)) => {
                    shared.teardown(
                        Some(generation),
                        ConnectionState::Errored,
                        Some(CoachError::Connection(message)),
                    );
                    return;
                }
                Some(AgentEvent::Closed) | None => {
                    shared.teardown(
                        Some(generation),
                        ConnectionState::Closed,
                        Some(CoachError::Connection("closed by agent".into())),
                    );
                    return;
                }
            },
            Some(id) = finished.recv() => shared.unit_finished(generation, id),
        }
    }
}
