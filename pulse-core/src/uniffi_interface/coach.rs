//! Live coaching with the agent transport and audio hardware supplied by the host.
//!
//! The host implements the `Host*` traits. Everything the host receives
//! (microphone buffers, agent traffic, playback completions) is pushed back in
//! through [`CoachSession`] methods, which never block.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, trace};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::coach::{
    AgentConnector, AgentEvent, AgentSession, CaptureDevice, CoachError, CoachListener,
    CoachPipeline, CoachResult, ConnectionState, OutboundMessage, PlaybackDevice, ScheduledUnit,
    UnitId,
};
use crate::config::{AudioConfig, EngineConfig};
use crate::runtime::init_global_runtime_blocking;
use crate::uniffi_interface::errors::PulseError;

/// The host's connection to the remote voice agent.
#[uniffi::export(with_foreign)]
pub trait HostAgent: Send + Sync {
    /// Opens the agent session. Inbound traffic goes to the `agent_*` methods.
    fn open(&self) -> Result<(), PulseError>;
    /// PCM16 LE mono microphone audio.
    fn send_audio(&self, pcm: Vec<u8>, sample_rate: u32) -> Result<(), PulseError>;
    fn send_image(&self, jpeg: Vec<u8>) -> Result<(), PulseError>;
    fn close(&self);
}

#[uniffi::export(with_foreign)]
pub trait HostCapture: Send + Sync {
    /// Starts the microphone. Buffers go to [`CoachSession::push_microphone`].
    fn start(&self, sample_rate: u32) -> Result<(), PulseError>;
    fn stop(&self);
}

#[uniffi::export(with_foreign)]
pub trait HostPlayback: Send + Sync {
    /// Completions go to [`CoachSession::unit_finished`].
    fn acquire(&self, sample_rate: u32) -> Result<(), PulseError>;
    /// Playback clock, in seconds.
    fn now(&self) -> f64;
    fn schedule(&self, id: u64, start: f64, samples: Vec<f32>);
    fn cancel(&self, id: u64);
    fn release(&self);
}

#[uniffi::export(with_foreign)]
pub trait HostCoachListener: Send + Sync {
    fn on_playback_activity(&self, talking: bool);
    fn on_error(&self, message: String);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum CoachConnection {
    Idle,
    Connecting,
    Open,
    Closed,
    Errored,
}

impl From<ConnectionState> for CoachConnection {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Idle => CoachConnection::Idle,
            ConnectionState::Connecting => CoachConnection::Connecting,
            ConnectionState::Open => CoachConnection::Open,
            ConnectionState::Closed => CoachConnection::Closed,
            ConnectionState::Errored => CoachConnection::Errored,
        }
    }
}

/// Where host pushes are routed while the matching device is open.
#[derive(Default)]
struct Inbox {
    agent: Mutex<Option<mpsc::UnboundedSender<AgentEvent>>>,
    microphone: Mutex<Option<mpsc::UnboundedSender<Vec<f32>>>>,
    finished: Mutex<Option<mpsc::UnboundedSender<UnitId>>>,
}

fn deliver<T>(slot: &Mutex<Option<mpsc::UnboundedSender<T>>>, value: T, what: &str) {
    match slot.lock().as_ref() {
        Some(tx) => {
            let _ = tx.send(value);
        }
        None => trace!("Dropping {}: not open", what),
    }
}

struct AgentBridge {
    host: Arc<dyn HostAgent>,
    inbox: Arc<Inbox>,
}

#[async_trait]
impl AgentConnector for AgentBridge {
    async fn open(
        &self,
        events: mpsc::UnboundedSender<AgentEvent>,
    ) -> CoachResult<Arc<dyn AgentSession>> {
        *self.inbox.agent.lock() = Some(events);
        let host = self.host.clone();
        let opened = tokio::task::spawn_blocking(move || host.open())
            .await
            .map_err(|e| CoachError::Connection(e.to_string()))?;
        if let Err(e) = opened {
            self.inbox.agent.lock().take();
            return Err(e.into());
        }
        Ok(Arc::new(HostSession {
            host: self.host.clone(),
            inbox: self.inbox.clone(),
        }))
    }
}

struct HostSession {
    host: Arc<dyn HostAgent>,
    inbox: Arc<Inbox>,
}

impl AgentSession for HostSession {
    fn send(&self, message: OutboundMessage) -> CoachResult<()> {
        let sent = match message {
            OutboundMessage::Audio { pcm, sample_rate } => self.host.send_audio(pcm, sample_rate),
            OutboundMessage::Image { jpeg } => self.host.send_image(jpeg),
        };
        sent.map_err(CoachError::from)
    }

    fn close(&self) {
        self.inbox.agent.lock().take();
        self.host.close();
    }
}

struct CaptureBridge {
    host: Arc<dyn HostCapture>,
    inbox: Arc<Inbox>,
}

impl CaptureDevice for CaptureBridge {
    fn start(&self, sample_rate: u32, sink: mpsc::UnboundedSender<Vec<f32>>) -> CoachResult<()> {
        *self.inbox.microphone.lock() = Some(sink);
        self.host.start(sample_rate).map_err(|e| {
            self.inbox.microphone.lock().take();
            CoachError::from(e)
        })
    }

    fn stop(&self) {
        self.host.stop();
        self.inbox.microphone.lock().take();
    }
}

struct PlaybackBridge {
    host: Arc<dyn HostPlayback>,
    inbox: Arc<Inbox>,
}

impl PlaybackDevice for PlaybackBridge {
    fn acquire(
        &self,
        sample_rate: u32,
        finished: mpsc::UnboundedSender<UnitId>,
    ) -> CoachResult<()> {
        *self.inbox.finished.lock() = Some(finished);
        self.host.acquire(sample_rate).map_err(|e| {
            self.inbox.finished.lock().take();
            CoachError::from(e)
        })
    }

    fn now(&self) -> f64 {
        self.host.now()
    }

    fn schedule(&self, unit: &ScheduledUnit, samples: Arc<[f32]>) {
        self.host.schedule(unit.id, unit.start, samples.to_vec());
    }

    fn cancel(&self, id: UnitId) {
        self.host.cancel(id);
    }

    fn release(&self) {
        self.host.release();
        self.inbox.finished.lock().take();
    }
}

struct ListenerBridge(Arc<dyn HostCoachListener>);

impl CoachListener for ListenerBridge {
    fn on_playback_activity(&self, talking: bool) {
        self.0.on_playback_activity(talking);
    }

    fn on_error(&self, err: &CoachError) {
        self.0.on_error(err.to_string());
    }
}

/// A coaching pipeline over host devices. Pass it to
/// `WorkoutSession::start_coached` to tie it to a workout.
#[derive(uniffi::Object)]
pub struct CoachSession {
    pub(crate) pipeline: Arc<CoachPipeline>,
    inbox: Arc<Inbox>,
}

#[uniffi::export]
impl CoachSession {
    #[uniffi::constructor]
    pub fn new(
        agent: Arc<dyn HostAgent>,
        capture: Arc<dyn HostCapture>,
        playback: Arc<dyn HostPlayback>,
        listener: Arc<dyn HostCoachListener>,
    ) -> Result<Arc<Self>, PulseError> {
        let engine = EngineConfig::from_env()?;
        Ok(Arc::new(Self::assemble(
            agent,
            capture,
            playback,
            listener,
            engine.audio,
        )))
    }

    /// Connects on the global runtime. Not needed before
    /// `WorkoutSession::start_coached`, which connects itself.
    pub fn connect(&self) -> Result<(), PulseError> {
        let rt = init_global_runtime_blocking();
        rt.block_on(self.pipeline.connect())?;
        Ok(())
    }

    pub fn disconnect(&self) {
        debug!("Disconnecting coach from host");
        self.pipeline.disconnect();
    }

    /// Best effort: dropped when not connected or when the send fails.
    pub fn send_image_frame(&self, jpeg: Vec<u8>) {
        self.pipeline.send_image_frame(jpeg);
    }

    /// Normalized mono samples at the capture rate, any length.
    pub fn push_microphone(&self, samples: Vec<f32>) {
        deliver(&self.inbox.microphone, samples, "microphone buffer");
    }

    pub fn unit_finished(&self, id: u64) {
        deliver(&self.inbox.finished, id, "playback completion");
    }

    /// PCM16 LE mono speech at the playback rate.
    pub fn agent_audio(&self, pcm: Vec<u8>) {
        deliver(&self.inbox.agent, AgentEvent::Audio(pcm), "agent audio");
    }

    pub fn agent_interrupted(&self) {
        deliver(&self.inbox.agent, AgentEvent::Interrupted, "agent interruption");
    }

    pub fn agent_closed(&self) {
        deliver(&self.inbox.agent, AgentEvent::Closed, "agent close");
    }

    pub fn agent_error(&self, message: String) {
        deliver(&self.inbox.agent, AgentEvent::Error(message), "agent error");
    }

    pub fn is_talking(&self) -> bool {
        self.pipeline.is_talking()
    }

    pub fn connection(&self) -> CoachConnection {
        self.pipeline.connection_state().into()
    }

    pub fn chunks_sent(&self) -> u64 {
        self.pipeline.chunks_sent()
    }
}

impl CoachSession {
    fn assemble(
        agent: Arc<dyn HostAgent>,
        capture: Arc<dyn HostCapture>,
        playback: Arc<dyn HostPlayback>,
        listener: Arc<dyn HostCoachListener>,
        audio: AudioConfig,
    ) -> Self {
        let inbox = Arc::new(Inbox::default());
        let pipeline = CoachPipeline::new(
            Arc::new(AgentBridge {
                host: agent,
                inbox: inbox.clone(),
            }),
            Arc::new(CaptureBridge {
                host: capture,
                inbox: inbox.clone(),
            }),
            Arc::new(PlaybackBridge {
                host: playback,
                inbox: inbox.clone(),
            }),
            Arc::new(ListenerBridge(listener)),
            audio,
        );
        Self {
            pipeline: Arc::new(pipeline),
            inbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coach::pcm;
    use std::time::Duration;
    use tokio::time::sleep;

    #[derive(Default)]
    struct Host {
        deny_microphone: bool,
        opened: Mutex<u32>,
        closed: Mutex<u32>,
        audio: Mutex<Vec<(usize, u32)>>,
        mic_rate: Mutex<Option<u32>>,
        speaker_rate: Mutex<Option<u32>>,
        scheduled: Mutex<Vec<(u64, f64, usize)>>,
        cancelled: Mutex<Vec<u64>>,
        releases: Mutex<u32>,
        talking: Mutex<Vec<bool>>,
        errors: Mutex<Vec<String>>,
    }

    impl HostAgent for Host {
        fn open(&self) -> Result<(), PulseError> {
            *self.opened.lock() += 1;
            Ok(())
        }

        fn send_audio(&self, pcm: Vec<u8>, sample_rate: u32) -> Result<(), PulseError> {
            self.audio.lock().push((pcm.len(), sample_rate));
            Ok(())
        }

        fn send_image(&self, _jpeg: Vec<u8>) -> Result<(), PulseError> {
            Err(PulseError::Connection("images not supported".into()))
        }

        fn close(&self) {
            *self.closed.lock() += 1;
        }
    }

    impl HostCapture for Host {
        fn start(&self, sample_rate: u32) -> Result<(), PulseError> {
            if self.deny_microphone {
                return Err(PulseError::PermissionDenied("microphone".into()));
            }
            *self.mic_rate.lock() = Some(sample_rate);
            Ok(())
        }

        fn stop(&self) {
            self.mic_rate.lock().take();
        }
    }

    impl HostPlayback for Host {
        fn acquire(&self, sample_rate: u32) -> Result<(), PulseError> {
            *self.speaker_rate.lock() = Some(sample_rate);
            Ok(())
        }

        fn now(&self) -> f64 {
            0.0
        }

        fn schedule(&self, id: u64, start: f64, samples: Vec<f32>) {
            self.scheduled.lock().push((id, start, samples.len()));
        }

        fn cancel(&self, id: u64) {
            self.cancelled.lock().push(id);
        }

        fn release(&self) {
            *self.releases.lock() += 1;
        }
    }

    impl HostCoachListener for Host {
        fn on_playback_activity(&self, talking: bool) {
            self.talking.lock().push(talking);
        }

        fn on_error(&self, message: String) {
            self.errors.lock().push(message);
        }
    }

    fn coach(host: &Arc<Host>) -> CoachSession {
        CoachSession::assemble(
            host.clone(),
            host.clone(),
            host.clone(),
            host.clone(),
            AudioConfig::default(),
        )
    }

    async fn settle() {
        sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn host_devices_carry_a_full_exchange() {
        let host = Arc::new(Host::default());
        let coach = coach(&host);
        coach.push_microphone(vec![0.1; 4096]);
        coach.pipeline.connect().await.unwrap();
        assert_eq!(coach.connection(), CoachConnection::Open);
        assert_eq!(*host.opened.lock(), 1);
        assert_eq!(*host.mic_rate.lock(), Some(16_000));
        assert_eq!(*host.speaker_rate.lock(), Some(24_000));

        coach.push_microphone(vec![0.1; 4096]);
        settle().await;
        assert_eq!(*host.audio.lock(), vec![(8192, 16_000)]);
        assert_eq!(coach.chunks_sent(), 1);

        coach.agent_audio(pcm::encode_pcm16(&vec![0.25; 2400]));
        settle().await;
        assert_eq!(*host.scheduled.lock(), vec![(1, 0.0, 2400)]);
        assert!(coach.is_talking());

        coach.unit_finished(1);
        settle().await;
        assert!(!coach.is_talking());
        assert_eq!(*host.talking.lock(), vec![true, false]);

        // Rejected images are dropped without touching the connection.
        coach.send_image_frame(vec![0xff, 0xd8]);
        assert_eq!(coach.connection(), CoachConnection::Open);

        coach.disconnect();
        assert_eq!(coach.connection(), CoachConnection::Closed);
        assert_eq!(*host.closed.lock(), 1);
        assert_eq!(*host.releases.lock(), 1);
        assert!(host.mic_rate.lock().is_none());

        // Pushes after disconnect go nowhere.
        coach.push_microphone(vec![0.1; 4096]);
        coach.agent_audio(pcm::encode_pcm16(&vec![0.25; 2400]));
        settle().await;
        assert_eq!(host.audio.lock().len(), 1);
        assert_eq!(host.scheduled.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn agent_reports_reach_the_host_listener() {
        let host = Arc::new(Host::default());
        let coach = coach(&host);
        coach.pipeline.connect().await.unwrap();

        coach.agent_audio(pcm::encode_pcm16(&vec![0.25; 2400]));
        coach.agent_audio(pcm::encode_pcm16(&vec![0.25; 2400]));
        coach.agent_interrupted();
        settle().await;
        assert_eq!(*host.cancelled.lock(), vec![1, 2]);
        assert!(!coach.is_talking());

        coach.agent_error("quota exceeded".into());
        settle().await;
        assert_eq!(coach.connection(), CoachConnection::Errored);
        assert_eq!(
            *host.errors.lock(),
            vec!["voice agent connection error: quota exceeded".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn host_permission_errors_keep_their_kind() {
        let host = Arc::new(Host {
            deny_microphone: true,
            ..Default::default()
        });
        let coach = coach(&host);
        let err = coach.pipeline.connect().await.unwrap_err();
        assert_eq!(err, CoachError::PermissionDenied("microphone".into()));
        assert_eq!(coach.connection(), CoachConnection::Errored);
        assert_eq!(*host.closed.lock(), 1);
        assert_eq!(*host.releases.lock(), 1);
    }
}
