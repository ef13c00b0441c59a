use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, info};
use tokio::sync::{broadcast, mpsc, oneshot};

use super::commands::{Actor, Command, spawn_ticker};
use super::summary::{SessionResult, WorkoutSnapshot};
use super::{SessionError, SessionEvent, Workout};
use crate::coach::CoachPipeline;
use crate::config::{EngineConfig, WorkoutConfig};
use crate::geometry::LandmarkSet;

const TICK_PERIOD: Duration = Duration::from_secs(1);
const EVENT_CAPACITY: usize = 64;

/// Handle to a running workout.
///
/// The workout itself lives in a single task; this handle only enqueues work,
/// so it is cheap to call from camera or UI callbacks. Dropping every clone of
/// the handle shuts the task down.
#[derive(Clone)]
pub struct Session {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<SessionEvent>,
    stopping: Arc<AtomicBool>,
}

impl Session {
    /// Validates `config`, starts the countdown and spawns the owner task and
    /// its 1 Hz ticker. Must be called from within a Tokio runtime.
    pub fn start(config: WorkoutConfig, engine: &EngineConfig) -> Result<Self, SessionError> {
        let workout = Workout::new(config, engine)?;
        Self::launch(config, workout, None)
    }

    /// Like [`Session::start`], but connects `coach` first and keeps it for the
    /// life of the session. Stopping the session, or dropping every handle,
    /// disconnects it. A coach that fails to connect fails the start.
    pub async fn start_coached(
        config: WorkoutConfig,
        engine: &EngineConfig,
        coach: Arc<CoachPipeline>,
    ) -> Result<Self, SessionError> {
        let workout = Workout::new(config, engine)?;
        coach.connect().await?;
        Self::launch(config, workout, Some(coach.clone())).inspect_err(|_| coach.disconnect())
    }

    fn launch(
        config: WorkoutConfig,
        mut workout: Workout,
        coach: Option<Arc<CoachPipeline>>,
    ) -> Result<Self, SessionError> {
        workout.start()?;

        let (commands, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let stopping = Arc::new(AtomicBool::new(false));

        let ticker = spawn_ticker(commands.downgrade(), TICK_PERIOD);
        let coached = coach.is_some();
        let actor = Actor {
            workout,
            commands: rx,
            events: events.clone(),
            stopping: stopping.clone(),
            coach,
        };
        tokio::spawn(actor.run(ticker));

        info!(
            "Started {} session: target {} reps in {}s{}",
            config.exercise.name(),
            config.target_reps,
            config.target_duration_seconds,
            if coached { ", coached" } else { "" }
        );
        Ok(Self {
            commands,
            events,
            stopping,
        })
    }

    /// Queues a landmark frame. Never blocks.
    pub fn on_landmark_frame(&self, landmarks: LandmarkSet) -> Result<(), SessionError> {
        if self.stopping.load(Ordering::Acquire) {
            return Err(SessionError::Closed);
        }
        self.commands
            .send(Command::Frame(Box::new(landmarks)))
            .map_err(|_| SessionError::Closed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Result<WorkoutSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot(tx))
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub async fn result(&self) -> Result<Option<SessionResult>, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Result(tx))
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Ends the workout from any state and waits for the owner task to exit.
    ///
    /// Once this returns, nothing mutates the workout again. Returns the result
    /// if the workout went live; a second call reports `SessionError::Closed`.
    pub async fn stop(&self) -> Result<Option<SessionResult>, SessionError> {
        if self.stopping.swap(true, Ordering::AcqRel) {
            return Err(SessionError::Closed);
        }
        debug!("Stopping session");
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Stop(tx))
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coach::testing::{FakeCapture, FakeConnector, FakePlayback};
    use crate::coach::{CoachError, ConnectionState, LogListener};
    use crate::config::AudioConfig;
    use crate::exercise::ExerciseType;
    use crate::exercise::testing::knee;
    use crate::session::{FinishReason, SessionState};
    use tokio::time::sleep;

    fn squat(target_reps: u32, duration: u32) -> WorkoutConfig {
        WorkoutConfig::new(ExerciseType::Squat, target_reps, duration)
    }

    /// Starts a session and moves half a tick off the ticker's schedule, so
    /// test wake-ups never tie with ticks.
    async fn started(config: WorkoutConfig) -> Session {
        let session = Session::start(config, &EngineConfig::default()).unwrap();
        sleep(Duration::from_millis(500)).await;
        session
    }

    async fn seconds(n: u64) {
        sleep(Duration::from_secs(n)).await;
    }

    struct Coach {
        pipeline: Arc<CoachPipeline>,
        agent: Arc<FakeConnector>,
        mic: Arc<FakeCapture>,
    }

    fn coach(mic: FakeCapture) -> Coach {
        let agent = Arc::new(FakeConnector::default());
        let mic = Arc::new(mic);
        let pipeline = Arc::new(CoachPipeline::new(
            agent.clone(),
            mic.clone(),
            Arc::new(FakePlayback::default()),
            Arc::new(LogListener),
            AudioConfig::default(),
        ));
        Coach {
            pipeline,
            agent,
            mic,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_drives_countdown_into_active() {
        let session = started(squat(10, 30)).await;
        assert_eq!(
            session.snapshot().await.unwrap().state,
            SessionState::Countdown(3)
        );
        seconds(3).await;
        assert_eq!(
            session.snapshot().await.unwrap().state,
            SessionState::Active(30)
        );
        seconds(4).await;
        assert_eq!(session.snapshot().await.unwrap().time_left(), Some(26));
    }

    #[tokio::test(start_paused = true)]
    async fn frames_count_reps_and_publish_events() {
        let session = started(squat(2, 30)).await;
        let mut events = session.subscribe();
        seconds(3).await;
        seconds(5).await;

        for _ in 0..2 {
            for angle in [170.0, 80.0, 170.0] {
                session.on_landmark_frame(knee(angle)).unwrap();
            }
        }
        let result = loop {
            match events.recv().await.unwrap() {
                SessionEvent::Finished { result, .. } => break result,
                _ => continue,
            }
        };
        assert_eq!(
            result,
            SessionResult {
                success: true,
                reps: 2,
                elapsed_seconds: 5,
            }
        );
        assert_eq!(session.result().await.unwrap(), Some(result));
    }

    #[tokio::test(start_paused = true)]
    async fn rep_events_carry_feedback() {
        let session = started(squat(0, 30)).await;
        let mut events = session.subscribe();
        seconds(3).await;
        for angle in [170.0, 80.0] {
            session.on_landmark_frame(knee(angle)).unwrap();
        }
        loop {
            if let SessionEvent::RepCounted { reps, feedback } = events.recv().await.unwrap() {
                assert_eq!(reps, 1);
                assert_eq!(feedback, "Good squat!");
                break;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn untimed_session_finishes_on_the_clock() {
        let config = WorkoutConfig::new(ExerciseType::Pushup, 0, 5);
        let session = started(config).await;
        seconds(3).await;
        seconds(5).await;
        let snapshot = session.snapshot().await.unwrap();
        match snapshot.state {
            SessionState::Finished(o) => {
                assert!(o.success);
                assert_eq!(o.reps, 0);
                assert_eq!(o.reason, FinishReason::TimeUp);
            }
            other => panic!("expected finished, got {:?}", other),
        }
        // The clock is stopped once finished.
        seconds(10).await;
        assert_eq!(session.snapshot().await.unwrap().state, snapshot.state);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_quiesces_the_session() {
        let session = started(squat(0, 30)).await;
        seconds(3).await;
        seconds(2).await;
        for angle in [170.0, 80.0] {
            session.on_landmark_frame(knee(angle)).unwrap();
        }
        // Queries go through the same queue, so this waits for the frames.
        assert_eq!(session.snapshot().await.unwrap().reps, 1);
        let result = session.stop().await.unwrap().unwrap();
        assert!(!result.success);
        assert_eq!(result.reps, 1);
        assert_eq!(result.elapsed_seconds, 2);

        assert_eq!(
            session.on_landmark_frame(knee(170.0)),
            Err(SessionError::Closed)
        );
        assert_eq!(session.stop().await, Err(SessionError::Closed));
        assert_eq!(session.snapshot().await, Err(SessionError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_countdown_has_no_result() {
        let session = started(squat(0, 30)).await;
        seconds(1).await;
        assert_eq!(session.stop().await.unwrap(), None);
    }

    #[tokio::test]
    async fn invalid_config_does_not_spawn() {
        assert!(matches!(
            Session::start(squat(5, 0), &EngineConfig::default()),
            Err(SessionError::InvalidConfig(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn frames_queued_before_the_last_tick_win() {
        let session = started(squat(1, 5)).await;
        let mut events = session.subscribe();
        seconds(3).await;
        seconds(4).await;
        assert_eq!(
            session.snapshot().await.unwrap().state,
            SessionState::Active(1)
        );

        // The target rep lands in the queue ahead of the tick that would time out.
        for angle in [170.0, 80.0] {
            session.on_landmark_frame(knee(angle)).unwrap();
        }
        seconds(1).await;
        seconds(2).await;

        let mut finished = Vec::new();
        let mut outcome = None;
        while let Ok(event) = events.try_recv() {
            match event {
                SessionEvent::Finished { result, .. } => finished.push(result),
                SessionEvent::StateChanged(SessionState::Finished(o)) => outcome = Some(o),
                _ => {}
            }
        }
        assert_eq!(
            finished,
            vec![SessionResult {
                success: true,
                reps: 1,
                elapsed_seconds: 4,
            }]
        );
        let outcome = outcome.unwrap();
        assert_eq!(outcome.reason, FinishReason::TargetReached);
        assert_eq!(
            session.snapshot().await.unwrap().state,
            SessionState::Finished(outcome)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn coached_session_connects_first() {
        let coach = coach(FakeCapture::default());
        let session = Session::start_coached(
            squat(0, 30),
            &EngineConfig::default(),
            coach.pipeline.clone(),
        )
        .await
        .unwrap();
        assert_eq!(coach.pipeline.connection_state(), ConnectionState::Open);
        assert!(coach.mic.is_running());
        assert!(matches!(
            session.snapshot().await.unwrap().state,
            SessionState::Countdown(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_disconnects_coaching() {
        let coach = coach(FakeCapture::default());
        let session = Session::start_coached(
            squat(0, 30),
            &EngineConfig::default(),
            coach.pipeline.clone(),
        )
        .await
        .unwrap();
        sleep(Duration::from_millis(500)).await;
        seconds(4).await;

        let result = session.stop().await.unwrap();
        assert_eq!(result.map(|r| r.elapsed_seconds), Some(1));
        assert_eq!(coach.pipeline.connection_state(), ConnectionState::Closed);
        assert!(!coach.mic.is_running());
        assert!(coach.agent.last_session().is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_session_disconnects_coaching() {
        let coach = coach(FakeCapture::default());
        let session = Session::start_coached(
            squat(0, 30),
            &EngineConfig::default(),
            coach.pipeline.clone(),
        )
        .await
        .unwrap();
        let other = session.clone();
        drop(session);
        sleep(Duration::from_millis(10)).await;
        assert_eq!(coach.pipeline.connection_state(), ConnectionState::Open);

        drop(other);
        sleep(Duration::from_millis(10)).await;
        assert_eq!(coach.pipeline.connection_state(), ConnectionState::Closed);
        assert!(!coach.mic.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn denied_microphone_fails_a_coached_start() {
        let coach = coach(FakeCapture {
            deny: true,
            ..Default::default()
        });
        let err = Session::start_coached(
            squat(0, 30),
            &EngineConfig::default(),
            coach.pipeline.clone(),
        )
        .await
        .err();
        assert_eq!(
            err,
            Some(SessionError::Coach(CoachError::PermissionDenied(
                "microphone".into()
            )))
        );
        assert_eq!(coach.pipeline.connection_state(), ConnectionState::Errored);
        assert!(coach.agent.last_session().is_closed());
    }

    #[tokio::test]
    async fn invalid_config_never_connects() {
        let coach = coach(FakeCapture::default());
        let err = Session::start_coached(
            squat(5, 0),
            &EngineConfig::default(),
            coach.pipeline.clone(),
        )
        .await
        .err();
        assert!(matches!(err, Some(SessionError::InvalidConfig(_))));
        assert!(coach.agent.sessions.lock().is_empty());
        assert_eq!(coach.pipeline.connection_state(), ConnectionState::Idle);
    }
}
