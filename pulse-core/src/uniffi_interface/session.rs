use std::sync::Arc;

use log::debug;

use crate::config::EngineConfig;
use crate::runtime::init_global_runtime_blocking;
use crate::session::Session;
use crate::uniffi_interface::coach::CoachSession;
use crate::uniffi_interface::errors::PulseError;
use crate::uniffi_interface::objects::{
    LandmarkPoint, SessionConfig, SessionResult, WorkoutSnapshot, landmark_set,
};

/// A running workout, driven from the host's camera callback and UI thread.
#[derive(uniffi::Object)]
pub struct WorkoutSession {
    inner: Session,
}

#[uniffi::export]
impl WorkoutSession {
    /// Validates `config` and starts the countdown on the global runtime.
    #[uniffi::constructor]
    pub fn start(config: SessionConfig) -> Result<Arc<Self>, PulseError> {
        let engine = EngineConfig::from_env()?;
        // Ensure a global runtime exists when being invoked from foreign runtimes.
        let rt = init_global_runtime_blocking();
        let _guard = rt.enter();
        let inner = Session::start(config.into(), &engine)?;
        Ok(Arc::new(Self { inner }))
    }

    /// Connects `coach` and starts the workout. Stopping the workout, or
    /// dropping it, disconnects the coach.
    #[uniffi::constructor]
    pub fn start_coached(
        config: SessionConfig,
        coach: Arc<CoachSession>,
    ) -> Result<Arc<Self>, PulseError> {
        let engine = EngineConfig::from_env()?;
        let rt = init_global_runtime_blocking();
        let inner = rt.block_on(Session::start_coached(
            config.into(),
            &engine,
            coach.pipeline.clone(),
        ))?;
        Ok(Arc::new(Self { inner }))
    }

    /// Queues one frame of landmarks. Never blocks the camera thread.
    pub fn push_frame(&self, points: Vec<LandmarkPoint>) -> Result<(), PulseError> {
        self.inner.on_landmark_frame(landmark_set(&points))?;
        Ok(())
    }

    pub fn stop(&self) -> Result<Option<SessionResult>, PulseError> {
        debug!("Stopping workout session from host");
        let rt = init_global_runtime_blocking();
        let result = rt.block_on(self.inner.stop())?;
        Ok(result.map(SessionResult::from))
    }

    pub fn result(&self) -> Result<Option<SessionResult>, PulseError> {
        let rt = init_global_runtime_blocking();
        let result = rt.block_on(self.inner.result())?;
        Ok(result.map(SessionResult::from))
    }

    pub fn snapshot(&self) -> Result<WorkoutSnapshot, PulseError> {
        let rt = init_global_runtime_blocking();
        let snapshot = rt.block_on(self.inner.snapshot())?;
        Ok(snapshot.into())
    }
}
