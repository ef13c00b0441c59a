//! Capture and playback hardware, owned by the host platform.
//!
//! Device callbacks run on their own threads; they only hand owned buffers and
//! completion ids to the pipeline through channels.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::CoachResult;
use super::playback::{ScheduledUnit, UnitId};

pub trait CaptureDevice: Send + Sync {
    /// Starts the microphone at `sample_rate` mono, sending normalized sample
    /// buffers of any length to `sink`. Fails with `PermissionDenied` when the
    /// platform refuses access.
    fn start(&self, sample_rate: u32, sink: mpsc::UnboundedSender<Vec<f32>>) -> CoachResult<()>;

    /// Stops capture. Must be safe to call when not started.
    fn stop(&self);
}

pub trait PlaybackDevice: Send + Sync {
    /// Opens the output at `sample_rate` mono. The device reports each unit
    /// that plays to its end on `finished`.
    fn acquire(&self, sample_rate: u32, finished: mpsc::UnboundedSender<UnitId>)
    -> CoachResult<()>;

    /// Current position of the playback clock, in seconds.
    fn now(&self) -> f64;

    fn schedule(&self, unit: &ScheduledUnit, samples: Arc<[f32]>);

    /// Stops a unit immediately. Cancelled units are not reported as finished.
    fn cancel(&self, id: UnitId);

    /// Releases the output. Must be safe to call when not acquired.
    fn release(&self);
}
