//! The owner task behind [`super::Session`].
//!
//! Every input reaches the workout through one queue, so a tick and a frame
//! can never interleave inside a state transition.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use log::{debug, trace, warn};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};

use super::summary::{SessionResult, WorkoutSnapshot};
use super::{SessionEvent, SessionState, Workout};
use crate::coach::CoachPipeline;
use crate::geometry::LandmarkSet;

pub(super) enum Command {
    Frame(Box<LandmarkSet>),
    Tick,
    Snapshot(oneshot::Sender<WorkoutSnapshot>),
    Result(oneshot::Sender<Option<SessionResult>>),
    Stop(oneshot::Sender<Option<SessionResult>>),
}

pub(super) struct Actor {
    pub workout: Workout,
    pub commands: mpsc::UnboundedReceiver<Command>,
    pub events: broadcast::Sender<SessionEvent>,
    pub stopping: Arc<AtomicBool>,
    /// Live coaching tied to this workout, disconnected when the actor exits.
    pub coach: Option<Arc<CoachPipeline>>,
}

impl Actor {
    pub async fn run(mut self, ticker: JoinHandle<()>) {
        while let Some(command) = self.commands.recv().await {
            let stopping = self.stopping.load(Ordering::Acquire);
            match command {
                Command::Frame(landmarks) if !stopping => {
                    let update = self.workout.on_landmark_frame(&landmarks);
                    if let Some(reps) = update.rep_counted {
                        self.publish(SessionEvent::RepCounted {
                            reps,
                            feedback: self.workout.exercise().last_feedback().to_string(),
                        });
                    }
                    if let Some(state) = update.transition {
                        self.publish_state(state);
                    }
                }
                Command::Tick if !stopping => {
                    if let Some(state) = self.workout.tick() {
                        trace!("Tick -> {:?}", state);
                        self.publish_state(state);
                    }
                }
                Command::Frame(_) | Command::Tick => {
                    trace!("Dropping input queued behind stop");
                }
                Command::Snapshot(reply) => {
                    let _ = reply.send(self.workout.snapshot());
                }
                Command::Result(reply) => {
                    let _ = reply.send(self.workout.result());
                }
                Command::Stop(reply) => {
                    let before = self.workout.state();
                    let result = self.workout.stop();
                    let after = self.workout.state();
                    if after != before {
                        self.publish_state(after);
                    }
                    ticker.abort();
                    self.end_coaching();
                    let _ = reply.send(result);
                    debug!("Session actor stopped");
                    return;
                }
            }

            if self.workout.state().is_finished() && !ticker.is_finished() {
                ticker.abort();
            }
        }

        ticker.abort();
        self.end_coaching();
        debug!("Session actor exiting: all handles dropped");
    }

    fn end_coaching(&self) {
        if let Some(coach) = &self.coach {
            debug!("Disconnecting coach");
            coach.disconnect();
        }
    }

    fn publish_state(&self, state: SessionState) {
        self.publish(SessionEvent::StateChanged(state));
        if let SessionState::Finished(outcome) = state {
            self.publish(SessionEvent::Finished {
                result: outcome.into(),
                at: Utc::now(),
            });
        }
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine; the UI may poll snapshots instead.
        if self.events.send(event).is_err() {
            trace!("No session event subscribers");
        }
    }
}

/// Feeds `Command::Tick` into the queue once per `period` until the session goes away.
pub(super) fn spawn_ticker(
    commands: mpsc::WeakUnboundedSender<Command>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let Some(tx) = commands.upgrade() else {
                break;
            };
            if tx.send(Command::Tick).is_err() {
                warn!("Session queue closed, ticker exiting");
                break;
            }
        }
    })
}
