//! One workout's lifecycle: timer, classifier and rep count together.

use log::{debug, trace};

use super::summary::{SessionResult, WorkoutSnapshot};
use super::{SessionController, SessionError, SessionState};
use crate::config::{EngineConfig, WorkoutConfig};
use crate::exercise::{Classifier, ExerciseClassifier, ExerciseState};
use crate::geometry::LandmarkSet;

/// What a single landmark frame changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameUpdate {
    /// New rep total, if this frame counted one.
    pub rep_counted: Option<u32>,
    /// New session state, if the rep met the target.
    pub transition: Option<SessionState>,
}

#[derive(Debug, Clone)]
pub struct Workout {
    controller: SessionController,
    classifier: Option<ExerciseClassifier>,
    exercise: ExerciseState,
}

impl Workout {
    /// Creates a workout in `Setup`.
    pub fn new(config: WorkoutConfig, engine: &EngineConfig) -> Result<Self, SessionError> {
        config.validate()?;
        debug!(
            "New {} workout: target {} reps in {}s",
            config.exercise.name(),
            config.target_reps,
            config.target_duration_seconds
        );
        Ok(Self {
            controller: SessionController::new(
                config.target_reps,
                config.target_duration_seconds,
                engine.countdown_ticks,
            ),
            classifier: config.exercise.classifier(&engine.thresholds),
            exercise: ExerciseState::new(),
        })
    }

    /// Starts the countdown. Call once capture is confirmed and the user is ready.
    pub fn start(&mut self) -> Result<SessionState, SessionError> {
        self.controller.begin_countdown()
    }

    /// Classifies a frame while the workout is live. Frames in any other state
    /// are accepted for overlay rendering and leave the rep count untouched.
    pub fn on_landmark_frame(&mut self, landmarks: &LandmarkSet) -> FrameUpdate {
        if !self.controller.state().is_active() || self.controller.is_halted() {
            return FrameUpdate::default();
        }
        let Some(classifier) = &self.classifier else {
            return FrameUpdate::default();
        };

        let next = classifier.classify(landmarks, &self.exercise);
        let mut update = FrameUpdate::default();
        if next.reps() > self.exercise.reps() {
            trace!("Rep {} ({})", next.reps(), next.last_feedback());
            update.rep_counted = Some(next.reps());
        }
        self.exercise = next;
        update.transition = self.controller.report_reps(self.exercise.reps());
        update
    }

    pub fn tick(&mut self) -> Option<SessionState> {
        self.controller.tick()
    }

    /// Ends the workout. Returns the result if the workout went live.
    pub fn stop(&mut self) -> Option<SessionResult> {
        self.controller.stop();
        self.result()
    }

    pub fn result(&self) -> Option<SessionResult> {
        self.controller.outcome().map(SessionResult::from)
    }

    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    pub fn is_halted(&self) -> bool {
        self.controller.is_halted()
    }

    pub fn exercise(&self) -> &ExerciseState {
        &self.exercise
    }

    pub fn snapshot(&self) -> WorkoutSnapshot {
        WorkoutSnapshot {
            state: self.controller.state(),
            reps: self.exercise.reps(),
            stage: self.exercise.stage(),
            feedback: self.exercise.last_feedback().to_string(),
        }
    }
}
