use crate::config::WorkoutConfig;
use crate::exercise::{ExerciseType, Stage};
use crate::geometry::LandmarkSet;
use crate::session::{self, SessionState};

/// One detected joint, by BlazePose index, in normalized image coordinates.
#[derive(Debug, Clone, Copy, uniffi::Record)]
pub struct LandmarkPoint {
    pub index: u32,
    pub x: f32,
    pub y: f32,
}

pub(crate) fn landmark_set(points: &[LandmarkPoint]) -> LandmarkSet {
    LandmarkSet::from_indexed(points.iter().map(|p| (p.index as usize, p.x, p.y)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum ExerciseKind {
    Squat,
    Pushup,
    JumpingJack,
    Untracked,
}

impl From<ExerciseKind> for ExerciseType {
    fn from(kind: ExerciseKind) -> Self {
        match kind {
            ExerciseKind::Squat => ExerciseType::Squat,
            ExerciseKind::Pushup => ExerciseType::Pushup,
            ExerciseKind::JumpingJack => ExerciseType::JumpingJack,
            ExerciseKind::Untracked => ExerciseType::Untracked,
        }
    }
}

#[derive(Debug, Clone, Copy, uniffi::Record)]
pub struct SessionConfig {
    pub exercise: ExerciseKind,
    pub target_reps: u32,
    pub target_duration_seconds: u32,
}

impl From<SessionConfig> for WorkoutConfig {
    fn from(c: SessionConfig) -> Self {
        WorkoutConfig::new(c.exercise.into(), c.target_reps, c.target_duration_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Record)]
pub struct SessionResult {
    pub success: bool,
    pub reps: u32,
    pub elapsed_seconds: u32,
}

impl From<session::SessionResult> for SessionResult {
    fn from(r: session::SessionResult) -> Self {
        SessionResult {
            success: r.success,
            reps: r.reps,
            elapsed_seconds: r.elapsed_seconds,
        }
    }
}

/// HUD view. `countdown` and `time_left` are set only in their own phase.
#[derive(Debug, Clone, uniffi::Record)]
pub struct WorkoutSnapshot {
    pub state: String,
    pub countdown: Option<u32>,
    pub time_left: Option<u32>,
    pub reps: u32,
    pub stage: String,
    pub feedback: String,
    pub result: Option<SessionResult>,
}

impl From<session::WorkoutSnapshot> for WorkoutSnapshot {
    fn from(s: session::WorkoutSnapshot) -> Self {
        let countdown = match s.state {
            SessionState::Countdown(n) => Some(n),
            _ => None,
        };
        let stage = match s.stage {
            Stage::Up => "up",
            Stage::Down => "down",
            Stage::Unknown => "unknown",
        };
        WorkoutSnapshot {
            state: s.state.name().to_string(),
            countdown,
            time_left: s.time_left(),
            reps: s.reps,
            stage: stage.to_string(),
            result: s.result().map(SessionResult::from),
            feedback: s.feedback,
        }
    }
}
