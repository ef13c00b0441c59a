use super::{ExerciseState, Stage};
use crate::config::ClassifierThresholds;

pub(super) struct Phrases {
    pub success: &'static str,
    pub warning: &'static str,
}

/// Two-threshold counting shared by exercises measured at a single joint angle.
pub(super) fn step(
    angle: f32,
    prior: &ExerciseState,
    thresholds: &ClassifierThresholds,
    phrases: &Phrases,
) -> ExerciseState {
    let mut next = prior.clone();

    if angle > thresholds.up_angle {
        next.stage = Stage::Up;
    }
    if angle < thresholds.down_angle && prior.stage == Stage::Up {
        next.stage = Stage::Down;
        next.count_rep(phrases.success);
    }
    // Checked last so it wins over the success phrase on the same frame.
    if angle < thresholds.warn_angle {
        next.last_feedback = phrases.warning.to_string();
    }

    next
}
