//! Rep counting classifiers.
//!
//! A classifier is a pure step function: given the current landmark frame and
//! the previous [`ExerciseState`], it returns the next state. Counting uses two
//! thresholds plus a required stage flip, so a single noisy frame near either
//! threshold can never register a rep on its own.
//!
//! Frames that lack a joint the exercise needs are a no-op: the prior state is
//! returned unchanged.

mod hinge;
mod jumping_jack;
mod pushup;
mod squat;

pub use jumping_jack::JumpingJack;
pub use pushup::Pushup;
pub use squat::Squat;

use serde::{Deserialize, Serialize};

use crate::config::ClassifierThresholds;
use crate::geometry::LandmarkSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Stage {
    Up,
    Down,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExerciseState {
    pub(crate) stage: Stage,
    pub(crate) reps: u32,
    pub(crate) last_feedback: String,
}

impl ExerciseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn reps(&self) -> u32 {
        self.reps
    }

    pub fn last_feedback(&self) -> &str {
        &self.last_feedback
    }

    fn count_rep(&mut self, feedback: &str) {
        self.reps += 1;
        self.last_feedback = feedback.to_string();
    }
}

pub trait Classifier {
    fn classify(&self, landmarks: &LandmarkSet, prior: &ExerciseState) -> ExerciseState;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    Squat,
    Pushup,
    JumpingJack,
    /// Timed only; frames are never classified.
    Untracked,
}

impl ExerciseType {
    pub fn classifier(self, thresholds: &ClassifierThresholds) -> Option<ExerciseClassifier> {
        match self {
            ExerciseType::Squat => Some(ExerciseClassifier::Squat(Squat::new(thresholds.clone()))),
            ExerciseType::Pushup => {
                Some(ExerciseClassifier::Pushup(Pushup::new(thresholds.clone())))
            }
            ExerciseType::JumpingJack => Some(ExerciseClassifier::JumpingJack(JumpingJack::new(
                thresholds.clone(),
            ))),
            ExerciseType::Untracked => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ExerciseType::Squat => "squat",
            ExerciseType::Pushup => "pushup",
            ExerciseType::JumpingJack => "jumping jack",
            ExerciseType::Untracked => "untracked",
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExerciseClassifier {
    Squat(Squat),
    Pushup(Pushup),
    JumpingJack(JumpingJack),
}

impl Classifier for ExerciseClassifier {
    fn classify(&self, landmarks: &LandmarkSet, prior: &ExerciseState) -> ExerciseState {
        match self {
            ExerciseClassifier::Squat(c) => c.classify(landmarks, prior),
            ExerciseClassifier::Pushup(c) => c.classify(landmarks, prior),
            ExerciseClassifier::JumpingJack(c) => c.classify(landmarks, prior),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn untracked_has_no_classifier() {
        let t = ClassifierThresholds::default();
        assert!(ExerciseType::Untracked.classifier(&t).is_none());
        assert!(matches!(
            ExerciseType::Squat.classifier(&t),
            Some(ExerciseClassifier::Squat(_))
        ));
        assert!(matches!(
            ExerciseType::JumpingJack.classifier(&t),
            Some(ExerciseClassifier::JumpingJack(_))
        ));
    }

    #[test]
    fn reps_never_decrease_on_noisy_input() {
        let t = ClassifierThresholds::default();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for exercise in [ExerciseType::Squat, ExerciseType::Pushup, ExerciseType::JumpingJack] {
            let classifier = exercise.classifier(&t).unwrap();
            let mut state = ExerciseState::new();
            for _ in 0..2_000 {
                let frame = match exercise {
                    ExerciseType::Squat => testing::knee(rng.random_range(40.0..180.0)),
                    ExerciseType::Pushup => testing::elbow(rng.random_range(40.0..180.0)),
                    _ => testing::jack(rng.random_range(0.0..0.5), rng.random_range(0.1..0.9)),
                };
                let next = classifier.classify(&frame, &state);
                assert!(next.reps() >= state.reps());
                assert!(next.reps() <= state.reps() + 1);
                state = next;
            }
        }
    }
}
