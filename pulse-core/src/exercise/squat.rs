use log::trace;

use super::hinge::{self, Phrases};
use super::{Classifier, ExerciseState};
use crate::config::ClassifierThresholds;
use crate::geometry::{Joint, LandmarkSet, angle_at};

const PHRASES: Phrases = Phrases {
    success: "Good squat!",
    warning: "Too deep, keep your knees safe",
};

/// Counts squats from the left knee angle (hip, knee, ankle).
#[derive(Debug, Clone)]
pub struct Squat {
    thresholds: ClassifierThresholds,
}

impl Squat {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }
}

impl Classifier for Squat {
    fn classify(&self, landmarks: &LandmarkSet, prior: &ExerciseState) -> ExerciseState {
        let Some([hip, knee, ankle]) =
            landmarks.require([Joint::LeftHip, Joint::LeftKnee, Joint::LeftAnkle])
        else {
            return prior.clone();
        };
        let angle = angle_at(hip, knee, ankle);
        trace!("squat knee angle {:.1}", angle);
        hinge::step(angle, prior, &self.thresholds, &PHRASES)
    }
}
