use log::trace;

use super::hinge::{self, Phrases};
use super::{Classifier, ExerciseState};
use crate::config::ClassifierThresholds;
use crate::geometry::{Joint, LandmarkSet, angle_at};

const PHRASES: Phrases = Phrases {
    success: "Nice pushup!",
    warning: "Too low, keep your core tight",
};

/// Counts pushups from the left elbow angle (shoulder, elbow, wrist).
#[derive(Debug, Clone)]
pub struct Pushup {
    thresholds: ClassifierThresholds,
}

impl Pushup {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }
}

impl Classifier for Pushup {
    fn classify(&self, landmarks: &LandmarkSet, prior: &ExerciseState) -> ExerciseState {
        let Some([shoulder, elbow, wrist]) =
            landmarks.require([Joint::LeftShoulder, Joint::LeftElbow, Joint::LeftWrist])
        else {
            return prior.clone();
        };
        let angle = angle_at(shoulder, elbow, wrist);
        trace!("pushup elbow angle {:.1}", angle);
        hinge::step(angle, prior, &self.thresholds, &PHRASES)
    }
}
