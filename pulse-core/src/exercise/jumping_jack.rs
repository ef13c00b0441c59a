use log::trace;

use super::{Classifier, ExerciseState, Stage};
use crate::config::ClassifierThresholds;
use crate::geometry::{Joint, LandmarkSet, distance};

const SUCCESS: &str = "Great jack!";

/// Counts jumping jacks from ankle spread and wrist height relative to the hips.
///
/// Image y grows downward, so "above the hips" means a smaller y.
#[derive(Debug, Clone)]
pub struct JumpingJack {
    thresholds: ClassifierThresholds,
}

impl JumpingJack {
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }
}

impl Classifier for JumpingJack {
    fn classify(&self, landmarks: &LandmarkSet, prior: &ExerciseState) -> ExerciseState {
        let Some([l_ankle, r_ankle, l_wrist, r_wrist, l_hip, r_hip]) = landmarks.require([
            Joint::LeftAnkle,
            Joint::RightAnkle,
            Joint::LeftWrist,
            Joint::RightWrist,
            Joint::LeftHip,
            Joint::RightHip,
        ]) else {
            return prior.clone();
        };

        let t = &self.thresholds;
        let feet = distance(l_ankle, r_ankle);
        let hip_y = (l_hip.y + r_hip.y) / 2.0;
        trace!(
            "jack feet {:.3} wrists {:.3}/{:.3} hips {:.3}",
            feet, l_wrist.y, r_wrist.y, hip_y
        );

        let closed = feet < t.closed_feet && l_wrist.y > hip_y && r_wrist.y > hip_y;
        let open = feet > t.open_feet
            && l_wrist.y < hip_y - t.arm_margin
            && r_wrist.y < hip_y - t.arm_margin;

        let mut next = prior.clone();
        if closed {
            next.stage = Stage::Down;
        } else if open && prior.stage == Stage::Down {
            next.stage = Stage::Up;
            next.count_rep(SUCCESS);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::testing::jack;

    const CLOSED: (f32, f32) = (0.05, 0.7);
    const OPEN: (f32, f32) = (0.4, 0.2);

    fn run(frames: &[(f32, f32)]) -> ExerciseState {
        let jj = JumpingJack::new(ClassifierThresholds::default());
        frames.iter().fold(ExerciseState::new(), |state, &(feet, wrist)| {
            jj.classify(&jack(feet, wrist), &state)
        })
    }

    #[test]
    fn closed_then_open_counts() {
        let state = run(&[CLOSED, OPEN]);
        assert_eq!(state.reps(), 1);
        assert_eq!(state.stage(), Stage::Up);
        assert_eq!(state.last_feedback(), SUCCESS);
    }

    #[test]
    fn opening_without_closing_first_does_not_count() {
        let state = run(&[OPEN, OPEN, OPEN]);
        assert_eq!(state.reps(), 0);
        assert_eq!(state.stage(), Stage::Unknown);
    }

    #[test]
    fn legs_apart_with_arms_down_is_neither() {
        let state = run(&[CLOSED, (0.4, 0.7), (0.4, 0.45), CLOSED]);
        assert_eq!(state.reps(), 0);
        assert_eq!(state.stage(), Stage::Down);
    }

    #[test]
    fn lingering_in_both_positions_counts_each_cycle_once() {
        let mut frames = vec![CLOSED; 20];
        frames.extend(vec![OPEN; 20]);
        frames.extend(vec![CLOSED; 20]);
        frames.extend(vec![OPEN; 20]);
        assert_eq!(run(&frames).reps(), 2);
    }

    #[test]
    fn missing_wrist_is_a_no_op() {
        let jj = JumpingJack::new(ClassifierThresholds::default());
        let down = jj.classify(&jack(CLOSED.0, CLOSED.1), &ExerciseState::new());
        let mut frame = jack(OPEN.0, OPEN.1);
        frame.remove(Joint::RightWrist);
        assert_eq!(jj.classify(&frame, &down), down);
    }
}
