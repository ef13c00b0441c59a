use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A 2D point in normalized frame coordinates. `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f32; 2]> for Point {
    fn from([x, y]: [f32; 2]) -> Self {
        Point { x, y }
    }
}

impl From<Point> for [f32; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// Tracked body joints, in detector output order (33-point BlazePose topology).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Nose,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl Joint {
    pub const COUNT: usize = 33;

    pub const ALL: [Joint; Joint::COUNT] = [
        Joint::Nose,
        Joint::LeftEyeInner,
        Joint::LeftEye,
        Joint::LeftEyeOuter,
        Joint::RightEyeInner,
        Joint::RightEye,
        Joint::RightEyeOuter,
        Joint::LeftEar,
        Joint::RightEar,
        Joint::MouthLeft,
        Joint::MouthRight,
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftWrist,
        Joint::RightWrist,
        Joint::LeftPinky,
        Joint::RightPinky,
        Joint::LeftIndex,
        Joint::RightIndex,
        Joint::LeftThumb,
        Joint::RightThumb,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
        Joint::LeftHeel,
        Joint::RightHeel,
        Joint::LeftFootIndex,
        Joint::RightFootIndex,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Joint> {
        Self::ALL.get(index).copied()
    }
}

/// One frame of detector output. Joints the detector did not resolve are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Joint, Point>", into = "BTreeMap<Joint, Point>")]
pub struct LandmarkSet {
    points: [Option<Point>; Joint::COUNT],
}

impl Default for LandmarkSet {
    fn default() -> Self {
        Self {
            points: [None; Joint::COUNT],
        }
    }
}

impl LandmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from `(detector index, x, y)` triples. Unknown indices are skipped.
    pub fn from_indexed<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (usize, f32, f32)>,
    {
        let mut set = Self::new();
        for (index, x, y) in entries {
            if let Some(joint) = Joint::from_index(index) {
                set.set(joint, Point::new(x, y));
            }
        }
        set
    }

    pub fn with(mut self, joint: Joint, point: Point) -> Self {
        self.set(joint, point);
        self
    }

    pub fn set(&mut self, joint: Joint, point: Point) {
        self.points[joint.index()] = Some(point);
    }

    pub fn remove(&mut self, joint: Joint) {
        self.points[joint.index()] = None;
    }

    /// Returns the joint position, treating non-finite coordinates as missing.
    pub fn get(&self, joint: Joint) -> Option<Point> {
        self.points[joint.index()].filter(Point::is_finite)
    }

    /// Resolves every joint in `joints`, or `None` if any of them is missing.
    pub fn require<const N: usize>(&self, joints: [Joint; N]) -> Option<[Point; N]> {
        let mut out = [Point::new(0.0, 0.0); N];
        for (slot, joint) in out.iter_mut().zip(joints) {
            *slot = self.get(joint)?;
        }
        Some(out)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Joint, Point)> + '_ {
        Joint::ALL
            .iter()
            .filter_map(|&joint| self.get(joint).map(|p| (joint, p)))
    }
}

impl From<BTreeMap<Joint, Point>> for LandmarkSet {
    fn from(map: BTreeMap<Joint, Point>) -> Self {
        let mut set = LandmarkSet::new();
        for (joint, point) in map {
            set.set(joint, point);
        }
        set
    }
}

impl From<LandmarkSet> for BTreeMap<Joint, Point> {
    fn from(set: LandmarkSet) -> Self {
        set.iter().collect()
    }
}
