//! Joint geometry over 2D landmark sets.
//!
//! Everything here is a pure function of its inputs. Coordinates are the
//! detector's normalized frame coordinates, so distances are fractions of the
//! frame rather than physical units.

mod landmarks;

pub use landmarks::{Joint, LandmarkSet, Point};

use std::f32::consts::PI;

/// Interior angle at `b` between the rays `b→a` and `b→c`, in degrees within [0, 180].
///
/// Coincident points yield a stable but meaningless angle; callers are expected
/// to pass resolved, distinct joints.
pub fn angle_at(a: Point, b: Point, c: Point) -> f32 {
    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let angle = (radians * 180.0 / PI).abs();
    if angle > 180.0 { 360.0 - angle } else { angle }
}

pub fn distance(a: Point, b: Point) -> f32 {
    (a.x - b.x).hypot(a.y - b.y)
}

pub fn midpoint(a: Point, b: Point) -> Point {
    Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}
