//! Eye-centred, IPD-unit normalization of landmark geometry.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::regions::RegionIndexMap;
use crate::types::{LandmarkSet, Point};

/// IPD below which the eye pair is treated as coincident.
const MIN_IPD: f64 = 1e-9;

/// The frame a point set was normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeFrame {
    /// Eye midpoint in input coordinates; becomes the origin.
    pub origin: Point,
    /// Angle of the eye line in radians; rotated onto +x.
    pub angle: f64,
    /// Multiplier applied after rotation (1 / IPD, or 1 for a degenerate IPD).
    pub scale: f64,
    pub ipd: f64,
}

impl EyeFrame {
    /// Build the frame for a pair of eye centres.
    ///
    /// With a near-zero IPD only the translation is kept: no rotation can be
    /// derived from coincident eyes and dividing by the IPD would blow up.
    pub fn from_eyes(left: Point, right: Point) -> Self {
        let origin = (left + right) * 0.5;
        let d = right - left;
        let ipd = d.norm();

        if !(ipd > MIN_IPD) || !ipd.is_finite() {
            debug!("degenerate IPD {ipd}; normalizing by translation only");
            return Self {
                origin,
                angle: 0.0,
                scale: 1.0,
                ipd,
            };
        }

        Self {
            origin,
            angle: d.y.atan2(d.x),
            scale: 1.0 / ipd,
            ipd,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        let (s, c) = (-self.angle).sin_cos();
        let t = p - self.origin;
        Point::new(c * t.x - s * t.y, s * t.x + c * t.y) * self.scale
    }
}

/// Translate, rotate and scale `points` so the eye midpoint is the origin,
/// the eye line lies along +x and the IPD is one unit.
pub fn normalize_to_eyes(points: &[Point], left_eye: Point, right_eye: Point) -> Vec<Point> {
    let frame = EyeFrame::from_eyes(left_eye, right_eye);
    points.iter().map(|p| frame.apply(*p)).collect()
}

/// Centres of the left and right eye rings, when the rings are present.
pub fn eye_centers(landmarks: &LandmarkSet, map: &RegionIndexMap) -> Option<(Point, Point)> {
    let anchors = map.anchors();
    let left = landmarks.mean_of(anchors.left_eye)?;
    let right = landmarks.mean_of(anchors.right_eye)?;
    Some((left, right))
}
