//! Head pose estimation from landmark geometry, and rotation back to a
//! frontal pose.
//!
//! The estimate is a cheap geometric one, not a PnP solve:
//!
//! - **yaw** from the asymmetry of the nose tip between the two cheek anchors,
//! - **pitch** from how far the nose tip drops below the eye line, in IPD units,
//! - **roll** from the slope of the eye line.
//!
//! Sign conventions are part of the interface. Yaw is negative when the nose
//! tip sits closer to the right (image-right) cheek, pitch is positive when the
//! face looks down, and roll is positive when the eye line is rotated clockwise
//! on screen.

use std::borrow::Cow;

use log::{debug, trace};

use crate::config::PoseSettings;
use crate::regions::RegionIndexMap;
use crate::types::{FacePose, LandmarkSet, Point, Point3};

/// Estimate head pose from a landmark set.
///
/// Missing anchors never fail the estimate: the affected angle falls back to
/// zero and the confidence drops with the fraction of anchors found.
pub fn estimate_pose(
    landmarks: &LandmarkSet,
    map: &RegionIndexMap,
    settings: &PoseSettings,
) -> FacePose {
    let anchors = map.anchors();

    let required: Vec<usize> = anchors.pose_indices().collect();
    let present = required.iter().filter(|&&i| i < landmarks.len()).count();
    let completeness = if required.is_empty() {
        0.0
    } else {
        present as f64 / required.len() as f64
    };

    let nose = landmarks.get(anchors.nose_tip).map(Point3::xy);
    let left_cheek = landmarks.get(anchors.left_cheek).map(Point3::xy);
    let right_cheek = landmarks.get(anchors.right_cheek).map(Point3::xy);
    let left_eye = landmarks.mean_of(anchors.left_eye);
    let right_eye = landmarks.mean_of(anchors.right_eye);

    let yaw = match (nose, left_cheek, right_cheek) {
        (Some(n), Some(l), Some(r)) => yaw_from_cheeks(n, l, r, settings.yaw_gain_deg),
        _ => {
            debug!("yaw anchors missing; assuming zero yaw");
            0.0
        }
    };

    let (roll, pitch) = match (left_eye, right_eye) {
        (Some(l), Some(r)) => {
            let roll = roll_from_eyes(l, r);
            let pitch = nose
                .map(|n| pitch_from_nose(n, l, r, settings))
                .unwrap_or(0.0);
            (roll, pitch)
        }
        _ => {
            debug!("eye anchors missing; assuming zero roll and pitch");
            (0.0, 0.0)
        }
    };

    let depth_weight = 0.8 + 0.2 * landmarks.depth_fraction();

    FacePose {
        yaw,
        pitch,
        roll,
        confidence: (completeness * depth_weight).clamp(0.0, 1.0),
    }
}

fn yaw_from_cheeks(nose: Point, left: Point, right: Point, gain: f64) -> f64 {
    let left_dist = nose.distance(&left);
    let right_dist = nose.distance(&right);
    let total = left_dist + right_dist;
    if total < 1e-12 {
        return 0.0;
    }
    let asymmetry = (right_dist - left_dist) / total;
    clamp_angle(asymmetry * gain)
}

fn roll_from_eyes(left: Point, right: Point) -> f64 {
    let d = right - left;
    if d.norm() < 1e-12 {
        return 0.0;
    }
    // Image y points down, so a positive atan2 is a clockwise tilt on screen.
    clamp_angle(d.y.atan2(d.x).to_degrees())
}

fn pitch_from_nose(nose: Point, left: Point, right: Point, settings: &PoseSettings) -> f64 {
    let d = right - left;
    let ipd = d.norm();
    if ipd < 1e-12 {
        return 0.0;
    }
    let along = d / ipd;
    // Unit normal to the eye line pointing toward the chin.
    let down = Point::new(-along.y, along.x);
    let mid = (left + right) * 0.5;
    let drop = (nose - mid).dot(&down) / ipd;
    clamp_angle((drop - settings.nominal_nose_drop) * settings.pitch_gain_deg)
}

fn clamp_angle(deg: f64) -> f64 {
    if deg.is_finite() {
        deg.clamp(-90.0, 90.0)
    } else {
        0.0
    }
}

/// Result of [`frontalize`].
#[derive(Debug, Clone)]
pub struct Frontalized<'a> {
    pub landmarks: Cow<'a, LandmarkSet>,
    /// False when the input was already frontal and returned untouched.
    pub transformed: bool,
}

impl Frontalized<'_> {
    pub fn into_owned(self) -> LandmarkSet {
        self.landmarks.into_owned()
    }
}

/// Rotate landmarks about their centroid to undo `pose`.
///
/// A pose within `settings.frontal_tolerance_deg` of zero returns the input
/// by reference without any arithmetic. Missing z coordinates are treated as
/// zero during rotation and stay missing in the output.
pub fn frontalize<'a>(
    landmarks: &'a LandmarkSet,
    pose: &FacePose,
    settings: &PoseSettings,
) -> Frontalized<'a> {
    if pose.is_frontal(settings.frontal_tolerance_deg) || landmarks.is_empty() {
        trace!("pose already frontal; skipping rotation");
        return Frontalized {
            landmarks: Cow::Borrowed(landmarks),
            transformed: false,
        };
    }

    let rotation = Rotation3::inverse_of(pose);
    let center = centroid3(landmarks.points());

    let points = landmarks
        .points()
        .iter()
        .map(|p| {
            let v = [
                p.x - center[0],
                p.y - center[1],
                p.z.unwrap_or(0.0) - center[2],
            ];
            let r = rotation.apply(v);
            Point3 {
                x: r[0] + center[0],
                y: r[1] + center[1],
                z: p.z.map(|_| r[2] + center[2]),
            }
        })
        .collect();

    Frontalized {
        landmarks: Cow::Owned(LandmarkSet::new(points)),
        transformed: true,
    }
}

/// Mean position with missing z counted as zero.
fn centroid3(points: &[Point3]) -> [f64; 3] {
    if points.is_empty() {
        return [0.0; 3];
    }
    let n = points.len() as f64;
    let mut sum = [0.0; 3];
    for p in points {
        sum[0] += p.x;
        sum[1] += p.y;
        sum[2] += p.z.unwrap_or(0.0);
    }
    [sum[0] / n, sum[1] / n, sum[2] / n]
}

/// Row-major 3x3 rotation matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation3 {
    m: [[f64; 3]; 3],
}

impl Rotation3 {
    /// Rotation Rz(roll) · Ry(yaw) · Rx(pitch), angles in degrees.
    pub fn from_pose(yaw: f64, pitch: f64, roll: f64) -> Self {
        let rx = Self::about_x(pitch.to_radians());
        let ry = Self::about_y(yaw.to_radians());
        let rz = Self::about_z(roll.to_radians());
        rz.compose(&ry).compose(&rx)
    }

    /// Inverse of [`Rotation3::from_pose`]: Rx(−pitch) · Ry(−yaw) · Rz(−roll).
    pub fn inverse_of(pose: &FacePose) -> Self {
        let rx = Self::about_x(-pose.pitch.to_radians());
        let ry = Self::about_y(-pose.yaw.to_radians());
        let rz = Self::about_z(-pose.roll.to_radians());
        rx.compose(&ry).compose(&rz)
    }

    fn about_x(a: f64) -> Self {
        let (s, c) = a.sin_cos();
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, c, -s], [0.0, s, c]],
        }
    }

    fn about_y(a: f64) -> Self {
        let (s, c) = a.sin_cos();
        Self {
            m: [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]],
        }
    }

    fn about_z(a: f64) -> Self {
        let (s, c) = a.sin_cos();
        Self {
            m: [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Matrix product `self · other`.
    pub fn compose(&self, other: &Rotation3) -> Rotation3 {
        let mut m = [[0.0; 3]; 3];
        for (i, row) in m.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.m[i][k] * other.m[k][j]).sum();
            }
        }
        Rotation3 { m }
    }

    pub fn apply(&self, v: [f64; 3]) -> [f64; 3] {
        let m = &self.m;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::{FaceRegion, LandmarkAnchors};

    const TINY_EYE_L: &[usize] = &[0];
    const TINY_EYE_R: &[usize] = &[1];
    const TINY_REGIONS: &[(FaceRegion, &[usize])] = &[(FaceRegion::Eyes, &[0, 1])];

    /// Five-point layout: left eye, right eye, nose tip, left cheek, right cheek.
    fn tiny_map() -> RegionIndexMap {
        RegionIndexMap::new(
            "tiny",
            5,
            TINY_REGIONS,
            &[],
            LandmarkAnchors {
                left_eye: TINY_EYE_L,
                right_eye: TINY_EYE_R,
                nose_tip: 2,
                left_cheek: 3,
                right_cheek: 4,
                jaw_outline: &[3, 4],
                left_gonion: 3,
                right_gonion: 4,
            },
        )
    }

    fn face(nose_x: f64, nose_y: f64, right_eye_y: f64) -> Vec<Point> {
        vec![
            Point::new(30.0, 40.0),
            Point::new(70.0, right_eye_y),
            Point::new(nose_x, nose_y),
            Point::new(10.0, 60.0),
            Point::new(90.0, 60.0),
        ]
    }

    fn settings() -> PoseSettings {
        PoseSettings::default()
    }

    #[test]
    fn symmetric_face_has_zero_yaw_and_roll() {
        // Nose drop of 0.7 IPD (40 * 0.7 = 28) matches the nominal ratio.
        let set = LandmarkSet::from_planar(&face(50.0, 68.0, 40.0));
        let pose = estimate_pose(&set, &tiny_map(), &settings());

        assert!(pose.yaw.abs() < 1e-9);
        assert!(pose.roll.abs() < 1e-9);
        assert!(pose.pitch.abs() < 1e-9);
    }

    #[test]
    fn yaw_sign_follows_nose_position() {
        let map = tiny_map();

        let set = LandmarkSet::from_planar(&face(75.0, 68.0, 40.0));
        let toward_right = estimate_pose(&set, &map, &settings());
        assert!(toward_right.yaw < 0.0, "yaw {}", toward_right.yaw);

        let set = LandmarkSet::from_planar(&face(25.0, 68.0, 40.0));
        let toward_left = estimate_pose(&set, &map, &settings());
        assert!(toward_left.yaw > 0.0, "yaw {}", toward_left.yaw);
        assert!((toward_left.yaw + toward_right.yaw).abs() < 1e-9);
    }

    #[test]
    fn pitch_positive_when_nose_drops() {
        let set = LandmarkSet::from_planar(&face(50.0, 80.0, 40.0));
        let pose = estimate_pose(&set, &tiny_map(), &settings());
        assert!(pose.pitch > 0.0);

        let set = LandmarkSet::from_planar(&face(50.0, 55.0, 40.0));
        let pose = estimate_pose(&set, &tiny_map(), &settings());
        assert!(pose.pitch < 0.0);
    }

    #[test]
    fn roll_positive_when_right_eye_lower() {
        // y grows downward, so a lower right eye is a clockwise tilt.
        let set = LandmarkSet::from_planar(&face(50.0, 68.0, 50.0));
        let pose = estimate_pose(&set, &tiny_map(), &settings());
        assert!(pose.roll > 0.0);
        assert!((pose.roll - (10.0f64).atan2(40.0).to_degrees()).abs() < 1e-9);
    }

    #[test]
    fn angles_are_clamped() {
        let mut s = settings();
        s.yaw_gain_deg = 1000.0;
        let set = LandmarkSet::from_planar(&face(85.0, 68.0, 40.0));
        let pose = estimate_pose(&set, &tiny_map(), &s);
        assert_eq!(pose.yaw, -90.0);
    }

    #[test]
    fn depth_raises_confidence() {
        let planar = face(50.0, 68.0, 40.0);
        let flat = LandmarkSet::from_planar(&planar);
        let deep = LandmarkSet::new(planar.iter().map(|p| Point3::new(p.x, p.y, 0.0)).collect());

        let map = tiny_map();
        let flat_pose = estimate_pose(&flat, &map, &settings());
        let deep_pose = estimate_pose(&deep, &map, &settings());
        assert!(deep_pose.confidence >= flat_pose.confidence);
        assert!((deep_pose.confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn missing_anchors_lower_confidence_without_failing() {
        let planar = face(50.0, 68.0, 40.0);
        let truncated = LandmarkSet::from_planar(&planar[..3]);
        let pose = estimate_pose(&truncated, &tiny_map(), &settings());

        assert_eq!(pose.yaw, 0.0);
        assert!(pose.confidence < 0.8);
        assert!(pose.confidence > 0.0);

        let empty = estimate_pose(&LandmarkSet::new(Vec::new()), &tiny_map(), &settings());
        assert_eq!(empty.confidence, 0.0);
    }

    #[test]
    fn frontal_pose_is_returned_by_reference() {
        let set = LandmarkSet::from_planar(&face(50.0, 68.0, 40.0));
        let out = frontalize(&set, &FacePose::frontal(), &settings());

        assert!(!out.transformed);
        assert!(matches!(out.landmarks, Cow::Borrowed(_)));
    }

    #[test]
    fn rotation_preserves_centroid_and_length() {
        let set = LandmarkSet::new(vec![
            Point3::new(10.0, 20.0, 5.0),
            Point3::planar(40.0, 25.0),
            Point3::new(30.0, 60.0, -3.0),
            Point3::new(15.0, 45.0, 1.0),
        ]);
        let pose = FacePose {
            yaw: 25.0,
            pitch: -12.0,
            roll: 8.0,
            confidence: 1.0,
        };
        let out = frontalize(&set, &pose, &settings());
        assert!(out.transformed);
        assert_eq!(out.landmarks.len(), set.len());

        let before = centroid3(set.points());
        let after = centroid3(out.landmarks.points());
        // The planar point's rotated z is dropped, so only x/y are comparable.
        assert!((before[0] - after[0]).abs() < 1e-5);
        assert!((before[1] - after[1]).abs() < 1e-5);
        assert!(out.landmarks[1].z.is_none());
    }

    #[test]
    fn inverse_rotation_undoes_forward() {
        let pose = FacePose {
            yaw: 30.0,
            pitch: 10.0,
            roll: -20.0,
            confidence: 1.0,
        };
        let forward = Rotation3::from_pose(pose.yaw, pose.pitch, pose.roll);
        let inverse = Rotation3::inverse_of(&pose);

        let v = [1.0, -2.0, 0.5];
        let back = inverse.apply(forward.apply(v));
        for k in 0..3 {
            assert!((back[k] - v[k]).abs() < 1e-12);
        }
    }

    #[test]
    fn roll_only_pose_levels_the_eye_line() {
        let set = LandmarkSet::from_planar(&face(50.0, 68.0, 50.0));
        let map = tiny_map();
        let pose = estimate_pose(&set, &map, &settings());
        let out = frontalize(&set, &pose, &settings());

        let l = out.landmarks[0];
        let r = out.landmarks[1];
        assert!((l.y - r.y).abs() < 1e-9);
    }
}
