//! Synthetic fixtures shared by the integration tests.
#![allow(dead_code)]

use std::f64::consts::PI;

use face_compare::regions::class;
use face_compare::{
    CropRect, FaceRegion, LandmarkSet, LogitClass, ParsingLogits, Point, Point3, RegionIndexMap,
    SegmentationMask,
};

/// Image position of the face origin (midpoint between the eyes).
pub const ORIGIN: Point = Point::new(320.0, 240.0);
/// Distance between the eye centres, in pixels.
pub const IPD: f64 = 60.0;

/// Half-width and depth of the lower jaw, relative to `JAW_TOP`.
const JAW_HALF_WIDTH: f64 = 70.0;
const JAW_DEPTH: f64 = 60.0;
const JAW_TOP: f64 = 20.0;

fn ring(points: &mut [Option<Point>], indices: &[usize], centre: Point, rx: f64, ry: f64) {
    let n = indices.len() as f64;
    for (k, &i) in indices.iter().enumerate() {
        let a = 2.0 * PI * k as f64 / n;
        points[i] = Some(Point::new(centre.x + rx * a.cos(), centre.y + ry * a.sin()));
    }
}

/// Lower jaw point at parameter `t` in [0, 1], image-left cheek to image-right cheek.
fn jaw_point(t: f64) -> Point {
    let a = PI * t;
    Point::new(-JAW_HALF_WIDTH * a.cos(), JAW_TOP + JAW_DEPTH * a.sin())
}

/// A frontal, left-right symmetric MediaPipe face in image coordinates, with
/// depth on every point.
pub fn synthetic_face() -> LandmarkSet {
    let map = RegionIndexMap::mediapipe();
    let anchors = map.anchors();
    let mut rel: Vec<Option<Point>> = vec![None; map.landmark_count()];

    ring(&mut rel, anchors.left_eye, Point::new(-IPD / 2.0, 0.0), 12.0, 5.0);
    ring(&mut rel, anchors.right_eye, Point::new(IPD / 2.0, 0.0), 12.0, 5.0);

    let brows = map.landmark_indices(FaceRegion::Brows);
    let (left_brow, right_brow) = brows.split_at(brows.len() / 2);
    for (side, indices) in [(-1.0, left_brow), (1.0, right_brow)] {
        let n = indices.len() as f64;
        for (k, &i) in indices.iter().enumerate() {
            let t = k as f64 / (n - 1.0);
            let x = side * (IPD / 2.0 + 16.0 * (t - 0.5) * 2.0);
            rel[i] = Some(Point::new(x, -16.0 - 4.0 * (PI * t).sin()));
        }
    }

    for (k, &i) in map.landmark_indices(FaceRegion::Nose).iter().enumerate() {
        let t = k as f64 / 19.0;
        rel[i] = Some(Point::new(9.0 * (k as f64 * 1.3).sin(), -4.0 + 44.0 * t));
    }
    rel[anchors.nose_tip] = Some(Point::new(0.0, 0.7 * IPD));

    ring(
        &mut rel,
        map.landmark_indices(FaceRegion::Mouth),
        Point::new(0.0, 62.0),
        22.0,
        8.0,
    );

    let jaw = anchors.jaw_outline;
    let last = (jaw.len() - 1) as f64;
    for (k, &i) in jaw.iter().enumerate() {
        rel[i] = Some(jaw_point(k as f64 / last));
    }

    let points = rel
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            let t = i as f64;
            let p = p.unwrap_or_else(|| {
                Point::new(50.0 * (t * 0.7).sin(), 10.0 + 40.0 * (t * 1.3).cos())
            });
            let z = 15.0 * (p.x / JAW_HALF_WIDTH).cos() - 0.05 * p.y;
            Point3::new(ORIGIN.x + p.x, ORIGIN.y + p.y, z)
        })
        .collect();
    LandmarkSet::new(points)
}

/// Small deterministic displacement of every point by at most `amplitude`.
pub fn jitter(set: &LandmarkSet, amplitude: f64, seed: f64) -> LandmarkSet {
    let points = set
        .points()
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let t = i as f64 * 1.618 + seed;
            Point3 {
                x: p.x + amplitude * (t * 3.1).sin(),
                y: p.y + amplitude * (t * 2.3).cos(),
                z: p.z,
            }
        })
        .collect();
    LandmarkSet::new(points)
}

/// Apply an in-plane rotation (radians), scale and translation to every point.
pub fn transform(set: &LandmarkSet, rotation: f64, scale: f64, shift: Point) -> LandmarkSet {
    let (s, c) = rotation.sin_cos();
    let points = set
        .points()
        .iter()
        .map(|p| Point3 {
            x: scale * (c * p.x - s * p.y) + shift.x,
            y: scale * (s * p.x + c * p.y) + shift.y,
            z: p.z.map(|z| z * scale),
        })
        .collect();
    LandmarkSet::new(points)
}

/// Crop covering the synthetic face: 200x200 pixels around the origin.
pub fn face_crop() -> CropRect {
    CropRect::new(ORIGIN.x - 100.0, ORIGIN.y - 80.0, 200.0, 200.0)
}

/// Face-relative position of a grid cell centre.
fn cell_to_face(crop: &CropRect, x: usize, y: usize, size: usize) -> Point {
    crop.grid_to_image(Point::new(x as f64 + 0.5, y as f64 + 0.5), size, size) - ORIGIN
}

fn inside_ellipse(p: Point, centre: Point, rx: f64, ry: f64) -> bool {
    let d = p - centre;
    (d.x / rx).powi(2) + (d.y / ry).powi(2) <= 1.0
}

/// Whether a face-relative position lies on facial skin.
fn on_face(p: Point) -> bool {
    if p.x.abs() > JAW_HALF_WIDTH {
        return false;
    }
    if p.y <= JAW_TOP {
        return p.y > -50.0;
    }
    inside_ellipse(p, Point::new(0.0, JAW_TOP), JAW_HALF_WIDTH, JAW_DEPTH)
}

/// Label image matching [`synthetic_face`] on a `size` x `size` grid.
pub fn face_mask(size: usize) -> SegmentationMask {
    let crop = face_crop();
    let mut labels = Vec::with_capacity(size * size);
    for y in 0..size {
        for x in 0..size {
            let p = cell_to_face(&crop, x, y, size);
            let label = if inside_ellipse(p, Point::new(-IPD / 2.0, 0.0), 12.0, 5.0) {
                class::LEFT_EYE
            } else if inside_ellipse(p, Point::new(IPD / 2.0, 0.0), 12.0, 5.0) {
                class::RIGHT_EYE
            } else if inside_ellipse(p, Point::new(-IPD / 2.0, -18.0), 16.0, 3.0) {
                class::LEFT_BROW
            } else if inside_ellipse(p, Point::new(IPD / 2.0, -18.0), 16.0, 3.0) {
                class::RIGHT_BROW
            } else if inside_ellipse(p, Point::new(0.0, 22.0), 9.0, 20.0) {
                class::NOSE
            } else if inside_ellipse(p, Point::new(0.0, 58.0), 22.0, 4.0) {
                class::UPPER_LIP
            } else if inside_ellipse(p, Point::new(0.0, 66.0), 22.0, 4.0) {
                class::LOWER_LIP
            } else if on_face(p) {
                class::SKIN
            } else if p.y < -50.0 {
                class::HAIR
            } else if p.x.abs() < 45.0 {
                class::NECK
            } else {
                class::BACKGROUND
            };
            labels.push(label);
        }
    }
    SegmentationMask::new(size, size, labels, crop).unwrap()
}

/// Skin and neck logits whose skin edge follows the synthetic jaw.
pub fn face_logits(size: usize) -> ParsingLogits {
    let crop = face_crop();
    let mut skin = Vec::with_capacity(size * size);
    for y in 0..size {
        for x in 0..size {
            let p = cell_to_face(&crop, x, y, size);
            skin.push(if on_face(p) { 4.0 } else { -4.0 });
        }
    }
    let neck = skin.iter().map(|v| -v).collect();
    ParsingLogits::new(size, size, crop)
        .with_plane(LogitClass::Skin, skin)
        .unwrap()
        .with_plane(LogitClass::Neck, neck)
        .unwrap()
}
