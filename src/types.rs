use serde::{Deserialize, Serialize};

/// A 2D point with double-precision coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Z component of the 2D cross product.
    pub fn cross(&self, other: &Point) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn dot(&self, other: &Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl std::ops::Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::AddAssign for Point {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Mul<f64> for Point {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

impl std::ops::Div<f64> for Point {
    type Output = Self;

    fn div(self, rhs: f64) -> Self::Output {
        Self {
            x: self.x / rhs,
            y: self.y / rhs,
        }
    }
}

/// A landmark position. `z` is absent for purely 2D detectors.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    pub const fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    pub fn xy(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

impl From<Point> for Point3 {
    fn from(p: Point) -> Self {
        Self::planar(p.x, p.y)
    }
}

/// An ordered set of face landmarks produced by an external detector.
///
/// Indices follow the detector's anatomical numbering and are never
/// reinterpreted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    points: Vec<Point3>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point3>) -> Self {
        Self { points }
    }

    pub fn from_planar(points: &[Point]) -> Self {
        Self {
            points: points.iter().copied().map(Point3::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Point3> {
        self.points.get(idx)
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    /// Projection onto the image plane.
    pub fn to_planar(&self) -> Vec<Point> {
        self.points.iter().map(Point3::xy).collect()
    }

    /// True when every point carries a z coordinate.
    pub fn has_depth(&self) -> bool {
        !self.points.is_empty() && self.points.iter().all(|p| p.z.is_some())
    }

    /// Fraction of points carrying a z coordinate.
    pub fn depth_fraction(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        let with_z = self.points.iter().filter(|p| p.z.is_some()).count();
        with_z as f64 / self.points.len() as f64
    }

    /// Gather the listed indices, or `None` if any of them is out of range.
    pub fn select(&self, indices: &[usize]) -> Option<Vec<Point>> {
        indices
            .iter()
            .map(|&i| self.points.get(i).map(Point3::xy))
            .collect()
    }

    /// Mean position of the listed indices that exist.
    pub fn mean_of(&self, indices: &[usize]) -> Option<Point> {
        let found: Vec<Point> = indices
            .iter()
            .filter_map(|&i| self.points.get(i).map(Point3::xy))
            .collect();
        centroid(&found)
    }
}

impl std::ops::Index<usize> for LandmarkSet {
    type Output = Point3;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.points[idx]
    }
}

/// Scale+translate mapping from a mask grid back to source-image pixels.
///
/// Grid coordinate `gx` in a grid `grid_width` wide maps to
/// `x + gx * width / grid_width`. Rotated crops are not representable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Crop covering a grid one-to-one at the origin.
    pub fn identity(grid_width: usize, grid_height: usize) -> Self {
        Self::new(0.0, 0.0, grid_width as f64, grid_height as f64)
    }

    pub fn grid_to_image(&self, p: Point, grid_width: usize, grid_height: usize) -> Point {
        let sx = self.width / grid_width.max(1) as f64;
        let sy = self.height / grid_height.max(1) as f64;
        Point::new(self.x + p.x * sx, self.y + p.y * sy)
    }

    pub fn image_to_grid(&self, p: Point, grid_width: usize, grid_height: usize) -> Point {
        let sx = if self.width.abs() > f64::EPSILON {
            grid_width as f64 / self.width
        } else {
            1.0
        };
        let sy = if self.height.abs() > f64::EPSILON {
            grid_height as f64 / self.height
        } else {
            1.0
        };
        Point::new((p.x - self.x) * sx, (p.y - self.y) * sy)
    }
}

/// Head orientation in degrees. Sign conventions:
/// yaw < 0 when the nose sits closer to the right cheek, pitch > 0 when the
/// face looks down, roll > 0 for a clockwise eye line.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FacePose {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub confidence: f64,
}

impl FacePose {
    pub const fn frontal() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            confidence: 1.0,
        }
    }

    pub fn is_frontal(&self, tolerance: f64) -> bool {
        self.yaw.abs() <= tolerance && self.pitch.abs() <= tolerance && self.roll.abs() <= tolerance
    }
}

/// An ordered outline. `open` polylines do not connect last to first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    pub points: Vec<Point>,
    pub open: bool,
}

impl Polygon {
    pub fn closed(points: Vec<Point>) -> Self {
        Self {
            points,
            open: false,
        }
    }

    pub fn polyline(points: Vec<Point>) -> Self {
        Self { points, open: true }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Mean of a point slice, `None` when empty.
pub fn centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let mut sum = Point::zero();
    for p in points {
        sum += *p;
    }
    Some(sum / points.len() as f64)
}
