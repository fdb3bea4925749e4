//! Row-major scalar grids and sub-pixel sampling.

use serde::{Deserialize, Serialize};

/// Trait for reading per-cell scalar values from a grid.
pub trait GridAccess {
    /// Value at (x, y). Out-of-bounds coordinates clamp to the nearest edge.
    fn value(&self, x: i64, y: i64) -> f32;

    /// Grid dimensions.
    fn width(&self) -> usize;
    fn height(&self) -> usize;
}

/// A dense float plane, one value per grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PlaneParts")]
pub struct ScalarPlane {
    data: Vec<f32>,
    width: usize,
    height: usize,
}

/// Unchecked wire form of [`ScalarPlane`].
#[derive(Deserialize)]
struct PlaneParts {
    data: Vec<f32>,
    width: usize,
    height: usize,
}

impl TryFrom<PlaneParts> for ScalarPlane {
    type Error = String;

    fn try_from(parts: PlaneParts) -> Result<Self, Self::Error> {
        let len = parts.data.len();
        let (width, height) = (parts.width, parts.height);
        Self::new(parts.data, width, height)
            .ok_or_else(|| format!("{len} values for a {width}x{height} plane"))
    }
}

impl ScalarPlane {
    /// Returns `None` when `data` does not hold exactly `width * height` values.
    pub fn new(data: Vec<f32>, width: usize, height: usize) -> Option<Self> {
        if data.len() != width * height {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
        })
    }

    pub fn from_fn<F>(width: usize, height: usize, f: F) -> Self
    where
        F: Fn(usize, usize) -> f32,
    {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            data,
            width,
            height,
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

impl GridAccess for ScalarPlane {
    fn value(&self, x: i64, y: i64) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let cx = x.clamp(0, self.width as i64 - 1) as usize;
        let cy = y.clamp(0, self.height as i64 - 1) as usize;
        self.data[cy * self.width + cx]
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }
}

/// Sample a grid with bilinear interpolation for sub-cell accuracy.
#[inline]
pub fn sample_bilinear<G: GridAccess + ?Sized>(grid: &G, x: f64, y: f64) -> f64 {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let x1 = x0 + 1;
    let y1 = y0 + 1;

    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = grid.value(x0, y0) as f64;
    let p10 = grid.value(x1, y0) as f64;
    let p01 = grid.value(x0, y1) as f64;
    let p11 = grid.value(x1, y1) as f64;

    let top = p00 * (1.0 - fx) + p10 * fx;
    let bottom = p01 * (1.0 - fx) + p11 * fx;
    top * (1.0 - fy) + bottom * fy
}
