//! Closed-form 2D Procrustes alignment of index-paired point sets.
//!
//! Point `i` of the source corresponds to point `i` of the target by position,
//! never by proximity. The fit removes translation, rotation and uniform scale;
//! whatever residual is left is shape difference.

use serde::{Deserialize, Serialize};

use crate::config::ProcrustesSettings;
use crate::error::{Error, Result};
use crate::types::{centroid, Point};

/// A similarity transform: `p' = scale * R(rotation) * p + translation`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityTransform {
    /// Counter-clockwise rotation in radians (in the points' own axes).
    pub rotation: f64,
    pub scale: f64,
    pub translation: Point,
}

impl SimilarityTransform {
    pub const fn identity() -> Self {
        Self {
            rotation: 0.0,
            scale: 1.0,
            translation: Point::zero(),
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        let (s, c) = self.rotation.sin_cos();
        Point::new(
            self.scale * (c * p.x - s * p.y) + self.translation.x,
            self.scale * (s * p.x + c * p.y) + self.translation.y,
        )
    }

    pub fn apply_all(&self, points: &[Point]) -> Vec<Point> {
        points.iter().map(|p| self.apply(*p)).collect()
    }
}

impl Default for SimilarityTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Outcome of aligning one point set onto another.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcrustesFit {
    pub transform: SimilarityTransform,
    /// Root-mean-square residual after alignment, in target units.
    pub rmse: f64,
    /// `exp(-rmse / tau)`: 1 for a perfect fit, falling toward 0.
    pub score: f64,
}

fn check_lengths(a: &[Point], b: &[Point]) -> Result<()> {
    if a.len() != b.len() {
        return Err(Error::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(())
}

/// Best similarity transform mapping `a` onto `b`.
///
/// With fewer than two points only the translation between centroids is
/// defined.
pub fn fit_similarity(a: &[Point], b: &[Point]) -> Result<SimilarityTransform> {
    check_lengths(a, b)?;

    let (Some(ca), Some(cb)) = (centroid(a), centroid(b)) else {
        return Ok(SimilarityTransform::identity());
    };
    if a.len() < 2 {
        return Ok(SimilarityTransform {
            translation: cb - ca,
            ..SimilarityTransform::identity()
        });
    }

    let mut cross = 0.0;
    let mut dot = 0.0;
    let mut sq_a = 0.0;
    let mut sq_b = 0.0;
    for (pa, pb) in a.iter().zip(b) {
        let da = *pa - ca;
        let db = *pb - cb;
        cross += db.x * da.y - db.y * da.x;
        dot += db.x * da.x + db.y * da.y;
        sq_a += da.dot(&da);
        sq_b += db.dot(&db);
    }

    // atan2(Σ(bx·ay − by·ax), Σ(bx·ax + by·ay)) is the clockwise angle from a
    // to b; negate it to get the counter-clockwise rotation applied to a.
    let rotation = -cross.atan2(dot);

    let n = a.len() as f64;
    let rms_a = (sq_a / n).sqrt();
    let rms_b = (sq_b / n).sqrt();
    let scale = if rms_a > f64::EPSILON { rms_b / rms_a } else { 1.0 };

    let mut transform = SimilarityTransform {
        rotation,
        scale,
        translation: Point::zero(),
    };
    transform.translation = cb - transform.apply(ca);
    Ok(transform)
}

/// Root-mean-square distance between paired points.
pub fn rmse(a: &[Point], b: &[Point]) -> Result<f64> {
    check_lengths(a, b)?;
    if a.is_empty() {
        return Ok(0.0);
    }
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(pa, pb)| {
            let d = *pa - *pb;
            d.dot(&d)
        })
        .sum();
    Ok((sum / a.len() as f64).sqrt())
}

/// Map an RMSE into (0, 1]: 1 at zero error, strictly decreasing.
pub fn similarity_score(rmse: f64, tau: f64) -> f64 {
    if !rmse.is_finite() {
        return 0.0;
    }
    let tau = if tau > 0.0 { tau } else { ProcrustesSettings::default().tau };
    (-rmse.max(0.0) / tau).exp()
}

/// Align `a` onto `b` and score the residual.
///
/// Sets of fewer than two points cannot define a rotation or scale; they
/// score 1 when identical and 0 otherwise.
pub fn align(a: &[Point], b: &[Point], settings: &ProcrustesSettings) -> Result<ProcrustesFit> {
    check_lengths(a, b)?;

    if a.len() < 2 {
        let residual = rmse(a, b)?;
        let score = if residual <= f64::EPSILON { 1.0 } else { 0.0 };
        return Ok(ProcrustesFit {
            transform: SimilarityTransform::identity(),
            rmse: residual,
            score,
        });
    }

    let transform = fit_similarity(a, b)?;
    let aligned = transform.apply_all(a);
    let residual = rmse(&aligned, b)?;

    Ok(ProcrustesFit {
        transform,
        rmse: residual,
        score: similarity_score(residual, settings.tau),
    })
}
