//! Per-region landmark similarity and its aggregate.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::ProcrustesSettings;
use crate::procrustes::{align, rmse, similarity_score};
use crate::regions::{FaceRegion, RegionIndexMap};
use crate::types::Point;

/// Similarity of one region between two faces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionScore {
    pub region: FaceRegion,
    /// Similarity in [0, 1].
    pub score: f64,
    /// Residual behind the score, in normalized units.
    pub rmse: f64,
    /// Number of landmarks compared; the region's weight in the overall score.
    pub points: usize,
}

/// Region scores plus their point-weighted mean.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionSummary {
    pub regions: Vec<RegionScore>,
    /// Weighted mean of the region scores; 0 when no region could be scored.
    pub overall: f64,
}

impl RegionSummary {
    fn from_scores(regions: Vec<RegionScore>) -> Self {
        let total: usize = regions.iter().map(|r| r.points).sum();
        let overall = if total == 0 {
            0.0
        } else {
            let weighted: f64 = regions.iter().map(|r| r.score * r.points as f64).sum();
            // Rounding can push a weighted mean of equal scores a hair outside
            // the [min, max] envelope.
            let (lo, hi) = regions.iter().fold((f64::MAX, f64::MIN), |(lo, hi), r| {
                (lo.min(r.score), hi.max(r.score))
            });
            (weighted / total as f64).clamp(lo, hi)
        };
        Self { regions, overall }
    }

    pub fn get(&self, region: FaceRegion) -> Option<&RegionScore> {
        self.regions.iter().find(|r| r.region == region)
    }
}

/// Pull a region's points out of both sets, or `None` when either lacks an index.
fn region_points(
    a: &[Point],
    b: &[Point],
    indices: &[usize],
) -> Option<(Vec<Point>, Vec<Point>)> {
    let pick = |set: &[Point]| -> Option<Vec<Point>> {
        indices.iter().map(|&i| set.get(i).copied()).collect()
    };
    Some((pick(a)?, pick(b)?))
}

/// Score each landmark region with a fresh Procrustes fit.
///
/// Both inputs are expected in the same normalized frame (see
/// [`crate::normalize`]). Regions referencing an index missing from either
/// set are skipped.
pub fn summarize_regions_procrustes(
    a: &[Point],
    b: &[Point],
    map: &RegionIndexMap,
    settings: &ProcrustesSettings,
) -> RegionSummary {
    let mut scores = Vec::new();

    for (region, indices) in map.landmark_regions() {
        let Some((pa, pb)) = region_points(a, b, indices) else {
            debug!("skipping {region}: landmark index out of range");
            continue;
        };
        match align(&pa, &pb, settings) {
            Ok(fit) => scores.push(RegionScore {
                region,
                score: fit.score,
                rmse: fit.rmse,
                points: indices.len(),
            }),
            Err(e) => debug!("skipping {region}: {e}"),
        }
    }

    RegionSummary::from_scores(scores)
}

/// Score each landmark region by its direct residual in the shared frame.
///
/// Unlike [`summarize_regions_procrustes`] this keeps each region's position,
/// size and tilt relative to the eyes as part of the comparison.
pub fn summarize_regions(
    a: &[Point],
    b: &[Point],
    map: &RegionIndexMap,
    settings: &ProcrustesSettings,
) -> RegionSummary {
    let mut scores = Vec::new();

    for (region, indices) in map.landmark_regions() {
        let Some((pa, pb)) = region_points(a, b, indices) else {
            debug!("skipping {region}: landmark index out of range");
            continue;
        };
        match rmse(&pa, &pb) {
            Ok(residual) => scores.push(RegionScore {
                region,
                score: similarity_score(residual, settings.tau),
                rmse: residual,
                points: indices.len(),
            }),
            Err(e) => debug!("skipping {region}: {e}"),
        }
    }

    RegionSummary::from_scores(scores)
}
