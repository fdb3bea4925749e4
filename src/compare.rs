//! The comparison pipeline: normalization, per-region landmark scoring, mask
//! scoring and score fusion.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{ComparisonSettings, FusionSettings};
use crate::error::{Error, Result};
use crate::mask::{score_mask_regions, MaskSummary, SegmentationMask};
use crate::normalize::{eye_centers, EyeFrame};
use crate::pose::{estimate_pose, frontalize};
use crate::regions::{FaceRegion, RegionIndexMap};
use crate::summary::{summarize_regions, summarize_regions_procrustes, RegionSummary};
use crate::types::{FacePose, LandmarkSet, Point};

/// Landmarks after pose correction and eye normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFace {
    pub points: Vec<Point>,
    pub pose: FacePose,
    /// `None` when the eye rings were missing and the points were left in place.
    pub frame: Option<EyeFrame>,
    /// Whether frontalization rotated the points.
    pub frontalized: bool,
}

/// Estimate pose, frontalize, then normalize to the eye frame.
pub fn normalize_landmarks(
    landmarks: &LandmarkSet,
    map: &RegionIndexMap,
    settings: &ComparisonSettings,
) -> NormalizedFace {
    let pose = estimate_pose(landmarks, map, &settings.pose);
    let front = frontalize(landmarks, &pose, &settings.pose);
    let frontalized = front.transformed;
    let planar = front.landmarks.to_planar();

    match eye_centers(&front.landmarks, map) {
        Some((left, right)) => {
            let frame = EyeFrame::from_eyes(left, right);
            NormalizedFace {
                points: planar.into_iter().map(|p| frame.apply(p)).collect(),
                pose,
                frame: Some(frame),
                frontalized,
            }
        }
        None => {
            debug!("eye rings missing; landmarks left unnormalized");
            NormalizedFace {
                points: planar,
                pose,
                frame: None,
                frontalized,
            }
        }
    }
}

/// Landmark-geometry comparison of two faces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkComparison {
    pub pose_a: FacePose,
    pub pose_b: FacePose,
    /// Region shape similarity after a per-region Procrustes fit.
    pub regions: RegionSummary,
    /// Region similarity in the shared eye frame, without re-alignment.
    pub placement: RegionSummary,
    pub overall: f64,
}

/// Compare two landmark sets of the same convention.
pub fn compare_landmarks(
    a: &LandmarkSet,
    b: &LandmarkSet,
    map: &RegionIndexMap,
    settings: &ComparisonSettings,
) -> Result<LandmarkComparison> {
    if a.len() != b.len() {
        return Err(Error::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let na = normalize_landmarks(a, map, settings);
    let nb = normalize_landmarks(b, map, settings);

    let regions = summarize_regions_procrustes(&na.points, &nb.points, map, &settings.procrustes);
    let placement = summarize_regions(&na.points, &nb.points, map, &settings.procrustes);
    let overall = regions.overall;

    Ok(LandmarkComparison {
        pose_a: na.pose,
        pose_b: nb.pose,
        regions,
        placement,
        overall,
    })
}

/// Compare two segmentation masks region by region.
pub fn compare_masks(
    a: &SegmentationMask,
    b: &SegmentationMask,
    map: &RegionIndexMap,
    settings: &ComparisonSettings,
) -> MaskSummary {
    score_mask_regions(a, b, map, &settings.mask)
}

/// A region's fused score and the signals behind it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusedRegionScore {
    pub region: FaceRegion,
    pub score: f64,
    pub landmark: Option<f64>,
    pub mask: Option<f64>,
}

/// Final report combining landmark and mask similarity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceComparison {
    /// Best region first.
    pub regions: Vec<FusedRegionScore>,
    pub overall: f64,
    pub landmark_overall: Option<f64>,
    pub mask_overall: Option<f64>,
}

fn blend(landmark: Option<f64>, mask: Option<f64>, weight: f64) -> Option<f64> {
    match (landmark, mask) {
        (Some(l), Some(m)) => Some((weight * l + (1.0 - weight) * m).clamp(0.0, 1.0)),
        (Some(s), None) | (None, Some(s)) => Some(s),
        (None, None) => None,
    }
}

/// Merge landmark and mask scores into one report.
///
/// Where both signals cover a region they are mixed by
/// `settings.landmark_weight`; otherwise the available one is used as is.
/// Mask regions absent from both faces carry no signal and are left out.
pub fn fuse(
    landmark: Option<&LandmarkComparison>,
    mask: Option<&MaskSummary>,
    settings: &FusionSettings,
) -> FaceComparison {
    let weight = if settings.landmark_weight.is_finite() {
        settings.landmark_weight.clamp(0.0, 1.0)
    } else {
        FusionSettings::default().landmark_weight
    };

    let mut regions: Vec<FusedRegionScore> = FaceRegion::ALL
        .iter()
        .filter_map(|&region| {
            let l = landmark.and_then(|c| c.regions.get(region)).map(|r| r.score);
            let m = mask
                .and_then(|s| s.get(region))
                .filter(|r| r.present)
                .map(|r| r.score);
            blend(l, m, weight).map(|score| FusedRegionScore {
                region,
                score,
                landmark: l,
                mask: m,
            })
        })
        .collect();
    regions.sort_by(|x, y| y.score.total_cmp(&x.score));

    let landmark_overall = landmark.map(|c| c.overall);
    let mask_overall = mask.map(|s| s.overall);
    let overall = blend(landmark_overall, mask_overall, weight).unwrap_or(0.0);

    FaceComparison {
        regions,
        overall,
        landmark_overall,
        mask_overall,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::MaskRegionScore;
    use crate::summary::RegionScore;

    fn landmark_report(scores: &[(FaceRegion, f64)], overall: f64) -> LandmarkComparison {
        let regions = RegionSummary {
            regions: scores
                .iter()
                .map(|&(region, score)| RegionScore {
                    region,
                    score,
                    rmse: 0.0,
                    points: 10,
                })
                .collect(),
            overall,
        };
        LandmarkComparison {
            pose_a: FacePose::frontal(),
            pose_b: FacePose::frontal(),
            placement: regions.clone(),
            regions,
            overall,
        }
    }

    fn mask_score(region: FaceRegion, score: f64, present: bool) -> MaskRegionScore {
        MaskRegionScore {
            region,
            area_a: 10,
            area_b: 10,
            iou: score,
            dice: score,
            centroid_distance: 0.0,
            area_similarity: 1.0,
            score,
            present,
        }
    }

    #[test]
    fn fuse_mixes_shared_regions() {
        let landmark = landmark_report(&[(FaceRegion::Eyes, 1.0), (FaceRegion::Jaw, 0.5)], 0.75);
        let mask = MaskSummary {
            regions: vec![
                mask_score(FaceRegion::Eyes, 0.5, true),
                mask_score(FaceRegion::Hair, 0.9, true),
                mask_score(FaceRegion::Ears, 1.0, false),
            ],
            overall: 0.7,
        };

        let report = fuse(Some(&landmark), Some(&mask), &FusionSettings { landmark_weight: 0.6 });

        let eyes = report.regions.iter().find(|r| r.region == FaceRegion::Eyes).unwrap();
        assert!((eyes.score - 0.8).abs() < 1e-12);
        assert_eq!(eyes.landmark, Some(1.0));
        assert_eq!(eyes.mask, Some(0.5));

        let hair = report.regions.iter().find(|r| r.region == FaceRegion::Hair).unwrap();
        assert_eq!(hair.score, 0.9);
        assert!(report.regions.iter().all(|r| r.region != FaceRegion::Ears));

        assert!((report.overall - (0.6 * 0.75 + 0.4 * 0.7)).abs() < 1e-12);
        assert!(report.regions.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn fuse_with_one_signal() {
        let landmark = landmark_report(&[(FaceRegion::Nose, 0.4)], 0.4);
        let report = fuse(Some(&landmark), None, &FusionSettings::default());
        assert_eq!(report.overall, 0.4);
        assert_eq!(report.mask_overall, None);

        let empty = fuse(None, None, &FusionSettings::default());
        assert!(empty.regions.is_empty());
        assert_eq!(empty.overall, 0.0);
    }

    #[test]
    fn compare_rejects_mismatched_sets() {
        let a = LandmarkSet::from_planar(&[Point::zero(); 68]);
        let b = LandmarkSet::from_planar(&[Point::zero(); 67]);
        let settings = ComparisonSettings::default();
        let err = compare_landmarks(&a, &b, RegionIndexMap::ibug68(), &settings).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { left: 68, right: 67 }));
    }

    #[test]
    fn normalize_without_eyes_keeps_points() {
        let points = vec![Point::new(3.0, 4.0); 10];
        let set = LandmarkSet::from_planar(&points);
        let settings = ComparisonSettings::default();
        let face = normalize_landmarks(&set, RegionIndexMap::ibug68(), &settings);

        assert!(face.frame.is_none());
        assert!(!face.frontalized);
        assert_eq!(face.points, points);
    }
}
