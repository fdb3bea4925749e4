//! # face-compare
//!
//! Pure Rust face comparison from landmark geometry and face-parsing masks.
//!
//! This crate provides:
//! - **Pose**: yaw/pitch/roll estimation from landmarks and frontalization
//! - **Normalization**: eye-centred, IPD-unit coordinates
//! - **Shape similarity**: per-region Procrustes alignment and scoring
//! - **Mask similarity**: IoU, Dice, centroid and area agreement per region
//! - **Outlines**: convex/concave hulls, RDP simplification, polygon offsets,
//!   and jawline refinement from parsing logits
//!
//! The crate does no detection or inference. Landmarks, masks and logits come
//! from external models; every operation here is a pure function of them.
//!
//! ## Pipeline
//!
//! 1. Estimate head pose and rotate the landmarks back to frontal
//! 2. Move the eye midpoint to the origin, the eye line onto +x, IPD to 1
//! 3. For each region, fit a similarity transform and score the residual
//!    as `exp(-rmse / tau)`
//! 4. Independently, score each parsing region of the two masks
//! 5. Fuse both signals into one per-region and overall report
//!
//! ## Quick Start
//!
//! ```rust
//! use face_compare::{
//!     compare_landmarks, fuse, ComparisonSettings, LandmarkSet, Point, RegionIndexMap,
//! };
//!
//! let points: Vec<Point> = (0..68)
//!     .map(|i| {
//!         let t = i as f64;
//!         Point::new(100.0 + 50.0 * (t * 0.37).sin(), 120.0 + 60.0 * (t * 0.61).cos())
//!     })
//!     .collect();
//! let face = LandmarkSet::from_planar(&points);
//!
//! let settings = ComparisonSettings::default();
//! let landmarks = compare_landmarks(&face, &face, RegionIndexMap::ibug68(), &settings).unwrap();
//! let report = fuse(Some(&landmarks), None, &settings.fusion);
//!
//! assert!(report.overall > 0.99);
//! ```
//!
//! ## Custom Grid Types
//!
//! Jaw refinement reads logits through the [`GridAccess`] trait, which can be
//! implemented for other storage:
//!
//! ```rust
//! use face_compare::GridAccess;
//!
//! struct Constant(f32);
//!
//! impl GridAccess for Constant {
//!     fn value(&self, _x: i64, _y: i64) -> f32 {
//!         self.0
//!     }
//!     fn width(&self) -> usize { 64 }
//!     fn height(&self) -> usize { 64 }
//! }
//! ```

pub mod compare;
pub mod config;
mod error;
pub mod grid;
pub mod io;
pub mod jaw;
pub mod mask;
pub mod normalize;
pub mod outline;
pub mod pose;
pub mod procrustes;
pub mod regions;
pub mod summary;
mod types;

pub use compare::{
    compare_landmarks, compare_masks, fuse, normalize_landmarks, FaceComparison,
    FusedRegionScore, LandmarkComparison, NormalizedFace,
};
pub use config::{
    ComparisonSettings, FusionSettings, JawSettings, MaskScoreWeights, PoseSettings,
    ProcrustesSettings,
};
pub use error::{Error, Result};
pub use grid::{sample_bilinear, GridAccess, ScalarPlane};
pub use jaw::{compute_jaw_from_masks, JawContour, LogitClass, ParsingLogits};
pub use mask::{
    compute_area_similarity, compute_centroid_distance, compute_dice, compute_iou,
    extract_class_mask, extract_region_mask, score_mask_regions, BinaryMask, MaskRegionScore,
    MaskSummary, SegmentationMask,
};
pub use normalize::{eye_centers, normalize_to_eyes, EyeFrame};
pub use outline::{
    concave_hull_knn, convex_hull, largest_connected_component, mask_to_outline,
    offset_polygon, points_from_mask, polygon_area, simplify_rdp,
};
pub use pose::{estimate_pose, frontalize, Frontalized};
pub use procrustes::{
    align, fit_similarity, rmse, similarity_score, ProcrustesFit, SimilarityTransform,
};
pub use regions::{FaceRegion, LandmarkAnchors, RegionIndexMap};
pub use summary::{summarize_regions, summarize_regions_procrustes, RegionScore, RegionSummary};
pub use types::{centroid, CropRect, FacePose, LandmarkSet, Point, Point3, Polygon};
