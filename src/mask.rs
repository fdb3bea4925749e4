//! Segmentation-mask region scoring.
//!
//! Two face-parsing masks are compared region by region: each region becomes
//! a binary grid (the OR of its member classes) and the pair is summarized by
//! IoU, Dice, centroid distance and area ratio, fused into one score.
//!
//! Masks produced from different crops may differ in size. Each grid spans its
//! own face crop, so mask B is resampled onto mask A's grid before comparison.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::MaskScoreWeights;
use crate::error::{Error, Result};
use crate::regions::{FaceRegion, RegionIndexMap};
use crate::types::{CropRect, Point};

/// A per-pixel class-id grid from a face-parsing model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MaskParts")]
pub struct SegmentationMask {
    width: usize,
    height: usize,
    labels: Vec<u8>,
    crop: CropRect,
}

#[derive(Deserialize)]
struct MaskParts {
    width: usize,
    height: usize,
    labels: Vec<u8>,
    crop: CropRect,
}

impl TryFrom<MaskParts> for SegmentationMask {
    type Error = Error;

    fn try_from(parts: MaskParts) -> Result<Self> {
        Self::new(parts.width, parts.height, parts.labels, parts.crop)
    }
}

impl SegmentationMask {
    pub fn new(width: usize, height: usize, labels: Vec<u8>, crop: CropRect) -> Result<Self> {
        if labels.len() != width * height {
            return Err(Error::InvalidMask(format!(
                "{} labels for a {width}x{height} grid",
                labels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            labels,
            crop,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn crop(&self) -> &CropRect {
        &self.crop
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn label(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.labels[y * self.width + x])
    }
}

/// A row-major boolean grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BinaryParts")]
pub struct BinaryMask {
    width: usize,
    height: usize,
    data: Vec<bool>,
}

#[derive(Deserialize)]
struct BinaryParts {
    width: usize,
    height: usize,
    data: Vec<bool>,
}

impl TryFrom<BinaryParts> for BinaryMask {
    type Error = Error;

    fn try_from(parts: BinaryParts) -> Result<Self> {
        Self::new(parts.width, parts.height, parts.data)
    }
}

impl BinaryMask {
    pub fn new(width: usize, height: usize, data: Vec<bool>) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::InvalidMask(format!(
                "{} cells for a {width}x{height} grid",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn empty(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![false; width * height],
        }
    }

    /// Any nonzero value counts as set.
    pub fn from_values(width: usize, height: usize, values: &[u8]) -> Result<Self> {
        Self::new(width, height, values.iter().map(|&v| v != 0).collect())
    }

    pub fn from_fn<F>(width: usize, height: usize, f: F) -> Self
    where
        F: Fn(usize, usize) -> bool,
    {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.data[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.data
    }

    /// Coordinates of set cells in row-major order.
    pub fn iter_set(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let w = self.width.max(1);
        self.data
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v)
            .map(move |(i, _)| (i % w, i / w))
    }

    /// Number of set cells.
    pub fn area(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Mean cell coordinate of the set cells, `None` when the mask is empty.
    pub fn centroid(&self) -> Option<Point> {
        let mut sum = Point::zero();
        let mut count = 0usize;
        for (x, y) in self.iter_set() {
            sum += Point::new(x as f64, y as f64);
            count += 1;
        }
        (count > 0).then(|| sum / count as f64)
    }

    /// Nearest-neighbour resample onto a `width` x `height` grid.
    pub fn resample(&self, width: usize, height: usize) -> BinaryMask {
        if width == self.width && height == self.height {
            return self.clone();
        }
        if self.width == 0 || self.height == 0 {
            return BinaryMask::empty(width, height);
        }
        let sx = self.width as f64 / width.max(1) as f64;
        let sy = self.height as f64 / height.max(1) as f64;
        BinaryMask::from_fn(width, height, |x, y| {
            let src_x = (((x as f64 + 0.5) * sx) as usize).min(self.width - 1);
            let src_y = (((y as f64 + 0.5) * sy) as usize).min(self.height - 1);
            self.data[src_y * self.width + src_x]
        })
    }

    fn ensure_same_grid(&self, other: &BinaryMask) -> Result<()> {
        if self.width != other.width || self.height != other.height {
            return Err(Error::DimensionMismatch {
                left_width: self.width,
                left_height: self.height,
                right_width: other.width,
                right_height: other.height,
            });
        }
        Ok(())
    }

    /// (|A ∩ B|, |A ∪ B|).
    fn overlap(&self, other: &BinaryMask) -> Result<(usize, usize)> {
        self.ensure_same_grid(other)?;
        let mut inter = 0;
        let mut union = 0;
        for (&a, &b) in self.data.iter().zip(&other.data) {
            if a && b {
                inter += 1;
            }
            if a || b {
                union += 1;
            }
        }
        Ok((inter, union))
    }
}

/// Binary grid of the pixels labelled `class_id`.
pub fn extract_class_mask(mask: &SegmentationMask, class_id: u8) -> BinaryMask {
    BinaryMask {
        width: mask.width,
        height: mask.height,
        data: mask.labels.iter().map(|&l| l == class_id).collect(),
    }
}

/// Union of the class grids belonging to `region`.
pub fn extract_region_mask(
    mask: &SegmentationMask,
    region: FaceRegion,
    map: &RegionIndexMap,
) -> BinaryMask {
    let ids = map.class_ids(region);
    BinaryMask {
        width: mask.width,
        height: mask.height,
        data: mask.labels.iter().map(|l| ids.contains(l)).collect(),
    }
}

/// Intersection over union; 1 when both masks are empty.
pub fn compute_iou(a: &BinaryMask, b: &BinaryMask) -> Result<f64> {
    let (inter, union) = a.overlap(b)?;
    if union == 0 {
        return Ok(1.0);
    }
    Ok(inter as f64 / union as f64)
}

/// Dice coefficient `2|A∩B| / (|A| + |B|)`; 1 when both masks are empty.
pub fn compute_dice(a: &BinaryMask, b: &BinaryMask) -> Result<f64> {
    let (inter, _) = a.overlap(b)?;
    let total = a.area() + b.area();
    if total == 0 {
        return Ok(1.0);
    }
    Ok(2.0 * inter as f64 / total as f64)
}

/// `min / max` of two areas; 1 when both are zero, 0 when exactly one is.
pub fn compute_area_similarity(area_a: usize, area_b: usize) -> f64 {
    match (area_a, area_b) {
        (0, 0) => 1.0,
        (0, _) | (_, 0) => 0.0,
        (a, b) => a.min(b) as f64 / a.max(b) as f64,
    }
}

/// Centroid distance normalized by the grid diagonal, clamped to [0, 1].
///
/// The diagonal runs between the first and last cell, so opposite corner
/// cells are exactly 1 apart. A missing centroid is maximal disagreement.
pub fn compute_centroid_distance(
    a: Option<Point>,
    b: Option<Point>,
    width: usize,
    height: usize,
) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 1.0;
    };
    let diagonal = (width.saturating_sub(1) as f64).hypot(height.saturating_sub(1) as f64);
    if diagonal <= 0.0 {
        return if a.distance(&b) > 0.0 { 1.0 } else { 0.0 };
    }
    (a.distance(&b) / diagonal).clamp(0.0, 1.0)
}

/// Overlap statistics and fused score for one region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskRegionScore {
    pub region: FaceRegion,
    pub area_a: usize,
    pub area_b: usize,
    pub iou: f64,
    pub dice: f64,
    pub centroid_distance: f64,
    pub area_similarity: f64,
    /// Fused similarity in [0, 1].
    pub score: f64,
    /// False when the region is absent from both masks.
    pub present: bool,
}

/// Region mask scores, best first, and their area-weighted mean.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MaskSummary {
    pub regions: Vec<MaskRegionScore>,
    pub overall: f64,
}

impl MaskSummary {
    pub fn get(&self, region: FaceRegion) -> Option<&MaskRegionScore> {
        self.regions.iter().find(|r| r.region == region)
    }
}

/// Score one region given its binary grids on a shared grid.
pub fn score_region(
    region: FaceRegion,
    a: &BinaryMask,
    b: &BinaryMask,
    weights: &MaskScoreWeights,
) -> Result<MaskRegionScore> {
    let area_a = a.area();
    let area_b = b.area();
    let iou = compute_iou(a, b)?;
    let dice = compute_dice(a, b)?;
    let centroid_distance =
        compute_centroid_distance(a.centroid(), b.centroid(), a.width(), a.height());
    let area_similarity = compute_area_similarity(area_a, area_b);

    let present = area_a > 0 || area_b > 0;
    let score = if present {
        fuse(iou, dice, centroid_distance, area_similarity, weights)
    } else {
        // Absent from both faces: full agreement.
        1.0
    };

    Ok(MaskRegionScore {
        region,
        area_a,
        area_b,
        iou,
        dice,
        centroid_distance,
        area_similarity,
        score,
        present,
    })
}

fn fuse(iou: f64, dice: f64, centroid_distance: f64, area: f64, w: &MaskScoreWeights) -> f64 {
    let total = w.total();
    let w = if total > 0.0 {
        w.clone()
    } else {
        MaskScoreWeights::default()
    };
    let raw = w.iou * iou + w.dice * dice + w.centroid * (1.0 - centroid_distance) + w.area * area;
    (raw / w.total()).clamp(0.0, 1.0)
}

/// Score every mask region of `map` between two segmentation masks.
///
/// The overall score averages regions present in at least one mask, each
/// weighted by its combined area; with no region present it is 1.
pub fn score_mask_regions(
    a: &SegmentationMask,
    b: &SegmentationMask,
    map: &RegionIndexMap,
    weights: &MaskScoreWeights,
) -> MaskSummary {
    let (width, height) = (a.width(), a.height());
    if (b.width(), b.height()) != (width, height) {
        debug!(
            "resampling {}x{} mask onto {width}x{height}",
            b.width(),
            b.height()
        );
    }

    let mut regions = Vec::new();
    for (region, _) in map.mask_regions() {
        let ma = extract_region_mask(a, region, map);
        let mb = extract_region_mask(b, region, map).resample(width, height);
        match score_region(region, &ma, &mb, weights) {
            Ok(score) => regions.push(score),
            Err(e) => debug!("skipping {region}: {e}"),
        }
    }

    let (weighted, total) = regions
        .iter()
        .filter(|r| r.present)
        .fold((0.0, 0usize), |(sum, total), r| {
            let w = r.area_a + r.area_b;
            (sum + r.score * w as f64, total + w)
        });
    let overall = if total == 0 {
        1.0
    } else {
        weighted / total as f64
    };

    regions.sort_by(|x, y| y.score.total_cmp(&x.score));
    MaskSummary { regions, overall }
}
