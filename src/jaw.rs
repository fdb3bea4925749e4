//! Jawline refinement from face-parsing logits.
//!
//! A landmark jawline is a coarse guess: the detector interpolates the chin
//! from sparse points. Parsing logits carry a sharper skin/non-skin edge, so
//! the landmark line is used only as a seed and the contour is traced where
//! the skin logit stops dominating every competing class.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::config::JawSettings;
use crate::error::{Error, Result};
use crate::grid::{sample_bilinear, GridAccess, ScalarPlane};
use crate::outline::chaikin_smooth;
use crate::regions::RegionIndexMap;
use crate::types::{CropRect, LandmarkSet, Point, Point3, Polygon};

/// Parsing classes with a logit plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogitClass {
    Skin,
    Neck,
    Hair,
    Background,
}

/// Per-cell class scores over a face crop.
///
/// Planes are optional; jaw synthesis needs skin and uses whichever competing
/// planes are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsingLogits {
    width: usize,
    height: usize,
    crop: CropRect,
    skin: Option<ScalarPlane>,
    neck: Option<ScalarPlane>,
    hair: Option<ScalarPlane>,
    background: Option<ScalarPlane>,
}

impl ParsingLogits {
    pub fn new(width: usize, height: usize, crop: CropRect) -> Self {
        Self {
            width,
            height,
            crop,
            skin: None,
            neck: None,
            hair: None,
            background: None,
        }
    }

    /// Attach a plane of `width * height` row-major scores.
    pub fn with_plane(mut self, class: LogitClass, values: Vec<f32>) -> Result<Self> {
        let len = values.len();
        let plane = ScalarPlane::new(values, self.width, self.height).ok_or_else(|| {
            Error::InvalidMask(format!(
                "{len} {class:?} logits for a {}x{} grid",
                self.width, self.height
            ))
        })?;
        *self.slot(class) = Some(plane);
        Ok(self)
    }

    fn slot(&mut self, class: LogitClass) -> &mut Option<ScalarPlane> {
        match class {
            LogitClass::Skin => &mut self.skin,
            LogitClass::Neck => &mut self.neck,
            LogitClass::Hair => &mut self.hair,
            LogitClass::Background => &mut self.background,
        }
    }

    pub fn plane(&self, class: LogitClass) -> Option<&ScalarPlane> {
        match class {
            LogitClass::Skin => self.skin.as_ref(),
            LogitClass::Neck => self.neck.as_ref(),
            LogitClass::Hair => self.hair.as_ref(),
            LogitClass::Background => self.background.as_ref(),
        }
        // Planes deserialized from disk may not match the header.
        .filter(|p| {
            p.width() == self.width
                && p.height() == self.height
                && p.as_slice().len() == self.width * self.height
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
}

/// A refined jawline in source-image coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JawContour {
    /// Open polyline ordered by strictly increasing x.
    pub polyline: Polygon,
    /// Mean crossing margin scaled by coverage, in [0, 1].
    pub confidence: f64,
    /// Fraction of jaw columns in the longest unbroken stretch of skin edge.
    pub coverage: f64,
}

/// Skin score minus the strongest competing class score.
struct SkinMargin<'a> {
    skin: &'a ScalarPlane,
    others: Vec<&'a ScalarPlane>,
}

impl GridAccess for SkinMargin<'_> {
    fn value(&self, x: i64, y: i64) -> f32 {
        let competitor = self
            .others
            .iter()
            .map(|p| p.value(x, y))
            .fold(f32::NEG_INFINITY, f32::max);
        let competitor = if competitor.is_finite() { competitor } else { 0.0 };
        self.skin.value(x, y) - competitor
    }

    fn width(&self) -> usize {
        self.skin.width()
    }

    fn height(&self) -> usize {
        self.skin.height()
    }
}

/// Range of column indices whose centres lie within `[min_x, max_x]`.
fn column_span(min_x: f64, max_x: f64, width: usize) -> Option<(usize, usize)> {
    if width == 0 || !(min_x.is_finite() && max_x.is_finite()) {
        return None;
    }
    let first = (min_x - 0.5).ceil().max(0.0);
    let last = (max_x - 0.5).floor().min(width as f64 - 1.0);
    (last >= first).then_some((first as usize, last as usize))
}

/// One seed y per grid column: the lowest point of the polyline over that
/// column, with gaps flat-filled from both ends.
fn rasterize_seed(points: &[Point], width: usize) -> Option<Vec<f64>> {
    let mut seed: Vec<Option<f64>> = vec![None; width];
    let mut paint = |col: usize, y: f64| {
        seed[col] = Some(seed[col].map_or(y, |s| s.max(y)));
    };

    for p in points {
        let col = p.x.floor();
        if col >= 0.0 && col < width as f64 {
            paint(col as usize, p.y);
        }
    }
    for pair in points.windows(2) {
        let (a, b) = if pair[0].x <= pair[1].x {
            (pair[0], pair[1])
        } else {
            (pair[1], pair[0])
        };
        if b.x - a.x < 1e-9 {
            continue;
        }
        let Some((c0, c1)) = column_span(a.x, b.x, width) else {
            continue;
        };
        for col in c0..=c1 {
            let t = (col as f64 + 0.5 - a.x) / (b.x - a.x);
            paint(col, a.y + t * (b.y - a.y));
        }
    }

    let first = seed.iter().flatten().next().copied()?;
    let mut last = first;
    Some(
        seed.into_iter()
            .map(|v| {
                if let Some(y) = v {
                    last = y;
                }
                last
            })
            .collect(),
    )
}

/// Growth of the continuity tolerance per cell of seed movement.
const SEED_SLOPE_SLACK: f64 = 0.75;
/// Widest column gap one continuity step may bridge.
const MAX_COLUMN_GAP: usize = 2;

struct Crossing {
    /// Continuous grid y of the zero crossing.
    y: f64,
    /// Logit margin normalized to [0, 1].
    margin: f64,
}

/// A crossing found in one column, with the seed it was searched around.
struct ColumnSample {
    col: usize,
    seed: f64,
    crossing: Crossing,
}

impl ColumnSample {
    fn offset(&self) -> f64 {
        self.crossing.y - self.seed
    }
}

/// Longest run of samples whose offset from the seed changes smoothly.
///
/// A real skin edge tracks the seed with a slowly drifting offset. Periodic
/// noise yields crossings that jump between columns.
fn longest_consistent_run<'a>(
    samples: &'a [ColumnSample],
    settings: &JawSettings,
) -> &'a [ColumnSample] {
    let linked = |a: &ColumnSample, b: &ColumnSample| {
        let seed_step = (b.seed - a.seed).abs();
        let limit = settings.continuity_cells + SEED_SLOPE_SLACK * seed_step;
        b.col - a.col <= MAX_COLUMN_GAP && (b.offset() - a.offset()).abs() <= limit
    };

    let mut best = 0..0;
    let mut start = 0;
    for i in 1..=samples.len() {
        if i < samples.len() && linked(&samples[i - 1], &samples[i]) {
            continue;
        }
        if i - start > best.len() {
            best = start..i;
        }
        start = i;
    }
    &samples[best]
}

/// Scan one column for a stable skin-to-non-skin transition near the seed.
fn scan_column(
    field: &SkinMargin<'_>,
    col: usize,
    seed_y: f64,
    band: f64,
    settings: &JawSettings,
) -> Option<Crossing> {
    let height = field.height() as i64;
    let run = settings.stable_run.max(1) as i64;
    let x = col as i64;
    // Seed and crossing use continuous coordinates; cells are indexed from their top edge.
    let centre = seed_y - 0.5;
    let lo = ((centre - band).floor() as i64).max(run - 1);
    let hi = ((centre + band).ceil() as i64).min(height - 1 - run);

    let mut best: Option<(f64, Crossing)> = None;
    for y in lo..=hi {
        let above = field.value(x, y) as f64;
        let below = field.value(x, y + 1) as f64;
        if !(above > 0.0 && below < 0.0) {
            continue;
        }
        let stable = (0..run).all(|j| field.value(x, y - j) > 0.0)
            && (0..run).all(|j| field.value(x, y + 1 + j) < 0.0);
        if !stable {
            continue;
        }

        let cell_y = y as f64 + above / (above - below);
        let cx = col as f64;
        let spread =
            sample_bilinear(field, cx, cell_y - 1.0) - sample_bilinear(field, cx, cell_y + 1.0);
        let margin = (spread / 2.0 / settings.margin_scale).clamp(0.0, 1.0);

        let crossing = Crossing {
            y: cell_y + 0.5,
            margin,
        };
        let distance = (crossing.y - seed_y).abs();
        if best.as_ref().map_or(true, |(d, _)| distance < *d) {
            best = Some((distance, crossing));
        }
    }
    best.map(|(_, c)| c)
}

/// Pick at most `max` points, evenly spaced by index, keeping both ends.
fn downsample(points: Vec<Point>, max: usize) -> Vec<Point> {
    if points.len() <= max || max < 2 {
        return points;
    }
    let last = (points.len() - 1) as f64;
    (0..max)
        .map(|i| points[(i as f64 * last / (max - 1) as f64).round() as usize])
        .collect()
}

/// Drop points that do not move strictly right. The final point is kept and
/// earlier points it overtakes are dropped instead.
fn enforce_monotonic_x(points: Vec<Point>) -> Vec<Point> {
    let Some(&tail) = points.last() else {
        return points;
    };
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for p in &points[..points.len() - 1] {
        if out.last().map_or(true, |q| p.x > q.x) {
            out.push(*p);
        }
    }
    while out.len() > 1 && out.last().is_some_and(|q| q.x >= tail.x) {
        out.pop();
    }
    if out.last().map_or(true, |q| tail.x > q.x) {
        out.push(tail);
    }
    out
}

/// Refine the landmark jawline against parsing logits.
///
/// Returns `None` when the skin plane or gonion landmarks are missing, or when
/// too few columns show a clean skin edge for the result to be trusted. Only
/// the longest stretch of columns whose crossings follow the seed smoothly is
/// kept.
pub fn compute_jaw_from_masks(
    landmarks: &LandmarkSet,
    logits: &ParsingLogits,
    map: &RegionIndexMap,
    settings: &JawSettings,
) -> Option<JawContour> {
    let Some(skin) = logits.plane(LogitClass::Skin) else {
        debug!("jaw synthesis skipped: no skin logits");
        return None;
    };
    let anchors = map.anchors();
    let (Some(left_gonion), Some(right_gonion)) = (
        landmarks.get(anchors.left_gonion).map(Point3::xy),
        landmarks.get(anchors.right_gonion).map(Point3::xy),
    ) else {
        debug!("jaw synthesis skipped: gonion landmarks missing");
        return None;
    };
    let Some(outline) = landmarks.select(anchors.jaw_outline) else {
        debug!("jaw synthesis skipped: jaw outline incomplete");
        return None;
    };

    let (width, height) = (logits.width(), logits.height());
    let crop = logits.crop();
    let to_grid = |p: Point| crop.image_to_grid(p, width, height);
    let jaw: Vec<Point> = outline.into_iter().map(to_grid).collect();
    let (left_gonion, right_gonion) = (to_grid(left_gonion), to_grid(right_gonion));

    let min_x = jaw.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_x = jaw.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let Some((first_col, last_col)) = column_span(min_x, max_x, width) else {
        debug!("jaw synthesis skipped: jaw outside the logit grid");
        return None;
    };
    let seed = rasterize_seed(&jaw, width)?;

    // Face height from the landmark extent; sizes the search band.
    let (top, bottom) = landmarks
        .to_planar()
        .into_iter()
        .map(|p| to_grid(p).y)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| (lo.min(y), hi.max(y)));
    let face_height = (bottom - top).max(0.0);
    let band = (settings.band_fraction * face_height).max(settings.min_band_cells as f64);

    let field = SkinMargin {
        skin,
        others: [LogitClass::Neck, LogitClass::Hair, LogitClass::Background]
            .into_iter()
            .filter_map(|c| logits.plane(c))
            .collect(),
    };

    let columns = last_col - first_col + 1;
    let crossings: Vec<ColumnSample> = (first_col..=last_col)
        .filter_map(|col| {
            scan_column(&field, col, seed[col], band, settings).map(|crossing| ColumnSample {
                col,
                seed: seed[col],
                crossing,
            })
        })
        .collect();
    let run = longest_consistent_run(&crossings, settings);

    let found = run.len();
    let coverage = found as f64 / columns as f64;
    if found < settings.min_columns.max(2) || coverage < settings.min_coverage {
        debug!(
            "jaw contour rejected: {found}/{columns} consistent columns ({} crossed)",
            crossings.len()
        );
        return None;
    }
    let margin_sum: f64 = run.iter().map(|s| s.crossing.margin).sum();
    let confidence = (margin_sum / found as f64 * coverage).clamp(0.0, 1.0);
    let samples: Vec<Point> = run
        .iter()
        .map(|s| Point::new(s.col as f64 + 0.5, s.crossing.y))
        .collect();
    if confidence < settings.min_confidence {
        debug!("jaw contour rejected: confidence {confidence:.3}");
        return None;
    }

    let smoothed = chaikin_smooth(&samples, settings.chaikin_iterations);
    let mut points = enforce_monotonic_x(downsample(smoothed, settings.max_vertices));

    let (left_end, right_end) = if left_gonion.x <= right_gonion.x {
        (left_gonion, right_gonion)
    } else {
        (right_gonion, left_gonion)
    };
    if let Some(first) = points.first_mut() {
        *first = first.lerp(&left_end, settings.gonion_blend);
    }
    if let Some(last) = points.last_mut() {
        *last = last.lerp(&right_end, settings.gonion_blend);
    }
    let points = enforce_monotonic_x(points);

    trace!("jaw contour: {} vertices, coverage {coverage:.2}", points.len());
    Some(JawContour {
        polyline: Polygon::polyline(
            points
                .into_iter()
                .map(|p| crop.grid_to_image(p, width, height))
                .collect(),
        ),
        confidence,
        coverage,
    })
}
