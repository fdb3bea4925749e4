//! Tunable constants for every scoring stage, loadable from JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Pose estimation constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseSettings {
    /// Poses with every angle within this many degrees of zero skip frontalization.
    pub frontal_tolerance_deg: f64,
    /// Nose-tip drop below the eye line, in IPD units, for a level head.
    pub nominal_nose_drop: f64,
    /// Degrees of pitch per IPD unit of deviation from the nominal drop.
    pub pitch_gain_deg: f64,
    /// Degrees of yaw at full cheek asymmetry.
    pub yaw_gain_deg: f64,
}

impl Default for PoseSettings {
    fn default() -> Self {
        Self {
            frontal_tolerance_deg: 1e-6,
            nominal_nose_drop: 0.7,
            pitch_gain_deg: 90.0,
            yaw_gain_deg: 90.0,
        }
    }
}

/// Procrustes scoring constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcrustesSettings {
    /// RMSE, in IPD units, at which the similarity score falls to 1/e.
    pub tau: f64,
}

impl Default for ProcrustesSettings {
    fn default() -> Self {
        Self { tau: 0.05 }
    }
}

/// Relative weights of the overlap statistics in a mask region score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskScoreWeights {
    pub iou: f64,
    pub dice: f64,
    pub centroid: f64,
    pub area: f64,
}

impl Default for MaskScoreWeights {
    fn default() -> Self {
        Self {
            iou: 0.35,
            dice: 0.35,
            centroid: 0.15,
            area: 0.15,
        }
    }
}

impl MaskScoreWeights {
    pub fn total(&self) -> f64 {
        self.iou + self.dice + self.centroid + self.area
    }
}

/// Jaw contour synthesis constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JawSettings {
    /// Half-height of the search band as a fraction of the estimated face height.
    pub band_fraction: f64,
    /// Lower bound on the band half-height, in grid cells.
    pub min_band_cells: usize,
    /// Cells on each side of a crossing that must keep their sign.
    pub stable_run: usize,
    /// Largest change, in cells, of a crossing's offset from the seed between
    /// neighbouring columns before the traced edge counts as broken.
    pub continuity_cells: f64,
    /// Logit margin treated as a fully decisive crossing.
    pub margin_scale: f64,
    pub chaikin_iterations: usize,
    pub max_vertices: usize,
    /// Fraction by which each endpoint moves toward its gonion landmark.
    pub gonion_blend: f64,
    pub min_columns: usize,
    pub min_coverage: f64,
    pub min_confidence: f64,
}

impl Default for JawSettings {
    fn default() -> Self {
        Self {
            band_fraction: 0.15,
            min_band_cells: 4,
            stable_run: 2,
            continuity_cells: 1.25,
            margin_scale: 2.0,
            chaikin_iterations: 2,
            max_vertices: 64,
            gonion_blend: 0.25,
            min_columns: 8,
            min_coverage: 0.5,
            min_confidence: 0.02,
        }
    }
}

/// How landmark and mask scores combine into one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionSettings {
    /// Weight of the landmark score where both signals cover a region.
    pub landmark_weight: f64,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            landmark_weight: 0.6,
        }
    }
}

/// All comparison settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonSettings {
    pub pose: PoseSettings,
    pub procrustes: ProcrustesSettings,
    pub mask: MaskScoreWeights,
    pub jaw: JawSettings,
    pub fusion: FusionSettings,
}

impl ComparisonSettings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let mut settings: ComparisonSettings = serde_json::from_str(&contents)?;
        settings.sanitize();
        Ok(settings)
    }

    /// Write settings as pretty-printed JSON, overwriting any existing file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let payload = serde_json::to_string_pretty(self)?;
        fs::write(path, payload)?;
        Ok(())
    }

    /// Clamp values into usable ranges.
    pub fn sanitize(&mut self) {
        let defaults = ComparisonSettings::default();

        self.pose.frontal_tolerance_deg = self.pose.frontal_tolerance_deg.max(0.0);
        if !(self.procrustes.tau > 0.0) {
            self.procrustes.tau = defaults.procrustes.tau;
        }

        let w = &mut self.mask;
        w.iou = w.iou.max(0.0);
        w.dice = w.dice.max(0.0);
        w.centroid = w.centroid.max(0.0);
        w.area = w.area.max(0.0);
        if w.total() <= 0.0 {
            self.mask = defaults.mask;
        }

        let jaw = &mut self.jaw;
        jaw.band_fraction = jaw.band_fraction.clamp(0.01, 1.0);
        jaw.min_band_cells = jaw.min_band_cells.max(1);
        jaw.stable_run = jaw.stable_run.max(1);
        if !(jaw.continuity_cells > 0.0) {
            jaw.continuity_cells = defaults.jaw.continuity_cells;
        }
        if !(jaw.margin_scale > 0.0) {
            jaw.margin_scale = defaults.jaw.margin_scale;
        }
        jaw.chaikin_iterations = jaw.chaikin_iterations.min(6);
        jaw.max_vertices = jaw.max_vertices.max(2);
        jaw.gonion_blend = jaw.gonion_blend.clamp(0.0, 1.0);
        jaw.min_columns = jaw.min_columns.max(2);
        jaw.min_coverage = jaw.min_coverage.clamp(0.0, 1.0);
        jaw.min_confidence = jaw.min_confidence.clamp(0.0, 1.0);

        if self.fusion.landmark_weight.is_finite() {
            self.fusion.landmark_weight = self.fusion.landmark_weight.clamp(0.0, 1.0);
        } else {
            self.fusion.landmark_weight = defaults.fusion.landmark_weight;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn default_settings_round_trip() {
        let file = NamedTempFile::new().expect("tempfile");
        let settings = ComparisonSettings::default();
        settings.save_to_path(file.path()).expect("save");

        let loaded = ComparisonSettings::load_from_path(file.path()).expect("load");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let file = NamedTempFile::new().expect("tempfile");
        let json = r#"{ "procrustes": { "tau": 0.1 }, "jaw": { "max_vertices": 32 } }"#;
        fs::write(file.path(), json).expect("write custom settings");

        let loaded = ComparisonSettings::load_from_path(file.path()).expect("load");
        assert_eq!(loaded.procrustes.tau, 0.1);
        assert_eq!(loaded.jaw.max_vertices, 32);
        assert_eq!(loaded.jaw.stable_run, JawSettings::default().stable_run);
        assert_eq!(loaded.mask, MaskScoreWeights::default());
    }

    #[test]
    fn sanitize_repairs_bad_values() {
        let mut settings = ComparisonSettings::default();
        settings.procrustes.tau = -1.0;
        settings.mask = MaskScoreWeights {
            iou: 0.0,
            dice: 0.0,
            centroid: -1.0,
            area: 0.0,
        };
        settings.jaw.gonion_blend = 3.0;
        settings.jaw.continuity_cells = 0.0;
        settings.fusion.landmark_weight = f64::NAN;
        settings.sanitize();

        assert_eq!(settings.procrustes.tau, 0.05);
        assert_eq!(settings.mask, MaskScoreWeights::default());
        assert_eq!(settings.jaw.gonion_blend, 1.0);
        assert_eq!(settings.jaw.continuity_cells, 1.25);
        assert_eq!(settings.fusion.landmark_weight, 0.6);
    }
}
