//! CLI application for comparing two faces.
//!
//! Usage:
//!   face-compare a.json b.json                          # Human-readable output
//!   face-compare a.json b.json --json                   # JSON output
//!   face-compare a.json b.json --mask-a a.png --mask-b b.png
//!   face-compare a.json b.json -o report.json --json    # Save to file

use clap::{Parser, ValueEnum};
use face_compare::{
    compare_landmarks, compare_masks, compute_jaw_from_masks, fuse, io, ComparisonSettings,
    CropRect, FaceComparison, FacePose, JawContour, LandmarkSet, Point, RegionIndexMap,
};
use log::{debug, info, LevelFilter};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "face-compare")]
#[command(
    author,
    version,
    about = "Face similarity from landmarks and parsing masks",
    long_about = None
)]
struct Args {
    /// Landmarks of the first face (JSON array of [x, y] or [x, y, z])
    #[arg(required = true)]
    landmarks_a: PathBuf,

    /// Landmarks of the second face
    #[arg(required = true)]
    landmarks_b: PathBuf,

    /// Landmark numbering convention
    #[arg(long, value_enum, default_value_t = Convention::Mediapipe)]
    convention: Convention,

    /// Segmentation mask of the first face (PNG labels or bincode)
    #[arg(long, requires = "mask_b")]
    mask_a: Option<PathBuf>,

    /// Segmentation mask of the second face
    #[arg(long, requires = "mask_a")]
    mask_b: Option<PathBuf>,

    /// Crop of mask A in image pixels as x,y,width,height
    #[arg(long, value_parser = parse_crop)]
    crop_a: Option<CropRect>,

    /// Crop of mask B in image pixels as x,y,width,height
    #[arg(long, value_parser = parse_crop)]
    crop_b: Option<CropRect>,

    /// Parsing logits of the first face, for jawline refinement
    #[arg(long)]
    logits_a: Option<PathBuf>,

    /// Parsing logits of the second face, for jawline refinement
    #[arg(long)]
    logits_b: Option<PathBuf>,

    /// Settings file (JSON); missing fields use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
enum Convention {
    /// MediaPipe 468-point face mesh
    Mediapipe,
    /// iBUG 68-point annotation
    Ibug68,
}

impl Convention {
    fn map(self) -> &'static RegionIndexMap {
        match self {
            Convention::Mediapipe => RegionIndexMap::mediapipe(),
            Convention::Ibug68 => RegionIndexMap::ibug68(),
        }
    }
}

fn parse_crop(s: &str) -> Result<CropRect, String> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid crop {s:?}: {e}"))?;
    match values.as_slice() {
        [x, y, w, h] if *w > 0.0 && *h > 0.0 => Ok(CropRect::new(*x, *y, *w, *h)),
        _ => Err(format!("crop must be x,y,width,height with positive size, got {s:?}")),
    }
}

/// Output structure for JSON serialization
#[derive(Serialize)]
struct Output {
    face_a: String,
    face_b: String,
    convention: Convention,
    landmark_count: usize,
    pose_a: PoseOutput,
    pose_b: PoseOutput,
    /// Fused score in [0, 1]
    overall: f64,
    landmark_overall: Option<f64>,
    mask_overall: Option<f64>,
    /// Best region first
    regions: Vec<RegionOutput>,
    jaw_a: Option<JawOutput>,
    jaw_b: Option<JawOutput>,
}

#[derive(Serialize)]
struct PoseOutput {
    yaw: f64,
    pitch: f64,
    roll: f64,
    confidence: f64,
}

impl From<FacePose> for PoseOutput {
    fn from(p: FacePose) -> Self {
        Self {
            yaw: p.yaw,
            pitch: p.pitch,
            roll: p.roll,
            confidence: p.confidence,
        }
    }
}

#[derive(Serialize)]
struct RegionOutput {
    region: String,
    score: f64,
    landmark: Option<f64>,
    mask: Option<f64>,
}

#[derive(Serialize)]
struct JawOutput {
    confidence: f64,
    coverage: f64,
    points: Vec<[f64; 2]>,
}

impl From<JawContour> for JawOutput {
    fn from(jaw: JawContour) -> Self {
        Self {
            confidence: jaw.confidence,
            coverage: jaw.coverage,
            points: jaw.polyline.points.iter().map(|p: &Point| [p.x, p.y]).collect(),
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging(if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    });

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Honour `RUST_LOG` when set, otherwise log at `default_filter`.
fn init_logging(default_filter: LevelFilter) {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let settings = match &args.config {
        Some(path) => {
            info!("Loading settings from {:?}", path);
            ComparisonSettings::load_from_path(path)?
        }
        None => ComparisonSettings::default(),
    };
    let map = args.convention.map();

    let a = load_face(&args.landmarks_a, map)?;
    let b = load_face(&args.landmarks_b, map)?;

    let landmarks = compare_landmarks(&a, &b, map, &settings)?;

    let masks = match (&args.mask_a, &args.mask_b) {
        (Some(path_a), Some(path_b)) => {
            let mask_a = io::load_mask(path_a, args.crop_a)?;
            let mask_b = io::load_mask(path_b, args.crop_b)?;
            Some(compare_masks(&mask_a, &mask_b, map, &settings))
        }
        _ => None,
    };

    let report = fuse(Some(&landmarks), masks.as_ref(), &settings.fusion);

    let jaw = |logits: &Option<PathBuf>,
               face: &LandmarkSet|
     -> Result<Option<JawOutput>, Box<dyn std::error::Error>> {
        let Some(path) = logits else {
            return Ok(None);
        };
        let logits = io::load_logits(path)?;
        let contour = compute_jaw_from_masks(face, &logits, map, &settings.jaw);
        if contour.is_none() {
            info!("No usable jawline in {:?}", path);
        }
        Ok(contour.map(JawOutput::from))
    };

    let jaws = (jaw(&args.logits_a, &a)?, jaw(&args.logits_b, &b)?);
    let output = build_output(args, &a, (landmarks.pose_a, landmarks.pose_b), &report, jaws);

    // Generate output
    let output_str = if args.json {
        serde_json::to_string_pretty(&output)?
    } else {
        format_human_readable(&output)
    };

    // Write output
    if let Some(ref path) = args.output {
        std::fs::write(path, &output_str)?;
        info!("Output written to {:?}", path);
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

fn load_face(path: &Path, map: &RegionIndexMap) -> Result<LandmarkSet, Box<dyn std::error::Error>> {
    debug!("Loading landmarks from {:?}", path);
    let set = io::load_landmarks(path)?;
    if set.len() != map.landmark_count() {
        log::warn!(
            "{:?} has {} landmarks; the {} convention expects {}",
            path,
            set.len(),
            map.name(),
            map.landmark_count()
        );
    }
    Ok(set)
}

fn build_output(
    args: &Args,
    a: &LandmarkSet,
    (pose_a, pose_b): (FacePose, FacePose),
    report: &FaceComparison,
    (jaw_a, jaw_b): (Option<JawOutput>, Option<JawOutput>),
) -> Output {
    Output {
        face_a: args.landmarks_a.display().to_string(),
        face_b: args.landmarks_b.display().to_string(),
        convention: args.convention,
        landmark_count: a.len(),
        pose_a: pose_a.into(),
        pose_b: pose_b.into(),
        overall: report.overall,
        landmark_overall: report.landmark_overall,
        mask_overall: report.mask_overall,
        regions: report
            .regions
            .iter()
            .map(|r| RegionOutput {
                region: r.region.to_string(),
                score: r.score,
                landmark: r.landmark,
                mask: r.mask,
            })
            .collect(),
        jaw_a,
        jaw_b,
    }
}

fn percent(score: Option<f64>) -> String {
    score.map_or_else(|| "-".to_string(), |s| format!("{:.1}%", s * 100.0))
}

fn format_human_readable(output: &Output) -> String {
    let mut s = String::new();

    s.push_str(&format!("Face A: {}\n", output.face_a));
    s.push_str(&format!("Face B: {}\n", output.face_b));
    s.push_str(&format!("Landmarks: {} points\n", output.landmark_count));

    s.push_str("\nPose (yaw / pitch / roll):\n");
    for (label, pose) in [("A", &output.pose_a), ("B", &output.pose_b)] {
        s.push_str(&format!(
            "  {}: {:+.1} / {:+.1} / {:+.1} deg (confidence {:.2})\n",
            label, pose.yaw, pose.pitch, pose.roll, pose.confidence
        ));
    }

    s.push_str(&format!("\nOverall similarity: {:.1}%\n", output.overall * 100.0));
    s.push_str(&format!("  Landmarks: {}\n", percent(output.landmark_overall)));
    s.push_str(&format!("  Masks:     {}\n", percent(output.mask_overall)));

    if output.regions.is_empty() {
        s.push_str("\nNo regions could be compared.\n");
    } else {
        s.push_str("\nRegions:\n");
        for r in &output.regions {
            s.push_str(&format!(
                "  {:<6} {:>6.1}%  (landmarks {}, mask {})\n",
                r.region,
                r.score * 100.0,
                percent(r.landmark),
                percent(r.mask)
            ));
        }
    }

    for (label, jaw) in [("A", &output.jaw_a), ("B", &output.jaw_b)] {
        if let Some(jaw) = jaw {
            s.push_str(&format!(
                "\nJawline {}: {} points, confidence {:.2}, coverage {:.0}%\n",
                label,
                jaw.points.len(),
                jaw.confidence,
                jaw.coverage * 100.0
            ));
        }
    }

    s
}
