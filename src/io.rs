//! Loading and saving comparison inputs.
//!
//! - Landmarks: JSON arrays of `[x, y]` or `[x, y, z]`.
//! - Segmentation masks: 8-bit PNG label images, or bincode files (optionally
//!   bzip2-compressed with a `.bz2` extension).
//! - Parsing logits: bincode, optionally `.bz2`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::jaw::{LogitClass, ParsingLogits};
use crate::mask::SegmentationMask;
use crate::types::{CropRect, LandmarkSet, Point3};

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Read a file, transparently decompressing `.bz2`.
fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut bytes = Vec::new();
    if has_extension(path, "bz2") {
        BzDecoder::new(reader).read_to_end(&mut bytes)?;
    } else {
        let mut reader = reader;
        reader.read_to_end(&mut bytes)?;
    }
    Ok(bytes)
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    if has_extension(path, "bz2") {
        let mut encoder = BzEncoder::new(writer, Compression::default());
        encoder.write_all(bytes)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = writer;
        writer.write_all(bytes)?;
        writer.flush()?;
    }
    Ok(())
}

fn load_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = read_bytes(path)?;
    Ok(bincode::deserialize(&bytes)?)
}

fn save_bincode<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let bytes = bincode::serialize(value)?;
    write_bytes(path, &bytes)
}

/// Load a landmark set from a JSON array of coordinate arrays.
pub fn load_landmarks<P: AsRef<Path>>(path: P) -> Result<LandmarkSet> {
    let contents = std::fs::read_to_string(path)?;
    parse_landmarks(&contents)
}

/// Parse `[[x, y], [x, y, z], ...]`. Each entry needs two or three numbers.
pub fn parse_landmarks(json: &str) -> Result<LandmarkSet> {
    let rows: Vec<Vec<f64>> = serde_json::from_str(json)?;
    let points = rows
        .iter()
        .enumerate()
        .map(|(i, row)| match row.as_slice() {
            [x, y] => Ok(Point3::planar(*x, *y)),
            [x, y, z] => Ok(Point3::new(*x, *y, *z)),
            _ => Err(Error::InvalidLandmarks(format!(
                "point {i} has {} coordinates",
                row.len()
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(LandmarkSet::new(points))
}

/// Write landmarks as JSON, keeping z where present.
pub fn save_landmarks<P: AsRef<Path>>(landmarks: &LandmarkSet, path: P) -> Result<()> {
    let rows: Vec<Vec<f64>> = landmarks
        .points()
        .iter()
        .map(|p| match p.z {
            Some(z) => vec![p.x, p.y, z],
            None => vec![p.x, p.y],
        })
        .collect();
    std::fs::write(path, serde_json::to_string(&rows)?)?;
    Ok(())
}

/// Load a segmentation mask.
///
/// PNG label images carry no crop; `crop` (or the identity crop) is attached.
/// Bincode masks keep their stored crop unless `crop` overrides it.
pub fn load_mask<P: AsRef<Path>>(path: P, crop: Option<CropRect>) -> Result<SegmentationMask> {
    let path = path.as_ref();
    if has_extension(path, "png") {
        let labels = image::open(path)?.to_luma8();
        let (width, height) = (labels.width() as usize, labels.height() as usize);
        debug!("loaded {width}x{height} label image {:?}", path);
        let crop = crop.unwrap_or_else(|| CropRect::identity(width, height));
        return SegmentationMask::new(width, height, labels.into_raw(), crop);
    }

    let stored: SegmentationMask = load_bincode(path)?;
    match crop {
        Some(crop) => SegmentationMask::new(
            stored.width(),
            stored.height(),
            stored.labels().to_vec(),
            crop,
        ),
        None => Ok(stored),
    }
}

/// Save a mask as bincode, compressed when the path ends in `.bz2`.
pub fn save_mask<P: AsRef<Path>>(mask: &SegmentationMask, path: P) -> Result<()> {
    save_bincode(mask, path.as_ref())
}

/// Load parsing logits from bincode (optionally `.bz2`).
///
/// Planes whose value count disagrees with their dimensions are an error.
pub fn load_logits<P: AsRef<Path>>(path: P) -> Result<ParsingLogits> {
    let stored: ParsingLogits = load_bincode(path.as_ref())?;
    if [
        LogitClass::Skin,
        LogitClass::Neck,
        LogitClass::Hair,
        LogitClass::Background,
    ]
    .iter()
    .all(|&c| stored.plane(c).is_none())
    {
        debug!("logit file {:?} has no usable planes", path.as_ref());
    }
    Ok(stored)
}

pub fn save_logits<P: AsRef<Path>>(logits: &ParsingLogits, path: P) -> Result<()> {
    save_bincode(logits, path.as_ref())
}
