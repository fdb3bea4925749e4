use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Binary deserialization error: {0}")]
    Deserialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image decoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Point sets differ in length: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Grid dimensions differ: {left_width}x{left_height} vs {right_width}x{right_height}")]
    DimensionMismatch {
        left_width: usize,
        left_height: usize,
        right_width: usize,
        right_height: usize,
    },

    #[error("Invalid mask: {0}")]
    InvalidMask(String),

    #[error("Invalid landmarks: {0}")]
    InvalidLandmarks(String),
}

pub type Result<T> = std::result::Result<T, Error>;
