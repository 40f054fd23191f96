//! Rooftop segmentation inference.
//!
//! Resolves a pretrained segmentation model from an ordered list of local
//! and remote sources, then estimates usable rooftop area from uploaded
//! images via ONNX Runtime.

mod model;
mod resolver;

pub use model::{Device, RooftopModel};
pub use resolver::{resolve_model, ModelSource};

use std::path::PathBuf;

use directories::ProjectDirs;
use image::RgbImage;

/// Input resolution the model expects (square)
pub const INPUT_SIZE: u32 = 256;

/// Per-channel normalization constants (ImageNet statistics)
pub const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Class label the model assigns to rooftop pixels
pub const ROOFTOP_CLASS: u8 = 1;

/// Ground area represented by one mask pixel
pub const AREA_PER_PIXEL_M2: f64 = 0.01;

/// Smallest estimate worth sending to the advisory stage
pub const MIN_AREA_M2: f64 = 10.0;

/// Largest plausible rooftop area for manual entry
pub const MAX_AREA_M2: f64 = 10_000.0;

/// Whether an area lies in the sane range accepted by the analysis pipeline.
pub fn area_within_bounds(area_m2: f64) -> bool {
    (MIN_AREA_M2..=MAX_AREA_M2).contains(&area_m2)
}

/// Per-pixel class assignments produced by one forward pass
#[derive(Debug, Clone)]
pub struct SegmentationMask {
    pub classes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl SegmentationMask {
    /// Number of pixels classified as rooftop
    pub fn rooftop_pixels(&self) -> usize {
        self.classes.iter().filter(|&&c| c == ROOFTOP_CLASS).count()
    }

    /// Estimated rooftop area in square meters
    pub fn area_m2(&self) -> f64 {
        self.rooftop_pixels() as f64 * AREA_PER_PIXEL_M2
    }
}

/// Result of one estimation call: the area plus the inputs needed to
/// visualize it (resized original and predicted mask).
#[derive(Debug, Clone)]
pub struct AreaEstimate {
    pub area_m2: f64,
    pub mask: SegmentationMask,
    pub input: RgbImage,
}

/// Segmentation error types
#[derive(Debug, thiserror::Error)]
pub enum SegmentationError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Model download failed: {0}")]
    DownloadFailed(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("ONNX runtime error: {0}")]
    Onnx(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Get the default cache directory for downloaded model artifacts
pub fn default_cache_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "rooftop-analyzer", "rooftop-analyzer") {
        proj_dirs.cache_dir().join("models")
    } else {
        PathBuf::from("./cache/models")
    }
}
