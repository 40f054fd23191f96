//! Segmentation model wrapper for ONNX Runtime inference.

use std::path::Path;
use std::sync::Mutex;

use image::imageops::FilterType;
use image::RgbImage;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use tracing::{debug, info};

use super::{
    AreaEstimate, SegmentationError, SegmentationMask, CHANNEL_MEAN, CHANNEL_STD, INPUT_SIZE,
};

/// Device type for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu => write!(f, "CPU"),
            Self::Cuda => write!(f, "CUDA"),
        }
    }
}

/// Loaded rooftop segmentation model.
///
/// Created once by the resolver; read-only afterwards. The session mutex
/// serializes forward passes, matching the request-per-call model.
pub struct RooftopModel {
    session: Mutex<Session>,
    device: Device,
}

impl std::fmt::Debug for RooftopModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RooftopModel")
            .field("device", &self.device)
            .field("input_size", &INPUT_SIZE)
            .finish()
    }
}

impl RooftopModel {
    /// Load the segmentation model from a resolved artifact path
    pub fn load(path: &Path, use_cuda: bool) -> Result<Self, SegmentationError> {
        let device = if use_cuda { Device::Cuda } else { Device::Cpu };

        info!(?device, path = %path.display(), "Loading segmentation model");

        let session = Self::create_session(path, use_cuda)?;

        debug!(
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "Segmentation model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            device,
        })
    }

    fn create_session(model_path: &Path, use_cuda: bool) -> Result<Session, SegmentationError> {
        let model_bytes = std::fs::read(model_path)
            .map_err(|e| SegmentationError::Onnx(format!("Failed to read model file: {e}")))?;

        let mut builder =
            Session::builder().map_err(|e| SegmentationError::Onnx(e.to_string()))?;

        builder = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| SegmentationError::Onnx(e.to_string()))?;

        builder = builder
            .with_intra_threads(4)
            .map_err(|e| SegmentationError::Onnx(e.to_string()))?;

        if use_cuda {
            #[cfg(feature = "cuda")]
            {
                use ort::execution_providers::CUDAExecutionProvider;
                builder = builder
                    .with_execution_providers([CUDAExecutionProvider::default().build()])
                    .map_err(|e| SegmentationError::Onnx(e.to_string()))?;
            }
            #[cfg(not(feature = "cuda"))]
            {
                tracing::warn!("CUDA requested but not compiled with cuda feature, using CPU");
            }
        }

        builder
            .commit_from_memory(&model_bytes)
            .map_err(|e| SegmentationError::Onnx(format!("Failed to load model: {e}")))
    }

    /// Get the device being used for inference
    pub fn device(&self) -> Device {
        self.device
    }

    /// Estimate usable rooftop area from raw uploaded image bytes.
    ///
    /// Deterministic for fixed bytes and model: decode, resize to the
    /// model resolution, normalize, one forward pass, argmax over the
    /// class dimension, count rooftop pixels.
    pub fn estimate(&self, image_bytes: &[u8]) -> Result<AreaEstimate, SegmentationError> {
        let input = decode_rgb(image_bytes)?;
        let planes = preprocess(&input);
        let (logits, num_classes) = self.forward(planes)?;

        let pixels = (INPUT_SIZE * INPUT_SIZE) as usize;
        let classes = argmax_classes(&logits, num_classes, pixels);
        let mask = SegmentationMask {
            classes,
            width: INPUT_SIZE,
            height: INPUT_SIZE,
        };
        let area_m2 = mask.area_m2();

        debug!(
            rooftop_pixels = mask.rooftop_pixels(),
            area_m2, "Segmentation complete"
        );

        Ok(AreaEstimate {
            area_m2,
            mask,
            input,
        })
    }

    fn forward(&self, planes: Vec<f32>) -> Result<(Vec<f32>, usize), SegmentationError> {
        let size = INPUT_SIZE as usize;
        let input = Tensor::from_array(([1usize, 3, size, size], planes.into_boxed_slice()))
            .map_err(|e| SegmentationError::Onnx(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| SegmentationError::Onnx(format!("Session lock error: {e}")))?;

        let output_name = session.outputs()[0].name().to_string();

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| SegmentationError::Onnx(e.to_string()))?;

        let output = outputs.get(output_name.as_str()).ok_or_else(|| {
            SegmentationError::Onnx(format!("Output '{output_name}' not found"))
        })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| SegmentationError::Onnx(e.to_string()))?;

        debug!(?shape, data_len = data.len(), "Model output");

        // Expect class logits shaped [1, C, H, W]
        let dims: Vec<i64> = shape.iter().copied().collect();
        if dims.len() != 4 || dims[0] != 1 {
            return Err(SegmentationError::Onnx(format!(
                "Unexpected output shape: {dims:?}"
            )));
        }
        let num_classes = dims[1] as usize;
        let pixels = (dims[2] * dims[3]) as usize;
        if pixels != (INPUT_SIZE * INPUT_SIZE) as usize || data.len() != num_classes * pixels {
            return Err(SegmentationError::Onnx(format!(
                "Output shape {dims:?} does not match {INPUT_SIZE}x{INPUT_SIZE} input"
            )));
        }

        Ok((data.to_vec(), num_classes))
    }
}

/// Decode uploaded bytes into an RGB image at the model resolution.
pub(crate) fn decode_rgb(image_bytes: &[u8]) -> Result<RgbImage, SegmentationError> {
    let image = image::load_from_memory(image_bytes)
        .map_err(|e| SegmentationError::InvalidImage(e.to_string()))?;
    Ok(image::imageops::resize(
        &image.to_rgb8(),
        INPUT_SIZE,
        INPUT_SIZE,
        FilterType::Triangle,
    ))
}

/// Convert an RGB image into a normalized planar (NCHW) float buffer.
pub(crate) fn preprocess(rgb: &RgbImage) -> Vec<f32> {
    let pixels = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut planes = vec![0.0f32; 3 * pixels];

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let idx = (y * INPUT_SIZE + x) as usize;
        for c in 0..3 {
            planes[c * pixels + idx] =
                (f32::from(pixel[c]) / 255.0 - CHANNEL_MEAN[c]) / CHANNEL_STD[c];
        }
    }

    planes
}

/// Per-pixel argmax over planar class logits ([C, pixels] layout).
pub(crate) fn argmax_classes(logits: &[f32], num_classes: usize, pixels: usize) -> Vec<u8> {
    let mut classes = vec![0u8; pixels];

    for (idx, slot) in classes.iter_mut().enumerate() {
        let mut best_class = 0usize;
        let mut best_score = logits[idx];
        for c in 1..num_classes {
            let score = logits[c * pixels + idx];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }
        *slot = best_class as u8;
    }

    classes
}
