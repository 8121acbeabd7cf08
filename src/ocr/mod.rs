mod engine;
mod lifecycle;
mod preprocess;
mod text;

use image::DynamicImage;
use tracing::debug;

pub use engine::{list_tesseract_languages, EngineOptions, TesseractEngine};
pub use lifecycle::{
    build_engine, shared_engine, EngineCell, EngineLifecycle, EngineSlot, PerRequestEngine,
};
pub use preprocess::{preprocess, PreprocessedImage};
pub use text::{clean_detections, clean_text, CleanedText};

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BBoxPx {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// One recognized text region. Confidence is normalized to `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Detection {
    pub bbox: BBoxPx,
    pub text: String,
    pub conf: f32,
}

#[cfg(test)]
impl Detection {
    pub(crate) fn new(text: impl Into<String>) -> Self {
        Self {
            bbox: BBoxPx {
                x: 0,
                y: 0,
                w: 0,
                h: 0,
            },
            text: text.into(),
            conf: 1.0,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum OcrError {
    #[error("failed to initialize OCR engine: {0}")]
    Initialization(String),
    #[error("OCR inference failed: {0}")]
    Inference(String),
}

/// Text detection over a preprocessed image.
///
/// One handle may serve several requests at once, so implementations must
/// not mutate shared state from `detect_text`.
pub trait OcrEngine: Send + Sync {
    fn detect_text(&self, image: &PreprocessedImage) -> Result<Vec<Detection>, OcrError>;
}

/// Runs the full pipeline on a decoded image: preprocess, detect, clean.
pub fn recognize(
    engine: &dyn OcrEngine,
    image: DynamicImage,
    max_side: u32,
) -> Result<CleanedText, OcrError> {
    let (width, height) = (image.width(), image.height());
    let prepared = preprocess(image, max_side);
    debug!(
        width,
        height,
        prepared_width = prepared.width(),
        prepared_height = prepared.height(),
        "preprocessed image for OCR"
    );
    let detections = engine.detect_text(&prepared)?;
    for detection in &detections {
        debug!(
            text = %detection.text,
            conf = detection.conf,
            x = detection.bbox.x,
            y = detection.bbox.y,
            "detection"
        );
    }
    Ok(clean_detections(&detections))
}
