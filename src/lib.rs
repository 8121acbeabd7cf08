use anyhow::{Context, Result};
use std::path::Path;

pub mod logging;
pub mod ocr;
pub mod server;
pub mod settings;

pub use ocr::{CleanedText, Detection, OcrEngine, OcrError, TesseractEngine};
pub use settings::Settings;

/// Runs the OCR pipeline over an image file with a freshly loaded engine.
pub fn decode_file(path: &Path, settings: &Settings) -> Result<CleanedText> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read image: {}", path.display()))?;
    let image = image::load_from_memory(&bytes)
        .with_context(|| format!("failed to decode image: {}", path.display()))?;
    let engine = TesseractEngine::initialize(&settings.engine_options())?;
    let text = ocr::recognize(&engine, image, settings.ocr_max_side)?;
    Ok(text)
}
