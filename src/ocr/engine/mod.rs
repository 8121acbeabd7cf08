mod parse;
mod tesseract;

pub use tesseract::{list_tesseract_languages, EngineOptions, TesseractEngine};
