use std::fmt;

use super::Detection;

/// OCR output reduced to `[A-Z0-9]*`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct CleanedText(String);

impl CleanedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CleanedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Joins detection texts with a space, then keeps only ASCII letters and
/// digits, uppercased. The separator never survives the filter, so adjacent
/// detections run together.
pub fn clean_detections(detections: &[Detection]) -> CleanedText {
    let joined = detections
        .iter()
        .map(|detection| detection.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    clean_text(&joined)
}

pub fn clean_text(raw: &str) -> CleanedText {
    CleanedText(
        raw.chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|ch| ch.to_ascii_uppercase())
            .collect(),
    )
}
