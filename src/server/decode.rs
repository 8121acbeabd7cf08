use axum::body::Bytes;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::debug;

use super::error::DecodeError;
use super::models::ImagePayload;
use crate::ocr::{self, CleanedText, OcrEngine};

/// Decodes the payload and runs it through the OCR pipeline. Blocking.
pub(crate) fn decode_payload(
    engine: &dyn OcrEngine,
    payload: ImagePayload,
    max_side: u32,
) -> Result<CleanedText, DecodeError> {
    let bytes = payload_bytes(payload)?;
    let image = image::load_from_memory(&bytes).map_err(|err| {
        debug!(error = %err, size = bytes.len(), "image container rejected");
        DecodeError::InvalidImage
    })?;
    Ok(ocr::recognize(engine, image, max_side)?)
}

fn payload_bytes(payload: ImagePayload) -> Result<Bytes, DecodeError> {
    match payload {
        ImagePayload::Encoded(text) => decode_base64(&text).map(Bytes::from),
        ImagePayload::Upload(bytes) => Ok(bytes),
    }
}

/// Strips a `data:...,` header (everything through the first comma) and
/// decodes the rest, ignoring characters outside the base64 alphabet.
pub(crate) fn decode_base64(raw: &str) -> Result<Vec<u8>, DecodeError> {
    let data = raw.split_once(',').map_or(raw, |(_, rest)| rest);
    let compact = data
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '/' | '='))
        .collect::<String>();
    BASE64.decode(compact.as_bytes()).map_err(|err| {
        debug!(error = %err, "base64 payload rejected");
        DecodeError::InvalidImage
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_header_is_stripped() {
        let bytes = decode_base64("data:image/png;base64,aGVsbG8=").expect("decode");
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn only_the_first_comma_splits() {
        // The second comma is not in the alphabet and is dropped.
        let bytes = decode_base64("header,aGVs,bG8=").expect("decode");
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn line_wrapped_base64_is_accepted() {
        let bytes = decode_base64("aGVs\r\nbG8=\n").expect("decode");
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn malformed_base64_is_invalid_image() {
        assert!(matches!(decode_base64("abc"), Err(DecodeError::InvalidImage)));
        assert!(matches!(decode_base64("aGVsbG8"), Err(DecodeError::InvalidImage)));
    }

    #[test]
    fn non_image_bytes_are_invalid_image() {
        struct Unreachable;
        impl OcrEngine for Unreachable {
            fn detect_text(
                &self,
                _: &ocr::PreprocessedImage,
            ) -> Result<Vec<ocr::Detection>, ocr::OcrError> {
                panic!("engine must not run for undecodable input");
            }
        }
        let payload = ImagePayload::Upload(Bytes::from_static(b"definitely not a png"));
        let err = decode_payload(&Unreachable, payload, 1000).expect_err("invalid");
        assert!(matches!(err, DecodeError::InvalidImage));

        let empty = ImagePayload::Encoded("data:image/png;base64,".to_string());
        let err = decode_payload(&Unreachable, empty, 1000).expect_err("invalid");
        assert!(matches!(err, DecodeError::InvalidImage));
    }
}
