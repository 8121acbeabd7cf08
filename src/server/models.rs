use axum::body::Bytes;
use serde::Serialize;

use crate::ocr::CleanedText;

#[derive(Debug, Serialize)]
pub(crate) struct DecodeResponse {
    pub(crate) text: CleanedText,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) detail: String,
}

/// Image as it arrived in the request, before any decoding.
#[derive(Debug)]
pub(crate) enum ImagePayload {
    /// Base64 text, optionally behind a `data:...,` header.
    Encoded(String),
    /// Raw container bytes from a multipart upload.
    Upload(Bytes),
}
