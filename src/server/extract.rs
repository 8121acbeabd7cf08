use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Form;
use serde_json::Value;

use super::error::DecodeError;
use super::models::ImagePayload;

const IMAGE_FIELD: &str = "image";

/// Pulls the `image` field out of a JSON, url-encoded or multipart body.
pub(crate) async fn extract_image(request: Request) -> Result<ImagePayload, DecodeError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .trim()
        .to_string();
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "" => Err(DecodeError::MissingImage),
        "application/json" => from_json(request).await,
        "application/x-www-form-urlencoded" => from_form(request).await,
        "multipart/form-data" => from_multipart(request).await,
        _ => Err(DecodeError::unsupported_media_type(&content_type)),
    }
}

async fn from_json(request: Request) -> Result<ImagePayload, DecodeError> {
    let body = Bytes::from_request(request, &())
        .await
        .map_err(|rejection| DecodeError::Rejected {
            status: rejection.status(),
            detail: rejection.body_text(),
        })?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::MissingImage);
    }
    let mut value: Value = serde_json::from_slice(&body)
        .map_err(|err| DecodeError::bad_request(format!("JSON parse error - {}", err)))?;
    json_image(value.get_mut(IMAGE_FIELD).map(Value::take))
}

/// Empty or falsy values count as absent; non-string values are present but
/// cannot be decoded.
fn json_image(value: Option<Value>) -> Result<ImagePayload, DecodeError> {
    match value {
        Some(Value::String(text)) if !text.is_empty() => Ok(ImagePayload::Encoded(text)),
        None | Some(Value::Null) | Some(Value::String(_)) | Some(Value::Bool(false)) => {
            Err(DecodeError::MissingImage)
        }
        Some(Value::Number(number)) if number.as_f64() == Some(0.0) => {
            Err(DecodeError::MissingImage)
        }
        Some(Value::Array(items)) if items.is_empty() => Err(DecodeError::MissingImage),
        Some(Value::Object(map)) if map.is_empty() => Err(DecodeError::MissingImage),
        Some(_) => Err(DecodeError::InvalidImage),
    }
}

async fn from_form(request: Request) -> Result<ImagePayload, DecodeError> {
    let Form(mut fields) = Form::<HashMap<String, String>>::from_request(request, &())
        .await
        .map_err(|rejection| DecodeError::Rejected {
            status: rejection.status(),
            detail: rejection.body_text(),
        })?;
    fields
        .remove(IMAGE_FIELD)
        .filter(|value| !value.is_empty())
        .map(ImagePayload::Encoded)
        .ok_or(DecodeError::MissingImage)
}

async fn from_multipart(request: Request) -> Result<ImagePayload, DecodeError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|rejection| DecodeError::Rejected {
            status: rejection.status(),
            detail: format!("Multipart form parse error - {}", rejection.body_text()),
        })?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        // Parts with a filename or a binary content type are uploads; plain
        // text parts carry base64 like the JSON field.
        let is_file = field.file_name().is_some()
            || field
                .content_type()
                .is_some_and(|value| !value.starts_with("text/"));
        if is_file {
            // Browsers send an empty, unnamed part when no file was chosen.
            let unnamed = field.file_name() == Some("");
            let data = field.bytes().await.map_err(multipart_error)?;
            if unnamed && data.is_empty() {
                continue;
            }
            return Ok(ImagePayload::Upload(data));
        }
        let text = field.text().await.map_err(multipart_error)?;
        if !text.is_empty() {
            return Ok(ImagePayload::Encoded(text));
        }
    }
    Err(DecodeError::MissingImage)
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> DecodeError {
    DecodeError::Rejected {
        status: err.status(),
        detail: format!("Multipart form parse error - {}", err.body_text()),
    }
}
