use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, warn};

use super::models::ErrorResponse;
use crate::ocr::OcrError;

/// Request failures of `POST /decode/`, each rendered as `{"detail": ...}`.
#[derive(Debug, thiserror::Error)]
pub(crate) enum DecodeError {
    #[error("Falta imagen")]
    MissingImage,
    #[error("Imagen inválida")]
    InvalidImage,
    #[error("OCR service is not available")]
    EngineUnavailable,
    #[error("{detail}")]
    Rejected { status: StatusCode, detail: String },
    #[error("OCR processing failed")]
    Inference(String),
    #[error("Internal server error")]
    Internal(String),
}

impl DecodeError {
    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::Rejected {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub(crate) fn unsupported_media_type(content_type: &str) -> Self {
        Self::Rejected {
            status: StatusCode::UNSUPPORTED_MEDIA_TYPE,
            detail: format!("Unsupported media type \"{}\" in request.", content_type),
        }
    }

    pub(crate) fn status(&self) -> StatusCode {
        match self {
            Self::MissingImage | Self::InvalidImage => StatusCode::BAD_REQUEST,
            Self::EngineUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Rejected { status, .. } => *status,
            Self::Inference(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<OcrError> for DecodeError {
    fn from(err: OcrError) -> Self {
        match err {
            OcrError::Initialization(message) => {
                warn!(error = %message, "OCR engine failed to load for request");
                Self::EngineUnavailable
            }
            OcrError::Inference(message) => Self::Inference(message),
        }
    }
}

impl IntoResponse for DecodeError {
    fn into_response(self) -> Response {
        match &self {
            Self::Inference(cause) | Self::Internal(cause) => {
                error!(error = %cause, "decode request failed");
            }
            _ => {}
        }
        let status = self.status();
        (
            status,
            Json(ErrorResponse {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}
