use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{info, warn};

use super::decode::decode_payload;
use super::error::DecodeError;
use super::extract::extract_image;
use super::models::DecodeResponse;
use super::state::ServerState;
use crate::ocr::build_engine;
use crate::settings;

pub async fn run_server(settings: settings::Settings) -> Result<()> {
    let lifecycle = settings.ocr_lifecycle;
    let options = settings.engine_options();
    let engine = tokio::task::spawn_blocking(move || build_engine(lifecycle, options))
        .await
        .with_context(|| "OCR engine initialization task failed")?;
    if engine.is_none() {
        warn!("OCR engine is unavailable; decode requests will be answered with 503");
    }

    let state = ServerState {
        engine,
        max_side: settings.ocr_max_side,
    };
    let app = router(state, settings.body_limit);
    let listener = tokio::net::TcpListener::bind(&settings.server_addr)
        .await
        .with_context(|| format!("failed to bind server address: {}", settings.server_addr))?;
    info!(addr = %settings.server_addr, lifecycle = ?lifecycle, "ocr decoder listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub(crate) fn router(state: ServerState, body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/decode/", post(decode))
        .route("/decode", post(decode))
        .with_state(Arc::new(state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,authorization"),
    );
}

async fn decode(
    State(state): State<Arc<ServerState>>,
    request: Request,
) -> Result<Json<DecodeResponse>, DecodeError> {
    // Refuse before touching the body when the engine never loaded.
    let Some(engine) = state.engine.clone() else {
        return Err(DecodeError::EngineUnavailable);
    };
    let payload = extract_image(request).await?;
    let max_side = state.max_side;
    let text = tokio::task::spawn_blocking(move || {
        decode_payload(engine.as_ref(), payload, max_side)
    })
    .await
    .map_err(|err| DecodeError::Internal(format!("decode task failed: {}", err)))??;

    info!(text = %text, "decoded image text");
    Ok(Json(DecodeResponse { text }))
}
