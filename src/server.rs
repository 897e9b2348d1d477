use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::post,
};
use eyre::{Result, WrapErr};
use log::{info, warn};

use crate::envelope::{TranscriptRequest, TranscriptResponse};
use crate::pipeline::Pipeline;

const CORS_HEADERS: [(header::HeaderName, &str); 3] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
    (
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        "authorization, x-client-info, apikey, content-type",
    ),
];

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/", post(transcript).options(preflight))
        .route("/transcript", post(transcript).options(preflight))
        .fallback(not_found)
        .with_state(AppState { pipeline })
        .layer(middleware::map_response(with_cors))
}

/// Every response, axum's own rejections included, carries the CORS headers.
async fn with_cors<B>(mut resp: Response<B>) -> Response<B> {
    let headers = resp.headers_mut();
    for (name, value) in CORS_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    resp
}

/// Serve transcript requests on `bind` until Ctrl+C.
pub async fn serve(pipeline: Arc<Pipeline>, bind: &str) -> Result<()> {
    let addr: SocketAddr = bind.parse().wrap_err_with(|| format!("invalid bind address: {bind}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("binding to {addr}"))?;
    info!("Listening on http://{addr}");
    eprintln!("Listening on http://{addr}");

    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("running transcript server")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {e}");
    }
}

async fn transcript(State(state): State<AppState>, body: Bytes) -> Response {
    let (status, envelope) = match serde_json::from_slice::<TranscriptRequest>(&body) {
        Ok(req) => {
            let outcome = state.pipeline.get_transcript(req.input()).await;
            (outcome.status_code(), TranscriptResponse::from(&outcome))
        }
        Err(e) => {
            warn!("Rejecting unreadable request body: {e}");
            (500, TranscriptResponse::error(e.to_string()))
        }
    };
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(envelope)).into_response()
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
