//! HTTP surface: visit reporting, feed pages, and stored blobs.

use crate::analytics::{client_ip, record_visit, Geolocator, VisitPolicy, VisitRequest};
use crate::error::{ApiError, StorageError};
use crate::feed::{fetch_page, FeedRequest};
use crate::store::{AnalyticsStore, DocumentCursor, ImageStore};
use crate::types::{parse_tag_list, Image, TagSet};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

/// Largest page a client may request
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub images: Arc<dyn ImageStore>,
    pub analytics: Arc<dyn AnalyticsStore>,
    pub geolocator: Arc<dyn Geolocator>,
    pub policy: VisitPolicy,
    pub default_page_size: usize,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidInput(_)
            | ApiError::UnknownTag(_)
            | ApiError::StorageError(StorageError::InvalidCursor(_)) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) | ApiError::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Body returned by `POST /api/analytics`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalyticsResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AnalyticsResponse {
    fn failure(error: &str, details: Option<String>) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            details,
        }
    }
}

pub async fn analytics_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<VisitRequest>, JsonRejection>,
) -> (StatusCode, Json<AnalyticsResponse>) {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected analytics payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(AnalyticsResponse::failure(
                    "Malformed payload",
                    Some(rejection.body_text()),
                )),
            );
        }
    };

    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let ip = client_ip(header("x-forwarded-for"), header("x-real-ip"));

    match record_visit(
        state.analytics.as_ref(),
        state.geolocator.as_ref(),
        state.policy,
        request,
        ip,
    )
    .await
    {
        Ok(_) => (
            StatusCode::OK,
            Json(AnalyticsResponse {
                success: true,
                error: None,
                details: None,
            }),
        ),
        Err(ApiError::InvalidInput(msg)) => (
            StatusCode::BAD_REQUEST,
            Json(AnalyticsResponse::failure(&msg, None)),
        ),
        Err(e) => {
            error!(error = %e, "Error saving analytics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AnalyticsResponse::failure(
                    "Failed to save analytics",
                    Some(e.to_string()),
                )),
            )
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ImagesParams {
    /// Comma-separated tag labels
    pub tags: Option<String>,
    pub cursor: Option<String>,
    pub page_size: Option<usize>,
}

/// One feed page as served over HTTP
#[derive(Debug, Serialize, Deserialize)]
pub struct ImagesResponse {
    pub images: Vec<Image>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

pub async fn images_handler(
    State(state): State<AppState>,
    Query(params): Query<ImagesParams>,
) -> Result<Json<ImagesResponse>, ApiError> {
    let tags = match params.tags.as_deref() {
        Some(raw) => parse_tag_list(raw)?,
        None => TagSet::new(),
    };
    let cursor = params
        .cursor
        .as_deref()
        .filter(|c| !c.is_empty())
        .map(DocumentCursor::decode)
        .transpose()?;
    let page_size = params
        .page_size
        .unwrap_or(state.default_page_size)
        .clamp(1, MAX_PAGE_SIZE);

    let page = fetch_page(
        state.images.as_ref(),
        &FeedRequest::new(tags, page_size, cursor),
    )
    .await?;
    Ok(Json(ImagesResponse {
        next_cursor: page.cursor.as_ref().map(DocumentCursor::encode),
        images: page.images,
        has_more: page.has_more,
    }))
}

async fn healthz() -> &'static str {
    "ok"
}

/// Build the application router. Blobs under `blob_root` are served at `/blobs`.
pub fn router(state: AppState, blob_root: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS, Method::GET])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let mut app = Router::new()
        .route("/api/analytics", post(analytics_handler))
        .route("/api/images", get(images_handler))
        .route("/healthz", get(healthz));
    if let Some(root) = blob_root {
        app = app.nest_service("/blobs", ServeDir::new(root));
    }
    app.layer(cors).with_state(state)
}

/// Serve until Ctrl-C or SIGTERM.
pub async fn serve(app: Router, bind: SocketAddr) -> Result<(), ApiError> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| ApiError::ServerError(format!("Failed to bind {}: {}", bind, e)))?;
    info!(address = %bind, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::ServerError(e.to_string()))?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
