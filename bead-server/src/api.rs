//! HTTP surface.
//!
//! - `POST /api/chat` - run one turn
//! - `POST /api/display` - render a trajectory state for the page
//! - `GET  /api/games` - gallery page (`page`, `limit`, `search`)
//! - `POST /api/games` - publish a game
//! - `GET  /api/games/{id}` - one published game
//! - `GET  /health` - server status
//!
//! Every failure is a JSON `{"error": "..."}` body.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use bead_core::display::line_html;
use bead_core::gallery::{
    GalleryError, GalleryPage, GalleryQuery, GalleryStore, JsonDirGallery, NewGame,
    PublishedGame, SharedConnection,
};
use bead_core::oracle::Oracle;
use bead_core::trajectory::{AiResponse, TrajectoryState};
use bead_core::turn::{TurnError, TurnRequest, TurnService};
use bead_core::TrajectoryGraph;

/// `Cache-Control` for a published game's detail.
pub const DETAIL_CACHE_CONTROL: &str = "public, s-maxage=3600, stale-while-revalidate=7200";

// ── Server state ──────────────────────────────────────────────────────────

pub struct AppState<O> {
    /// `None` when no model credential is configured.
    turns: Option<TurnService<O>>,
    gallery_dir: PathBuf,
    gallery: SharedConnection<JsonDirGallery>,
}

impl<O: Oracle> AppState<O> {
    pub fn new(turns: Option<TurnService<O>>, gallery_dir: impl Into<PathBuf>) -> Self {
        Self {
            turns,
            gallery_dir: gallery_dir.into(),
            gallery: SharedConnection::new(),
        }
    }

    /// The gallery, connected on first use.
    async fn gallery(&self) -> Result<Arc<JsonDirGallery>, GalleryError> {
        self.gallery
            .get_or_connect(|| JsonDirGallery::connect(self.gallery_dir.clone()))
            .await
    }
}

pub fn router<O: Oracle + 'static>(state: Arc<AppState<O>>) -> Router {
    Router::new()
        .route("/health", get(health::<O>))
        .route("/api/chat", post(chat::<O>))
        .route("/api/display", post(display))
        .route("/api/games", get(list_games::<O>).post(create_game::<O>))
        .route("/api/games/{id}", get(get_game::<O>))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// A failed request: status plus the message for the `error` field.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<TurnError> for ApiError {
    fn from(e: TurnError) -> Self {
        let status =
            StatusCode::from_u16(e.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match e {
            TurnError::Upstream(inner) => {
                tracing::error!(error = %inner, "chat request failed");
                Self::new(status, "Failed to process chat request")
            }
            other => Self::new(status, other.to_string()),
        }
    }
}

impl From<GalleryError> for ApiError {
    fn from(e: GalleryError) -> Self {
        match e {
            GalleryError::Invalid(message) => Self::bad_request(message),
            GalleryError::NotFound => Self::new(StatusCode::NOT_FOUND, "Game not found"),
            other => {
                tracing::error!(error = %other, "gallery request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Gallery unavailable")
            }
        }
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    model_configured: bool,
    gallery_connected: bool,
}

async fn health<O: Oracle>(State(state): State<Arc<AppState<O>>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_configured: state.turns.is_some(),
        gallery_connected: state.gallery.is_connected(),
    })
}

async fn chat<O: Oracle>(
    State(state): State<Arc<AppState<O>>>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<AiResponse>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let request = TurnRequest::from_value(body)?;
    let service = state.turns.as_ref().ok_or(TurnError::MissingCredential)?;

    let interpretation = service.handle(&request).await?;
    tracing::info!(
        messages = request.messages.len(),
        source = ?interpretation.source,
        "chat turn served"
    );
    Ok(Json(interpretation.response))
}

#[derive(Debug, Serialize)]
struct DisplayResponse {
    lines: Vec<String>,
    graph: TrajectoryGraph,
}

async fn display(
    body: Result<Json<TrajectoryState>, JsonRejection>,
) -> Result<Json<DisplayResponse>, ApiError> {
    let Json(state) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    Ok(Json(DisplayResponse {
        lines: state.trajectory.iter().map(|l| line_html(&l.text)).collect(),
        graph: TrajectoryGraph::from_state(&state),
    }))
}

async fn list_games<O: Oracle>(
    State(state): State<Arc<AppState<O>>>,
    query: Result<Query<GalleryQuery>, QueryRejection>,
) -> Result<Json<GalleryPage>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let page = state.gallery().await?.list(&query).await?;
    Ok(Json(page))
}

async fn create_game<O: Oracle>(
    State(state): State<Arc<AppState<O>>>,
    body: Result<Json<NewGame>, JsonRejection>,
) -> Result<(StatusCode, Json<PublishedGame>), ApiError> {
    let Json(game) = body.map_err(|_| ApiError::bad_request("All fields are required"))?;
    let published = state.gallery().await?.create(game).await?;
    Ok((StatusCode::CREATED, Json(published)))
}

async fn get_game<O: Oracle>(
    State(state): State<Arc<AppState<O>>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| GalleryError::NotFound)?;
    let game = state.gallery().await?.get(id).await?;
    Ok(([(header::CACHE_CONTROL, DETAIL_CACHE_CONTROL)], Json(game)).into_response())
}
