//! HTTP front end: a form page and endpoints that run text through the parser
//! and renderer.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::{parse_forest, ParseError, RenderError, RenderOptions, Renderer, SynthesisNode};

const INDEX_HTML: &str = include_str!("../../templates/index.html");

#[derive(Clone)]
pub struct AppState {
    pub renderer: Arc<Renderer>,
    /// Options used for anything a request leaves out.
    pub defaults: Arc<RenderOptions>,
}

impl AppState {
    pub fn new(renderer: Renderer, defaults: RenderOptions) -> Self {
        Self { renderer: Arc::new(renderer), defaults: Arc::new(defaults) }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/visualize", post(visualize))
        .route("/parse", post(parse))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct VisualizeRequest {
    pub text: String,
    pub rankdir: Option<String>,
    pub node_image_size: Option<u32>,
    pub dpi: Option<u32>,
}

impl VisualizeRequest {
    fn options(&self, defaults: &RenderOptions) -> Result<RenderOptions, RenderError> {
        let mut options = defaults.clone();
        if let Some(rankdir) = self.rankdir.as_deref().filter(|r| !r.trim().is_empty()) {
            options.rankdir = rankdir.trim().parse()?;
        }
        if let Some(size) = self.node_image_size {
            options.node_image_size = size;
        }
        if let Some(dpi) = self.dpi {
            options.dpi = dpi;
        }
        options.validate()?;
        Ok(options)
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid request body: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Parse(_) => StatusCode::BAD_REQUEST,
            ApiError::Render(RenderError::InvalidStructure { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Render(e) if e.is_user_error() => StatusCode::BAD_REQUEST,
            ApiError::Render(_) | ApiError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "failed to render the synthesis diagram".to_string()
        } else {
            warn!(error = %self, "rejected request");
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// `POST /visualize`: render the submitted synthesis to PNG.
pub async fn visualize(
    State(state): State<AppState>,
    payload: Result<Json<VisualizeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let options = request.options(&state.defaults)?;

    let png = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ApiError> {
        let forest = parse_forest(&request.text)?;
        Ok(state.renderer.render_forest(&forest, &options)?)
    })
    .await??;

    info!(bytes = png.len(), "rendered synthesis");
    Ok(([(CONTENT_TYPE, "image/png")], png).into_response())
}

/// `POST /parse`: return the parsed trees as JSON.
pub async fn parse(
    payload: Result<Json<VisualizeRequest>, JsonRejection>,
) -> Result<Json<Vec<SynthesisNode>>, ApiError> {
    let Json(request) = payload?;
    let forest = tokio::task::spawn_blocking(move || parse_forest(&request.text)).await??;
    Ok(Json(forest))
}
