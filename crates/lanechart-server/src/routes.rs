use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::PipelineError;
use crate::pipeline::{ChartOutcome, Pipeline};

pub const DEFAULT_PROMPT: &str = "Explain the phases of an SAP implementation project";

#[derive(Debug, Default, Deserialize)]
pub struct ChartRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

impl ChartRequest {
    /// An empty body asks for the default prompt. Anything else must be a
    /// JSON request, whatever content type it was sent with.
    fn parse(body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))
    }

    /// The prompt to run, falling back to [`DEFAULT_PROMPT`] when absent or blank.
    fn prompt(&self) -> &str {
        self.prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PROMPT)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartResponse {
    pub status: &'static str,
    pub edit_url: String,
    pub view_url: String,
    pub source_document: Option<String>,
    pub source_url: Option<String>,
}

impl From<ChartOutcome> for ChartResponse {
    fn from(outcome: ChartOutcome) -> Self {
        Self {
            status: "Chart created successfully.",
            edit_url: outcome.edit_url,
            view_url: outcome.view_url,
            source_document: outcome.source_document,
            source_url: outcome.source_url,
        }
    }
}

/// Everything a request can fail with. Only the message reaches the caller.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Pipeline(PipelineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            ApiError::Pipeline(err) => (err.status(), err.summary().to_string()),
        };
        let body = Json(json!({ "error": { "message": message } }));
        (status, body).into_response()
    }
}

pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/api/charts", post(create_chart))
        .with_state(pipeline)
}

async fn create_chart(
    State(pipeline): State<Arc<Pipeline>>,
    body: Bytes,
) -> Result<Json<ChartResponse>, ApiError> {
    let request = ChartRequest::parse(&body)?;

    let prompt = request.prompt();
    let started = Instant::now();
    info!(prompt; "chart requested");

    match pipeline.run(prompt).await {
        Ok(outcome) => {
            info!(
                edit_url = outcome.edit_url.as_str(),
                elapsed_ms = started.elapsed().as_millis() as u64;
                "chart created"
            );
            Ok(Json(outcome.into()))
        }
        Err(err) => {
            error!(err:err, elapsed_ms = started.elapsed().as_millis() as u64; "chart request failed");
            Err(ApiError::Pipeline(err))
        }
    }
}
