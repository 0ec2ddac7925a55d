use axum::http::StatusCode;

use lanechart_core::package::PackageError;
use lanechart_generate::GenerateError;

/// Failure talking to one of the outbound HTTP services.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service responded {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Response(String),
}

impl UpstreamError {
    /// Turn a non-success response into [`UpstreamError::Status`]. The body only ever reaches the log.
    pub async fn check(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(UpstreamError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// One variant per pipeline step that can fail.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("embedding the prompt failed: {0}")]
    Embedding(#[source] GenerateError),
    #[error("document search failed: {0}")]
    Retrieval(#[source] UpstreamError),
    #[error("describing the process failed: {0}")]
    Description(#[source] GenerateError),
    #[error("generating the chart failed: {0}")]
    Generation(#[source] GenerateError),
    #[error("packaging the chart failed: {0}")]
    Package(#[from] PackageError),
    #[error("uploading the chart failed: {0}")]
    Upload(#[source] UpstreamError),
    #[error("submitting the chart failed: {0}")]
    Hosting(#[source] UpstreamError),
}

impl PipelineError {
    /// The failed step, without its cause. This is all a caller gets to see.
    pub fn summary(&self) -> &'static str {
        match self {
            PipelineError::Embedding(_) => "embedding the prompt failed",
            PipelineError::Retrieval(_) => "document search failed",
            PipelineError::Description(_) => "describing the process failed",
            PipelineError::Generation(_) => "generating the chart failed",
            PipelineError::Package(_) => "packaging the chart failed",
            PipelineError::Upload(_) => "uploading the chart failed",
            PipelineError::Hosting(_) => "submitting the chart failed",
        }
    }

    /// Upstream failures are a bad gateway; output we could not decode or
    /// package is our own failure.
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::Embedding(e)
            | PipelineError::Description(e)
            | PipelineError::Generation(e)
                if e.is_malformed() =>
            {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            PipelineError::Package(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}
