//! Error types for the I/O boundaries of the certificate pipeline.
//!
//! Pure computations (render, token detection, resolution, flattening) never
//! fail for data-shape reasons and return plain values. Only persistence,
//! sample-data generation and export report failures, each through its own
//! enum. `ServiceError` aggregates them for the HTTP host.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("template '{0}' not found")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Join(String),

    #[error("editing session is closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("sample data service unavailable: {0}")]
    Unavailable(String),

    #[error("sample data service returned no content")]
    EmptyOutput,

    #[error("sample data is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("sample data must be a JSON object")]
    NotAnObject,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("render target not found: {0}")]
    MissingRenderTarget(String),

    #[error("JPEG quality must be in (0, 1], got {0}")]
    InvalidQuality(f32),

    #[error("export scale must be in (0, 4], got {0}")]
    InvalidScale(f32),

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("image encoding failed: {0}")]
    Encode(String),

    #[error("PDF rendering failed: {0}")]
    Pdf(#[from] genpdf::error::Error),

    #[error("font loading failed: {0}")]
    Font(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for ExportError {
    fn from(err: image::ImageError) -> Self {
        ExportError::Encode(err.to_string())
    }
}

impl From<png::EncodingError> for ExportError {
    fn from(err: png::EncodingError) -> Self {
        ExportError::Encode(err.to_string())
    }
}

/// Errors surfaced by the HTTP host.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("job not found")]
    JobNotFound,

    #[error("no open editing session for template '{0}'")]
    SessionNotOpen(String),
}

impl ServiceError {
    fn code(&self) -> &'static str {
        match self {
            ServiceError::Persistence(PersistenceError::NotFound(_)) => "TemplateNotFound",
            ServiceError::Persistence(_) => "PersistenceFailed",
            ServiceError::Generation(_) => "GenerationFailed",
            ServiceError::Export(ExportError::MissingRenderTarget(_)) => "MissingRenderTarget",
            ServiceError::Export(_) => "ExportFailed",
            ServiceError::InvalidRequest(_) => "InvalidRequest",
            ServiceError::JobNotFound => "JobNotFound",
            ServiceError::SessionNotOpen(_) => "SessionNotOpen",
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Persistence(PersistenceError::NotFound(_))
            | ServiceError::JobNotFound
            | ServiceError::SessionNotOpen(_) => {
                StatusCode::NOT_FOUND
            }
            ServiceError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Generation(GenerationError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Generation(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Export(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            log::error!("{}", self);
        }
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }))
    }
}
