//! # Variable Service Module
//!
//! Routes under `/api/variables`:
//!
//! *   **`POST /detect`**: tokens of a document grouped by namespace, plus the
//!     ones the supplied data leaves unresolved.
//! *   **`POST /resolve`**: the document with every resolvable token replaced.
//! *   **`POST /sample`**: sample data for a list of variable paths, produced
//!     by the configured generation service.

use crate::error::{GenerationError, ServiceError};
use crate::sample_data::synthesize;
use crate::services::AppState;
use crate::variables::{bind, resolve};
use actix_web::web::{post, scope};
use actix_web::{web, HttpResponse, Responder, Scope};
use common::requests::{BindRequest, SampleDataRequest};
use serde_json::json;

const API_PATH: &str = "/api/variables";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/detect", post().to(detect))
        .route("/resolve", post().to(resolve_document))
        .route("/sample", post().to(sample))
}

async fn detect(payload: web::Json<BindRequest>) -> impl Responder {
    HttpResponse::Ok().json(bind(&payload.document, &payload.data))
}

async fn resolve_document(payload: web::Json<BindRequest>) -> impl Responder {
    let binding = bind(&payload.document, &payload.data);
    HttpResponse::Ok().json(json!({
        "document": resolve(&payload.document, &payload.data),
        "missing": binding.missing,
    }))
}

async fn sample(
    state: web::Data<AppState>,
    payload: web::Json<SampleDataRequest>,
) -> Result<HttpResponse, ServiceError> {
    let generator = state.generator.as_deref().ok_or_else(|| {
        GenerationError::Unavailable("no sample data generator is configured".to_string())
    })?;
    if payload.paths.is_empty() {
        return Err(ServiceError::InvalidRequest("no variable paths given".to_string()));
    }
    let data = synthesize(generator, &payload.paths).await?;
    Ok(HttpResponse::Ok().json(data))
}
