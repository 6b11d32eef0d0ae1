mod start;

use crate::error::ServiceError;
use crate::job_controller::JobsState;
use actix_web::{web, HttpResponse};

pub use start::parse_recipients;

const API_PATH: &str = "/api/merge";

/// Configures and returns the Actix `Scope` for all merge-related routes.
pub fn configure_routes() -> actix_web::Scope {
    web::scope(API_PATH)
        .route("/start", web::post().to(start::process))
        .route("/status/{job_id}", web::get().to(status))
}

async fn status(
    job_id: web::Path<String>,
    state: web::Data<JobsState>,
) -> Result<HttpResponse, ServiceError> {
    let status = state.status(&job_id).await.ok_or(ServiceError::JobNotFound)?;
    Ok(HttpResponse::Ok().json(status))
}
