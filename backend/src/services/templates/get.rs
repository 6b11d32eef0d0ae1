//! `GET /api/templates/{template_id}`: the stored template plus, when the
//! background snapshot is newer than the last confirmed save, the snapshot
//! itself under `recovery`. Nothing is applied; the client decides.

use crate::drafts::recovery_offer;
use crate::error::ServiceError;
use crate::services::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn process(
    state: web::Data<AppState>,
    template_id: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let stored = state.store.load(&template_id).await?;
    let recovery = recovery_offer(&stored).map(|offer| offer.accept());
    Ok(HttpResponse::Ok().json(json!({
        "template": stored,
        "recovery": recovery,
    })))
}
