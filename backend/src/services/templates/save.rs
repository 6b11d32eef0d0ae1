use crate::error::ServiceError;
use crate::render::render;
use crate::services::AppState;
use actix_web::{web, HttpResponse};
use common::requests::{AutoSaveRequest, SaveTemplateRequest};
use serde_json::json;
use uuid::Uuid;

/// The Actix web handler for `POST /api/templates/save`.
///
/// Confirmed save. The stored document is always rendered from the config,
/// never taken from the client.
///
/// # Arguments
/// * `state` - The shared `AppState` holding the template store.
/// * `payload` - Name, description, config and an optional id. A missing or
///   blank id creates a new template.
///
/// # Returns
/// The template `id`, `saved_at` and new `version`, or `400` for a blank name.
pub async fn process(
    state: web::Data<AppState>,
    payload: web::Json<SaveTemplateRequest>,
) -> Result<HttpResponse, ServiceError> {
    let payload = payload.into_inner();
    if payload.name.trim().is_empty() {
        return Err(ServiceError::InvalidRequest("template name cannot be empty".to_string()));
    }
    let id = match payload.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => Uuid::new_v4().to_string(),
    };

    let document = render(&payload.config);
    let receipt = state
        .store
        .save(&id, &payload.config, &document, payload.name.trim(), &payload.description)
        .await?;
    log::info!("template {id} saved as version {}", receipt.version);

    Ok(HttpResponse::Ok().json(json!({
        "id": id,
        "saved_at": receipt.saved_at,
        "version": receipt.version,
    })))
}

/// The Actix web handler for `POST /api/templates/autosave`.
///
/// Replaces the template's background snapshot; never touches the confirmed save.
///
/// # Returns
/// The template `id` and the snapshot's `saved_at`.
pub async fn autosave(
    state: web::Data<AppState>,
    payload: web::Json<AutoSaveRequest>,
) -> Result<HttpResponse, ServiceError> {
    let payload = payload.into_inner();
    if payload.id.trim().is_empty() {
        return Err(ServiceError::InvalidRequest("template id cannot be empty".to_string()));
    }
    let document = render(&payload.config);
    let saved_at = state.store.auto_save(&payload.id, &payload.config, &document).await?;
    Ok(HttpResponse::Ok().json(json!({
        "id": payload.id,
        "saved_at": saved_at,
    })))
}
