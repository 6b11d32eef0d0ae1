use crate::render::render;
use crate::variables::detect_tokens;
use actix_web::{web, HttpResponse, Responder};
use common::requests::RenderRequest;
use serde_json::json;

/// The Actix web handler for `POST /api/templates/render`.
///
/// # Returns
/// The rendered `document`, the `tokens` it contains and the canonical `geometry`.
pub async fn process(payload: web::Json<RenderRequest>) -> impl Responder {
    let document = render(&payload.config);
    let tokens = detect_tokens(&document);
    HttpResponse::Ok().json(json!({
        "document": document,
        "tokens": tokens,
        "geometry": payload.config.size.geometry(),
    }))
}
