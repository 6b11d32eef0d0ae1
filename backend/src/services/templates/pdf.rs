use crate::error::ServiceError;
use crate::export::{export_paginated_document, generate_export_filename};
use crate::render::render;
use crate::services::AppState;
use crate::variables::{bind, resolve};
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};
use common::model::export::ExportFormat;
use common::requests::ExportRequest;

/// The Actix web handler for `POST /api/templates/pdf/{template_id}`.
///
/// Exports a stored template as PDF, filled with `data` when given.
///
/// Tokens left unresolved are reported in the `X-Missing-Variables` header so
/// callers can warn about visible placeholders.
///
/// # Arguments
/// * `state` - The shared `AppState` holding the store and the printer.
/// * `template_id` - The stored template to export.
/// * `payload` - Optional recipient data and the timestamp-suffix flag.
///
/// # Returns
/// The PDF as an attachment, `404` for an unknown template or `422` when
/// printing fails.
pub async fn process(
    state: web::Data<AppState>,
    template_id: web::Path<String>,
    payload: web::Json<ExportRequest>,
) -> Result<HttpResponse, ServiceError> {
    let request = payload.into_inner();
    let stored = state.store.load(&template_id).await?;

    let mut document = render(&stored.config);
    let mut missing = Vec::new();
    if let Some(data) = &request.data {
        missing = bind(&document, data).missing;
        document = resolve(&document, data);
    }

    let name = if stored.name.trim().is_empty() {
        template_id.as_str()
    } else {
        stored.name.as_str()
    };
    let format = ExportFormat::Pdf;
    let filename = generate_export_filename(name, format.extension(), request.include_timestamp);
    let artifact = export_paginated_document(
        state.printer.as_ref(),
        &document,
        stored.config.size.geometry(),
        filename,
    )
    .await?;

    Ok(HttpResponse::Ok()
        .content_type(format.mime_type())
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(artifact.filename.clone())],
        })
        .insert_header(("X-Missing-Variables", missing.join(",")))
        .body(artifact.bytes))
}
