//! # Merge Job Start Service
//!
//! `POST /api/merge/start` generates one certificate PDF per recipient row.
//!
//! ## Workflow:
//!
//! 1.  **HTTP Request**: `process` receives a `StartMergeRequest` with a
//!     `template_id` and CSV text whose header cells are dot paths
//!     (`recipient.name`, `firma_1.nombre`, ...).
//!
//! 2.  **Validation**: the template is loaded and the CSV parsed up front, so
//!     a bad request fails immediately instead of producing a failed job.
//!
//! 3.  **Job Scheduling**: `schedule_merge_job` registers a `Pending` job,
//!     returns its id to the client and spawns the worker.
//!
//! 4.  **Resolution**: the template is rendered once and resolved against
//!     every row in parallel (rayon) on the blocking pool.
//!
//! 5.  **Printing**: each resolved document is printed through the host's
//!     printer and written as `{job_id}_{row_index}.pdf` in the output
//!     directory, reporting progress after every row.

use crate::error::{ExportError, ServiceError};
use crate::export::export_paginated_document;
use crate::job_controller::JobsState;
use crate::render::render;
use crate::services::AppState;
use crate::variables::{resolve, unflatten};
use actix_web::{web, HttpResponse};
use common::jobs::JobStatus;
use common::model::draft::StoredTemplate;
use common::requests::StartMergeRequest;
use rayon::prelude::*;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// The Actix web handler for `POST /api/merge/start`.
///
/// Validates the template and the CSV before scheduling, then returns the
/// `job_id` immediately. Clients poll `/api/merge/status/{job_id}`.
///
/// # Arguments
/// * `app` - The shared `AppState`, for the store, printer and output directory.
/// * `jobs` - The shared `JobsState` the job is registered in.
/// * `payload` - The `template_id` and the CSV recipient rows.
///
/// # Returns
/// An `HttpResponse` with the `job_id`, `404` for an unknown template or
/// `400` for an unreadable or empty CSV.
pub(crate) async fn process(
    app: web::Data<AppState>,
    jobs: web::Data<JobsState>,
    payload: web::Json<StartMergeRequest>,
) -> Result<HttpResponse, ServiceError> {
    let request = payload.into_inner();
    let stored = app.store.load(&request.template_id).await?;
    let recipients = parse_recipients(&request.csv).map_err(ServiceError::InvalidRequest)?;
    if recipients.is_empty() {
        return Err(ServiceError::InvalidRequest("the CSV has no recipient rows".to_string()));
    }

    let job_id = schedule_merge_job(app.into_inner(), jobs.get_ref().clone(), stored, recipients).await;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "job_id": job_id })))
}

/// Parses CSV recipient rows into nested data objects keyed by the header paths.
///
/// # Arguments
/// * `csv_text` - CSV with a header row of dot paths, `,` or `;` separated.
///
/// # Returns
/// One nested JSON object per data row, or an error `String` naming the bad row.
pub fn parse_recipients(csv_text: &str) -> Result<Vec<Value>, String> {
    let header_line = csv_text.lines().next().unwrap_or_default();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(header_line))
        .trim(csv::Trim::All)
        .from_reader(csv_text.as_bytes());

    let headers = reader.headers().map_err(|e| e.to_string())?.clone();
    if headers.iter().any(|h| h.is_empty()) {
        return Err("CSV header cells cannot be empty".to_string());
    }

    reader
        .records()
        .enumerate()
        .map(|(i, record)| {
            let record = record.map_err(|e| format!("row {}: {e}", i + 1))?;
            Ok(unflatten(
                headers
                    .iter()
                    .zip(record.iter())
                    .map(|(header, value)| (header, Value::String(value.to_string()))),
            ))
        })
        .collect()
}

/// `;` when the header uses more semicolons than commas, `,` otherwise.
fn detect_delimiter(header_line: &str) -> u8 {
    let semicolons = header_line.matches(';').count();
    let commas = header_line.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

fn progress(row_index: usize, total_rows: usize) -> u32 {
    if total_rows > 0 {
        ((row_index + 1) as f32 / total_rows as f32 * 100.0) as u32
    } else {
        0
    }
}

/// Registers a `Pending` merge job and spawns the task that runs it.
///
/// # Arguments
/// * `app` - The shared `AppState`, moved into the spawned task.
/// * `jobs` - The `JobsState` receiving progress and the final status.
/// * `stored` - The template to render once for every recipient.
/// * `recipients` - Parsed recipient rows.
///
/// # Returns
/// The new `job_id`.
async fn schedule_merge_job(
    app: Arc<AppState>,
    jobs: JobsState,
    stored: StoredTemplate,
    recipients: Vec<Value>,
) -> String {
    let job_id = Uuid::new_v4().to_string();
    jobs.register(&job_id).await;

    let id = job_id.clone();
    tokio::spawn(async move {
        let status = match run_merge(&app, &jobs, &id, stored, recipients).await {
            Ok(count) => {
                log::info!("merge {id} finished: {count} certificates");
                JobStatus::Completed(format!("{count} certificates generated"))
            }
            Err(err) => {
                log::error!("merge {id} failed: {err}");
                JobStatus::Failed(err.to_string())
            }
        };
        jobs.report(&id, status).await;
    });

    job_id
}

/// Renders the template, resolves it per row on the blocking pool and prints
/// one PDF per row as `{job_id}_{row_index}.pdf`.
///
/// # Returns
/// The number of certificates written.
async fn run_merge(
    app: &AppState,
    jobs: &JobsState,
    job_id: &str,
    stored: StoredTemplate,
    recipients: Vec<Value>,
) -> Result<usize, ServiceError> {
    jobs.report(job_id, JobStatus::InProgress(0)).await;
    let geometry = stored.config.size.geometry();
    let template = render(&stored.config);

    let documents: Vec<String> = tokio::task::spawn_blocking(move || {
        recipients
            .par_iter()
            .map(|data| resolve(&template, data))
            .collect()
    })
    .await
    .map_err(|e| ExportError::Io(std::io::Error::other(e.to_string())))?;

    tokio::fs::create_dir_all(&app.output_dir)
        .await
        .map_err(ExportError::from)?;

    let total = documents.len();
    for (i, document) in documents.iter().enumerate() {
        let filename = format!("{job_id}_{i}.pdf");
        let artifact =
            export_paginated_document(app.printer.as_ref(), document, geometry, filename).await?;
        tokio::fs::write(app.output_dir.join(&artifact.filename), &artifact.bytes)
            .await
            .map_err(ExportError::from)?;
        jobs.report(job_id, JobStatus::InProgress(progress(i, total))).await;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rows_become_nested_data() {
        let csv = "recipient.name,firma_1.nombre,course\nAda, Grace ,Rust\nAlan,Barbara,Go\n";
        let rows = parse_recipients(csv).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            json!({"recipient": {"name": "Ada"}, "firma_1": {"nombre": "Grace"}, "course": "Rust"})
        );
        assert_eq!(rows[1]["recipient"]["name"], "Alan");
    }

    #[test]
    fn semicolon_delimited_files() {
        let rows = parse_recipients("recipient.name;recipient.email\nAda;ada@example.com\n").unwrap();
        assert_eq!(rows[0]["recipient"]["email"], "ada@example.com");
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(parse_recipients("a,b\n1,2,3\n").is_err());
        assert!(parse_recipients("a,,b\n1,2,3\n").is_err());
    }

    #[test]
    fn progress_is_a_percentage() {
        assert_eq!(progress(0, 4), 25);
        assert_eq!(progress(3, 4), 100);
        assert_eq!(progress(0, 0), 0);
    }
}
