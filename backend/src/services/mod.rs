//! # HTTP Services
//!
//! Actix-web surface of the certificate pipeline. Every route group lives in
//! its own sub-module and exposes a `configure_routes()` returning its
//! `Scope`:
//!
//! - `templates`: render, save, auto-save, load and PDF export of templates.
//! - `variables`: token detection, resolution and sample-data generation.
//! - `sessions`: server-side editing sessions driven by a draft reconciler.
//! - `merge`: batch PDF generation from CSV recipient rows, run as a job.
//!
//! Shared dependencies are injected as `web::Data<AppState>`; the job
//! controller's `JobsState` is injected separately.

pub mod merge;
pub mod sessions;
pub mod templates;
pub mod variables;

use crate::drafts::{AutoSaveSettings, TemplateStore};
use crate::export::DocumentPrinter;
use crate::sample_data::SampleDataGenerator;
use actix_web::web;
use sessions::SessionRegistry;
use std::path::PathBuf;
use std::sync::Arc;

pub struct AppState {
    pub store: Arc<dyn TemplateStore>,
    pub printer: Arc<dyn DocumentPrinter>,
    /// `None` when no generation service is configured.
    pub generator: Option<Arc<dyn SampleDataGenerator>>,
    pub sessions: SessionRegistry,
    pub autosave: AutoSaveSettings,
    /// Where batch merges write their PDFs.
    pub output_dir: PathBuf,
}

impl AppState {
    pub fn new(
        store: Arc<dyn TemplateStore>,
        printer: Arc<dyn DocumentPrinter>,
        autosave: AutoSaveSettings,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            printer,
            generator: None,
            sessions: SessionRegistry::default(),
            autosave,
            output_dir: output_dir.into(),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn SampleDataGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }
}

/// Registers every route group.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(templates::configure_routes())
        .service(variables::configure_routes())
        .service(sessions::configure_routes())
        .service(merge::configure_routes());
}
