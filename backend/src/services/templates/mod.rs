//! # Template Service Module
//!
//! Routes under `/api/templates`:
//!
//! *   **`POST /render`** (`preview::process`): renders a `TemplateConfig` and
//!     returns the document with the tokens it contains.
//! *   **`POST /save`** (`save::process`): confirmed save. A missing id creates a
//!     new template; the response carries the id, timestamp and version.
//! *   **`POST /autosave`** (`save::autosave`): stores the background snapshot.
//! *   **`GET /{template_id}`** (`get::process`): the stored template and whether
//!     a newer background draft is available for recovery.
//! *   **`POST /pdf/{template_id}`** (`pdf::process`): renders the template,
//!     optionally fills it with recipient data and returns the PDF.

mod get;
mod pdf;
mod preview;
mod save;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/templates";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/render", post().to(preview::process))
        .route("/save", post().to(save::process))
        .route("/autosave", post().to(save::autosave))
        .route("/{template_id}", get().to(get::process))
        .route("/pdf/{template_id}", post().to(pdf::process))
}
