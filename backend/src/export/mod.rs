//! # Export Pipeline
//!
//! Turns a rendered (and usually data-substituted) document into a static
//! artifact at a deterministic size:
//!
//! - [`export_raster`] captures the live preview element through the host's
//!   [`PreviewElement`] handle and encodes PNG or JPEG at the canonical
//!   geometry, independent of the preview zoom.
//! - [`export_paginated_document`] builds a print view sized to the geometry
//!   and hands it to a [`DocumentPrinter`]; [`GenpdfPrinter`] is the
//!   built-in one.
//!
//! A missing certificate element fails fast with
//! [`ExportError::MissingRenderTarget`](crate::error::ExportError::MissingRenderTarget).

pub mod filename;
pub mod pdf;
pub mod print;
pub mod raster;

pub use filename::generate_export_filename;
pub use pdf::GenpdfPrinter;
pub use print::{build_print_document, export_paginated_document, DocumentPrinter};
pub use raster::{export_raster, PreviewElement};
