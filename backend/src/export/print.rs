//! Paginated ("print") export.
//!
//! The rendered document is wrapped into a print view: a page exactly the
//! size of the canonical geometry with no margins, and a stylesheet hiding
//! editor chrome and selection outlines. The host's [`DocumentPrinter`] turns
//! that view into the paginated artifact.

use crate::error::ExportError;
use crate::render::CERTIFICATE_ELEMENT_ID;
use async_trait::async_trait;
use common::model::export::{ExportArtifact, ExportFormat};
use common::model::template::Geometry;

/// Attribute marking interactive elements that never belong in an export.
pub const EDITOR_CHROME_ATTR: &str = "data-editor-chrome";
pub const SELECTION_OUTLINE_CLASS: &str = "selection-outline";

/// The host's print view.
#[async_trait]
pub trait DocumentPrinter: Send + Sync {
    async fn print(&self, document: &str, geometry: Geometry) -> Result<Vec<u8>, ExportError>;
}

/// Wraps `document` for printing. Fails if it has no certificate element.
pub fn build_print_document(document: &str, geometry: Geometry) -> Result<String, ExportError> {
    let marker = format!("id=\"{CERTIFICATE_ELEMENT_ID}\"");
    if !document.contains(&marker) {
        return Err(ExportError::MissingRenderTarget(format!(
            "document has no #{CERTIFICATE_ELEMENT_ID} element"
        )));
    }

    let style = print_css(geometry);
    let printable = match document.find("</head>") {
        Some(at) => format!("{}{}{}", &document[..at], style, &document[at..]),
        None => format!("{style}{document}"),
    };
    Ok(printable)
}

fn print_css(geometry: Geometry) -> String {
    format!(
        "<style media=\"print\">\n\
         @page {{ size: {w}px {h}px; margin: 0; }}\n\
         html, body {{ margin: 0; padding: 0; background: #ffffff; }}\n\
         [{chrome}], .{outline}, .resize-handle {{ display: none !important; }}\n\
         #{id}, #{id} * {{ outline: none !important; box-shadow: none; }}\n\
         #{id} {{ transform: none !important; page-break-inside: avoid; }}\n\
         </style>\n",
        w = geometry.width,
        h = geometry.height,
        chrome = EDITOR_CHROME_ATTR,
        outline = SELECTION_OUTLINE_CLASS,
        id = CERTIFICATE_ELEMENT_ID,
    )
}

/// Builds the print view of `document` and hands it to `printer`.
pub async fn export_paginated_document(
    printer: &dyn DocumentPrinter,
    document: &str,
    geometry: Geometry,
    filename: String,
) -> Result<ExportArtifact, ExportError> {
    let printable = build_print_document(document, geometry)?;
    let bytes = printer.print(&printable, geometry).await.map_err(|err| {
        log::error!("printing {filename} failed: {err}");
        err
    })?;
    Ok(ExportArtifact {
        format: ExportFormat::Pdf,
        width: geometry.width,
        height: geometry.height,
        bytes,
        filename,
    })
}
