use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    PaginatedDocument,
    RasterBitmap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Png,
    Jpeg,
}

impl ExportFormat {
    pub fn kind(self) -> ArtifactKind {
        match self {
            ExportFormat::Pdf => ArtifactKind::PaginatedDocument,
            ExportFormat::Png | ExportFormat::Jpeg => ArtifactKind::RasterBitmap,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Raster export options. `quality` only applies to JPEG and must lie in `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterOptions {
    pub format: ExportFormat,
    pub quality: f32,
    /// Device pixel ratio applied on top of the canonical geometry.
    pub scale: f32,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Png,
            quality: 0.92,
            scale: 1.0,
        }
    }
}

/// A generated file, handed to the caller for download or storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportArtifact {
    pub format: ExportFormat,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub filename: String,
}

impl ExportArtifact {
    pub fn kind(&self) -> ArtifactKind {
        self.format.kind()
    }
}
