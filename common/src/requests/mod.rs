use crate::model::template::TemplateConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload for the render endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderRequest {
    pub config: TemplateConfig,
}

/// Payload for an explicit, user-initiated template save.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SaveTemplateRequest {
    /// Missing or empty ids create a new template.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub config: TemplateConfig,
}

/// Payload for a background snapshot of in-progress edits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AutoSaveRequest {
    pub id: String,
    pub config: TemplateConfig,
}

/// A document paired with candidate sample/recipient data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BindRequest {
    pub document: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SampleDataRequest {
    pub paths: Vec<String>,
}

/// Export of a stored template, optionally populated with recipient data.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub include_timestamp: bool,
}

/// Starts a batch merge of a stored template against CSV recipient rows.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StartMergeRequest {
    pub template_id: String,
    /// CSV text whose header cells are dot paths (e.g. `recipient.name`).
    pub csv: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionEditRequest {
    pub config: TemplateConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSaveRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}
