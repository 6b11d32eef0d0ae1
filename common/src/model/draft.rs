//! Persisted and transient template state exchanged with the persistence service.

use crate::model::template::TemplateConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unconfirmed copy of in-progress edits. At most one exists per template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoSaveSnapshot {
    pub config: TemplateConfig,
    pub document: String,
    pub timestamp: DateTime<Utc>,
}

/// A template as returned by the persistence service's `load`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub config: TemplateConfig,
    pub document: String,
    pub version: u64,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub auto_save: Option<AutoSaveSnapshot>,
}

impl StoredTemplate {
    /// The background snapshot, if it is strictly newer than the last confirmed save.
    pub fn newer_snapshot(&self) -> Option<&AutoSaveSnapshot> {
        let snapshot = self.auto_save.as_ref()?;
        match self.last_saved_at {
            Some(saved_at) if snapshot.timestamp <= saved_at => None,
            _ => Some(snapshot),
        }
    }
}

/// Outcome of a confirmed, user-initiated save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReceipt {
    pub saved_at: DateTime<Utc>,
    pub version: u64,
}

/// Auto-save synchronizer state for one template instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Clean,
    Dirty,
    Scheduled,
    Saving,
    Retrying,
}
