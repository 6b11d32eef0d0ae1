use crate::error::PersistenceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::model::draft::{SaveReceipt, StoredTemplate};
use common::model::template::TemplateConfig;

/// Persistence service boundary. The reconciler depends only on these calls,
/// never on the storage technology behind them.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Replaces the template's background snapshot and returns its timestamp.
    async fn auto_save(
        &self,
        id: &str,
        config: &TemplateConfig,
        document: &str,
    ) -> Result<DateTime<Utc>, PersistenceError>;

    /// Confirmed save: stores the full template, bumps its version and clears
    /// any background snapshot.
    async fn save(
        &self,
        id: &str,
        config: &TemplateConfig,
        document: &str,
        name: &str,
        description: &str,
    ) -> Result<SaveReceipt, PersistenceError>;

    async fn load(&self, id: &str) -> Result<StoredTemplate, PersistenceError>;
}
