//! # SQLite Template Store
//!
//! [`TemplateStore`] implementation backed by a single SQLite file. Each call
//! opens its own connection inside `spawn_blocking` so the async runtime is
//! never blocked on disk I/O.
//!
//! Schema:
//! - `templates`: confirmed saves (`config` is JSON, `last_saved_at` RFC 3339).
//! - `autosaves`: at most one background snapshot per template.

use super::store::TemplateStore;
use crate::error::PersistenceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::model::draft::{AutoSaveSnapshot, SaveReceipt, StoredTemplate};
use common::model::template::TemplateConfig;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS templates (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    config TEXT NOT NULL,
    document TEXT NOT NULL,
    version INTEGER NOT NULL,
    last_saved_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS autosaves (
    template_id TEXT PRIMARY KEY,
    config TEXT NOT NULL,
    document TEXT NOT NULL,
    saved_at TEXT NOT NULL
);
";

#[derive(Debug, Clone)]
pub struct SqliteTemplateStore {
    path: PathBuf,
}

impl SqliteTemplateStore {
    /// Opens (and creates if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { path })
    }

    /// Runs `op` on a fresh connection in the blocking pool.
    async fn with_conn<T, F>(&self, op: F) -> Result<T, PersistenceError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, PersistenceError> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = Connection::open(path)?;
            op(&mut conn)
        })
        .await
        .map_err(|e| PersistenceError::Join(e.to_string()))?
    }
}

#[async_trait]
impl TemplateStore for SqliteTemplateStore {
    async fn auto_save(
        &self,
        id: &str,
        config: &TemplateConfig,
        document: &str,
    ) -> Result<DateTime<Utc>, PersistenceError> {
        let id = id.to_string();
        let config = serde_json::to_string(config)?;
        let document = document.to_string();
        self.with_conn(move |conn| {
            let saved_at = Utc::now();
            conn.execute(
                "INSERT OR REPLACE INTO autosaves (template_id, config, document, saved_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, config, document, saved_at.to_rfc3339()],
            )?;
            Ok(saved_at)
        })
        .await
    }

    async fn save(
        &self,
        id: &str,
        config: &TemplateConfig,
        document: &str,
        name: &str,
        description: &str,
    ) -> Result<SaveReceipt, PersistenceError> {
        if id.trim().is_empty() {
            return Err(PersistenceError::Storage("template id cannot be empty".to_string()));
        }
        let id = id.to_string();
        let config = serde_json::to_string(config)?;
        let document = document.to_string();
        let name = name.to_string();
        let description = description.to_string();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let current: Option<i64> = tx
                .query_row("SELECT version FROM templates WHERE id = ?1", params![id], |row| row.get(0))
                .optional()?;
            let version = current.unwrap_or(0) + 1;
            let saved_at = Utc::now();

            tx.execute(
                "INSERT OR REPLACE INTO templates (id, name, description, config, document, version, last_saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![id, name, description, config, document, version, saved_at.to_rfc3339()],
            )?;
            tx.execute("DELETE FROM autosaves WHERE template_id = ?1", params![id])?;
            tx.commit()?;

            Ok(SaveReceipt {
                saved_at,
                version: version as u64,
            })
        })
        .await
    }

    async fn load(&self, id: &str) -> Result<StoredTemplate, PersistenceError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let saved = conn
                .query_row(
                    "SELECT name, description, config, document, version, last_saved_at FROM templates WHERE id = ?1",
                    params![id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, i64>(4)?,
                            row.get::<_, String>(5)?,
                        ))
                    },
                )
                .optional()?;

            let snapshot = conn
                .query_row(
                    "SELECT config, document, saved_at FROM autosaves WHERE template_id = ?1",
                    params![id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?
                .map(|(config, document, saved_at)| -> Result<AutoSaveSnapshot, PersistenceError> {
                    Ok(AutoSaveSnapshot {
                        config: serde_json::from_str(&config)?,
                        document,
                        timestamp: parse_timestamp(&saved_at)?,
                    })
                })
                .transpose()?;

            match saved {
                Some((name, description, config, document, version, last_saved_at)) => Ok(StoredTemplate {
                    id,
                    name,
                    description,
                    config: serde_json::from_str(&config)?,
                    document,
                    version: version as u64,
                    last_saved_at: Some(parse_timestamp(&last_saved_at)?),
                    auto_save: snapshot,
                }),
                // Never explicitly saved, but a background draft exists.
                None if snapshot.is_some() => Ok(StoredTemplate {
                    id,
                    name: String::new(),
                    description: String::new(),
                    config: TemplateConfig::default(),
                    document: String::new(),
                    version: 0,
                    last_saved_at: None,
                    auto_save: snapshot,
                }),
                None => Err(PersistenceError::NotFound(id)),
            }
        })
        .await
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PersistenceError::Storage(format!("invalid timestamp '{value}': {e}")))
}
