//! # Draft Reconciler
//!
//! Keeps one template's in-progress edits synchronized with the persistence
//! service. Each open template gets its own [`DraftReconciler`], a handle to a
//! tokio task that owns the state machine, its timers and the single
//! in-flight persistence call:
//!
//! ```text
//! clean -> dirty -> scheduled -> saving -> clean
//!                                      \-> retrying -> saving ...
//! ```
//!
//! - Edits arm a debounce timer; further edits reset it, so only the trailing
//!   edit of a burst is persisted.
//! - A coarser interval timer bounds staleness under continuous editing.
//! - Failed auto-saves are retried after a fixed backoff up to `max_retries`
//!   times; then a failure event is emitted and the state returns to `dirty`.
//! - Explicit saves cancel every pending timer. If an auto-save is in flight
//!   they wait for it, so writes to one template never interleave.
//! - Edits arriving while a call is in flight are coalesced into the next
//!   debounce cycle.
//!
//! Closing the handle cancels all timers; an in-flight call is allowed to
//! finish before the task exits.

mod sqlite;
mod store;

pub use sqlite::SqliteTemplateStore;
pub use store::TemplateStore;

use crate::error::PersistenceError;
use chrono::{DateTime, Utc};
use common::model::draft::{AutoSaveSnapshot, SaveReceipt, StoredTemplate, SyncState};
use common::model::template::TemplateConfig;
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSaveSettings {
    pub debounce: Duration,
    pub interval: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for AutoSaveSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            interval: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff: Duration::from_secs(5),
        }
    }
}

/// Snapshot of the reconciler as observed by the editing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DraftStatus {
    pub state: SyncState,
    /// Last confirmed, user-initiated save.
    pub last_saved_at: Option<DateTime<Utc>>,
    /// Last successful background snapshot.
    pub last_auto_saved_at: Option<DateTime<Utc>>,
    pub version: u64,
}

/// Notifications meant for the user interface.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftEvent {
    StateChanged(SyncState),
    AutoSaved { saved_at: DateTime<Utc> },
    /// Every attempt of an auto-save cycle failed.
    AutoSaveFailed { attempts: u32, message: String },
    Saved(SaveReceipt),
}

/// A background snapshot newer than the last confirmed save.
///
/// Nothing is applied automatically; the user decides with [`RecoveryOffer::accept`]
/// or by dropping the offer.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryOffer {
    snapshot: AutoSaveSnapshot,
    last_saved_at: Option<DateTime<Utc>>,
}

impl RecoveryOffer {
    pub fn snapshot(&self) -> &AutoSaveSnapshot {
        &self.snapshot
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    pub fn accept(self) -> AutoSaveSnapshot {
        self.snapshot
    }
}

/// Returns a recovery offer if `stored` carries a snapshot strictly newer than its last save.
pub fn recovery_offer(stored: &StoredTemplate) -> Option<RecoveryOffer> {
    stored.newer_snapshot().map(|snapshot| RecoveryOffer {
        snapshot: snapshot.clone(),
        last_saved_at: stored.last_saved_at,
    })
}

/// Last durably persisted content the reconciler starts from.
#[derive(Debug, Clone, Default)]
pub struct Baseline {
    pub config: TemplateConfig,
    pub document: String,
    pub version: u64,
    pub last_saved_at: Option<DateTime<Utc>>,
}

impl From<&StoredTemplate> for Baseline {
    fn from(stored: &StoredTemplate) -> Self {
        Self {
            config: stored.config.clone(),
            document: stored.document.clone(),
            version: stored.version,
            last_saved_at: stored.last_saved_at,
        }
    }
}

/// Content fingerprint used for dirty checking.
pub fn fingerprint(config: &TemplateConfig, document: &str) -> String {
    let mut bytes = serde_json::to_vec(config).unwrap_or_default();
    bytes.push(0);
    bytes.extend_from_slice(document.as_bytes());
    format!("{:x}", md5::compute(bytes))
}

enum Command {
    Edit { config: TemplateConfig, document: String },
    Save(ExplicitSave),
    Close,
}

struct ExplicitSave {
    name: String,
    description: String,
    reply: oneshot::Sender<Result<SaveReceipt, PersistenceError>>,
}

/// Handle to one template's auto-save task.
pub struct DraftReconciler {
    template_id: String,
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<DraftStatus>,
    events: broadcast::Sender<DraftEvent>,
    task: JoinHandle<()>,
}

impl DraftReconciler {
    /// Loads `template_id` and starts a reconciler from its confirmed state.
    ///
    /// The returned offer is `Some` when a background snapshot is newer than
    /// the last confirmed save.
    pub async fn open(
        template_id: &str,
        store: Arc<dyn TemplateStore>,
        settings: AutoSaveSettings,
    ) -> Result<(Self, Option<RecoveryOffer>), PersistenceError> {
        let stored = store.load(template_id).await?;
        let offer = recovery_offer(&stored);
        if offer.is_some() {
            log::info!("template {template_id} has a newer background draft");
        }
        let reconciler = Self::spawn(template_id, store, Baseline::from(&stored), settings);
        Ok((reconciler, offer))
    }

    /// Starts a reconciler for `template_id`. Must be called within a tokio runtime.
    pub fn spawn(
        template_id: &str,
        store: Arc<dyn TemplateStore>,
        baseline: Baseline,
        settings: AutoSaveSettings,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(64);
        let (events_tx, _) = broadcast::channel(64);
        let status = DraftStatus {
            state: SyncState::Clean,
            last_saved_at: baseline.last_saved_at,
            last_auto_saved_at: None,
            version: baseline.version,
        };
        let (status_tx, status_rx) = watch::channel(status);

        let current = Draft::new(baseline.config, baseline.document);
        let worker = Worker {
            id: template_id.to_string(),
            store,
            settings,
            commands: commands_rx,
            status_tx,
            events: events_tx.clone(),
            status,
            persisted: current.fingerprint.clone(),
            current,
            debounce_at: None,
            retry_at: None,
            retries: 0,
            in_flight: None,
            queued_saves: VecDeque::new(),
            closing: false,
        };

        Self {
            template_id: template_id.to_string(),
            commands: commands_tx,
            status: status_rx,
            events: events_tx,
            task: tokio::spawn(worker.run()),
        }
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    /// Records a configuration change together with its rendered document.
    pub async fn edit(&self, config: TemplateConfig, document: String) -> Result<(), PersistenceError> {
        self.commands
            .send(Command::Edit { config, document })
            .await
            .map_err(|_| PersistenceError::Closed)
    }

    /// Confirmed save of the latest edits. Resolves once the write finished.
    pub async fn save(&self, name: &str, description: &str) -> Result<SaveReceipt, PersistenceError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Save(ExplicitSave {
                name: name.to_string(),
                description: description.to_string(),
                reply,
            }))
            .await
            .map_err(|_| PersistenceError::Closed)?;
        response.await.map_err(|_| PersistenceError::Closed)?
    }

    pub fn status(&self) -> DraftStatus {
        *self.status.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<DraftStatus> {
        self.status.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DraftEvent> {
        self.events.subscribe()
    }

    /// Cancels pending timers and waits for an in-flight call to finish.
    ///
    /// Explicit saves still queued behind that call fail with
    /// [`PersistenceError::Closed`]. Later commands are rejected the same way.
    pub async fn close(&self) {
        let _ = self.commands.send(Command::Close).await;
        // The status sender is dropped when the task exits.
        let mut status = self.status.clone();
        while status.changed().await.is_ok() {}
    }
}

impl Drop for DraftReconciler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Clone)]
struct Draft {
    config: TemplateConfig,
    document: String,
    fingerprint: String,
}

impl Draft {
    fn new(config: TemplateConfig, document: String) -> Self {
        let fingerprint = fingerprint(&config, &document);
        Self {
            config,
            document,
            fingerprint,
        }
    }
}

enum Completion {
    AutoSave {
        fingerprint: String,
        result: Result<DateTime<Utc>, PersistenceError>,
    },
    Explicit {
        fingerprint: String,
        reply: oneshot::Sender<Result<SaveReceipt, PersistenceError>>,
        result: Result<SaveReceipt, PersistenceError>,
    },
}

type InFlight = Pin<Box<dyn Future<Output = Completion> + Send>>;

struct Worker {
    id: String,
    store: Arc<dyn TemplateStore>,
    settings: AutoSaveSettings,
    commands: mpsc::Receiver<Command>,
    status_tx: watch::Sender<DraftStatus>,
    events: broadcast::Sender<DraftEvent>,
    status: DraftStatus,
    current: Draft,
    persisted: String,
    debounce_at: Option<Instant>,
    retry_at: Option<Instant>,
    retries: u32,
    in_flight: Option<InFlight>,
    queued_saves: VecDeque<ExplicitSave>,
    closing: bool,
}

impl Worker {
    async fn run(mut self) {
        let period = self.settings.interval.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv(), if !self.closing => match command {
                    Some(Command::Edit { config, document }) => self.on_edit(config, document),
                    Some(Command::Save(save)) => self.on_save(save),
                    Some(Command::Close) | None => self.begin_close(),
                },
                completion = next_completion(&mut self.in_flight) => {
                    self.in_flight = None;
                    self.on_completion(completion);
                }
                _ = sleep_until(self.debounce_at), if !self.closing => {
                    self.debounce_at = None;
                    self.persist_if_dirty();
                }
                _ = sleep_until(self.retry_at), if !self.closing => {
                    self.retry_at = None;
                    self.persist_if_dirty();
                }
                _ = interval.tick(), if !self.closing => {
                    if matches!(self.status.state, SyncState::Dirty | SyncState::Scheduled | SyncState::Retrying) {
                        log::debug!("template {}: interval auto-save", self.id);
                        self.persist_if_dirty();
                    }
                }
            }

            if self.closing && self.in_flight.is_none() {
                break;
            }
        }

        for save in self.queued_saves.drain(..) {
            let _ = save.reply.send(Err(PersistenceError::Closed));
        }
        log::debug!("template {}: draft reconciler stopped", self.id);
    }

    fn on_edit(&mut self, config: TemplateConfig, document: String) {
        self.current = Draft::new(config, document);
        if self.in_flight.is_some() {
            // Picked up by the next debounce cycle once the call completes.
            return;
        }
        if self.current.fingerprint == self.persisted && self.status.state != SyncState::Retrying {
            self.debounce_at = None;
            self.set_state(SyncState::Clean);
            return;
        }
        self.retry_at = None;
        self.set_state(SyncState::Dirty);
        self.arm_debounce();
    }

    fn on_save(&mut self, save: ExplicitSave) {
        if self.in_flight.is_some() {
            self.debounce_at = None;
            self.retry_at = None;
            self.queued_saves.push_back(save);
            return;
        }
        self.start_explicit(save);
    }

    fn begin_close(&mut self) {
        self.closing = true;
        self.debounce_at = None;
        self.retry_at = None;
    }

    fn arm_debounce(&mut self) {
        self.debounce_at = Some(Instant::now() + self.settings.debounce);
        self.set_state(SyncState::Scheduled);
    }

    fn persist_if_dirty(&mut self) {
        if self.in_flight.is_some() {
            return;
        }
        if self.current.fingerprint == self.persisted {
            self.debounce_at = None;
            self.retry_at = None;
            self.retries = 0;
            self.set_state(SyncState::Clean);
            return;
        }
        self.start_auto_save();
    }

    fn start_auto_save(&mut self) {
        self.debounce_at = None;
        self.retry_at = None;
        self.set_state(SyncState::Saving);

        let store = Arc::clone(&self.store);
        let id = self.id.clone();
        let draft = self.current.clone();
        log::debug!("template {id}: auto-saving (retry {})", self.retries);
        self.in_flight = Some(Box::pin(async move {
            let result = store.auto_save(&id, &draft.config, &draft.document).await;
            Completion::AutoSave {
                fingerprint: draft.fingerprint,
                result,
            }
        }));
    }

    fn start_explicit(&mut self, save: ExplicitSave) {
        self.debounce_at = None;
        self.retry_at = None;
        self.retries = 0;
        self.set_state(SyncState::Saving);

        let store = Arc::clone(&self.store);
        let id = self.id.clone();
        let draft = self.current.clone();
        log::info!("template {id}: saving '{}'", save.name);
        self.in_flight = Some(Box::pin(async move {
            let result = store
                .save(&id, &draft.config, &draft.document, &save.name, &save.description)
                .await;
            Completion::Explicit {
                fingerprint: draft.fingerprint,
                reply: save.reply,
                result,
            }
        }));
    }

    fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::AutoSave { fingerprint, result } => self.on_auto_save_done(fingerprint, result),
            Completion::Explicit {
                fingerprint,
                reply,
                result,
            } => self.on_explicit_done(fingerprint, reply, result),
        }

        if self.closing {
            return;
        }
        if let Some(save) = self.queued_saves.pop_front() {
            self.start_explicit(save);
        }
    }

    fn on_auto_save_done(&mut self, fingerprint: String, result: Result<DateTime<Utc>, PersistenceError>) {
        match result {
            Ok(saved_at) => {
                log::debug!("template {}: auto-saved at {saved_at}", self.id);
                self.persisted = fingerprint;
                self.retries = 0;
                self.status.last_auto_saved_at = Some(saved_at);
                self.emit(DraftEvent::AutoSaved { saved_at });
                self.settle();
            }
            Err(err) if self.retries < self.settings.max_retries => {
                self.retries += 1;
                log::warn!(
                    "template {}: auto-save failed ({err}), retry {}/{} in {:?}",
                    self.id,
                    self.retries,
                    self.settings.max_retries,
                    self.settings.retry_backoff
                );
                self.retry_at = Some(Instant::now() + self.settings.retry_backoff);
                self.set_state(SyncState::Retrying);
            }
            Err(err) => {
                let attempts = self.retries + 1;
                log::warn!("template {}: auto-save gave up after {attempts} attempts: {err}", self.id);
                self.retries = 0;
                self.emit(DraftEvent::AutoSaveFailed {
                    attempts,
                    message: err.to_string(),
                });
                self.set_state(SyncState::Dirty);
            }
        }
    }

    fn on_explicit_done(
        &mut self,
        fingerprint: String,
        reply: oneshot::Sender<Result<SaveReceipt, PersistenceError>>,
        result: Result<SaveReceipt, PersistenceError>,
    ) {
        match result {
            Ok(receipt) => {
                let receipt = SaveReceipt {
                    saved_at: receipt.saved_at,
                    version: receipt.version.max(self.status.version + 1),
                };
                log::info!("template {}: saved version {}", self.id, receipt.version);
                self.persisted = fingerprint;
                self.status.version = receipt.version;
                self.status.last_saved_at = Some(receipt.saved_at);
                self.emit(DraftEvent::Saved(receipt));
                self.settle();
                let _ = reply.send(Ok(receipt));
            }
            Err(err) => {
                log::error!("template {}: save failed: {err}", self.id);
                let state = if self.current.fingerprint == self.persisted {
                    SyncState::Clean
                } else {
                    SyncState::Dirty
                };
                self.set_state(state);
                let _ = reply.send(Err(err));
            }
        }
    }

    /// After a successful write: clean, unless edits arrived in the meantime.
    fn settle(&mut self) {
        if self.current.fingerprint == self.persisted {
            self.set_state(SyncState::Clean);
        } else if !self.closing {
            self.set_state(SyncState::Dirty);
            self.arm_debounce();
        } else {
            self.set_state(SyncState::Dirty);
        }
    }

    fn set_state(&mut self, state: SyncState) {
        let changed = self.status.state != state;
        self.status.state = state;
        self.status_tx.send_replace(self.status);
        if changed {
            self.emit(DraftEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: DraftEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

async fn next_completion(in_flight: &mut Option<InFlight>) -> Completion {
    match in_flight {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_tracks_config_and_document() {
        let config = TemplateConfig::default();
        let a = fingerprint(&config, "<p>a</p>");
        assert_eq!(a, fingerprint(&config, "<p>a</p>"));
        assert_ne!(a, fingerprint(&config, "<p>b</p>"));
        let other = TemplateConfig {
            title: "x".to_string(),
            ..TemplateConfig::default()
        };
        assert_ne!(a, fingerprint(&other, "<p>a</p>"));
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn default_settings() {
        let settings = AutoSaveSettings::default();
        assert_eq!(settings.max_retries, 3);
        assert!(settings.debounce < settings.interval);
    }
}
