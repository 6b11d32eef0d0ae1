//! # Editing Session Service
//!
//! Server-side editing sessions: one [`DraftReconciler`] per open template,
//! so clients only push edits and the server takes care of debounced
//! auto-saves, retries and confirmed saves.
//!
//! Routes under `/api/sessions`:
//!
//! *   **`POST /{template_id}`**: opens (or re-attaches to) a session. Unknown
//!     templates start empty. The response carries any recovery offer.
//! *   **`GET /{template_id}`**: current sync status.
//! *   **`POST /{template_id}/edit`**: records a new configuration.
//! *   **`POST /{template_id}/save`**: confirmed save of the latest edits.
//! *   **`POST /{template_id}/recover`**: applies the pending recovery offer.
//! *   **`DELETE /{template_id}/recover`**: dismisses it.
//! *   **`DELETE /{template_id}`**: closes the session, cancelling its timers.
//!
//! The registry lock only guards the map itself. Handlers clone the session
//! out and release the lock before awaiting the reconciler, so a slow save
//! on one template never stalls requests for another.
//!
//! Sessions a client never closes are evicted by
//! [`SessionRegistry::evict_idle_every`] once they have been idle for the
//! configured timeout.

use crate::drafts::{AutoSaveSettings, Baseline, DraftReconciler, RecoveryOffer, TemplateStore};
use crate::error::{PersistenceError, ServiceError};
use crate::render::render;
use crate::services::AppState;
use actix_web::web::{delete, get, post, scope};
use actix_web::{web, HttpResponse, Scope};
use common::model::draft::AutoSaveSnapshot;
use common::requests::{SessionEditRequest, SessionSaveRequest};
use serde_json::json;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

const API_PATH: &str = "/api/sessions";

/// One open template: its reconciler plus the recovery offer found on open.
struct Session {
    reconciler: DraftReconciler,
    /// Taken by `recover`, cleared by `dismiss`.
    offer: Mutex<Option<RecoveryOffer>>,
    last_used: Mutex<Instant>,
}

impl Session {
    fn new(reconciler: DraftReconciler, offer: Option<RecoveryOffer>) -> Self {
        Self {
            reconciler,
            offer: Mutex::new(offer),
            last_used: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_used.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn pending_snapshot(&self) -> Option<AutoSaveSnapshot> {
        self.offer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|offer| offer.snapshot().clone())
    }

    fn take_offer(&self) -> Option<RecoveryOffer> {
        self.offer.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Open editing sessions keyed by template id.
#[derive(Default)]
pub struct SessionRegistry {
    /// Never held across an await on a reconciler or the store.
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub async fn is_open(&self, template_id: &str) -> bool {
        self.sessions.read().await.contains_key(template_id)
    }

    pub async fn open_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns the session for `template_id`, opening it if needed.
    ///
    /// The template is loaded without holding the registry lock. When two
    /// requests race to open the same template, the first insert wins and the
    /// other reconciler is dropped before it has seen any edit.
    ///
    /// # Arguments
    /// * `template_id` - The template to edit. Unknown ids start from an empty baseline.
    /// * `store` - Persistence service the reconciler writes through.
    /// * `settings` - Debounce, interval and retry timings for the reconciler.
    ///
    /// # Returns
    /// The session and `true` when this call created it.
    async fn open(
        &self,
        template_id: &str,
        store: Arc<dyn TemplateStore>,
        settings: AutoSaveSettings,
    ) -> Result<(Arc<Session>, bool), PersistenceError> {
        if let Some(session) = self.sessions.read().await.get(template_id).cloned() {
            session.touch();
            return Ok((session, false));
        }

        let (reconciler, offer) = match DraftReconciler::open(template_id, store.clone(), settings).await {
            Ok(opened) => opened,
            Err(PersistenceError::NotFound(_)) => {
                log::info!("starting a new template {template_id}");
                let reconciler = DraftReconciler::spawn(template_id, store, Baseline::default(), settings);
                (reconciler, None)
            }
            Err(err) => return Err(err),
        };

        match self.sessions.write().await.entry(template_id.to_string()) {
            Entry::Occupied(existing) => Ok((existing.get().clone(), false)),
            Entry::Vacant(slot) => {
                let session = Arc::new(Session::new(reconciler, offer));
                slot.insert(session.clone());
                Ok((session, true))
            }
        }
    }

    async fn get(&self, template_id: &str) -> Result<Arc<Session>, ServiceError> {
        let session = self
            .sessions
            .read()
            .await
            .get(template_id)
            .cloned()
            .ok_or_else(|| ServiceError::SessionNotOpen(template_id.to_string()))?;
        session.touch();
        Ok(session)
    }

    async fn remove(&self, template_id: &str) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(template_id)
    }

    /// Closes every session, letting in-flight saves finish.
    pub async fn close_all(&self) {
        let drained: Vec<Arc<Session>> = self.sessions.write().await.drain().map(|(_, s)| s).collect();
        for session in drained {
            session.reconciler.close().await;
        }
    }

    /// Closes sessions that have not been used for at least `max_idle`.
    ///
    /// Pending debounce or retry timers of an evicted session are cancelled;
    /// an in-flight call is allowed to finish.
    ///
    /// # Returns
    /// The number of sessions closed.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let evicted: Vec<(String, Arc<Session>)> = {
            let mut sessions = self.sessions.write().await;
            let idle: Vec<String> = sessions
                .iter()
                .filter(|(_, session)| session.idle_for(now) >= max_idle)
                .map(|(id, _)| id.clone())
                .collect();
            idle.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|session| (id, session)))
                .collect()
        };

        for (template_id, session) in &evicted {
            log::info!("closing idle editing session for template {template_id}");
            session.reconciler.close().await;
        }
        evicted.len()
    }

    /// Runs [`SessionRegistry::evict_idle`] periodically. Meant to be spawned once.
    pub async fn evict_idle_every(&self, max_idle: Duration) {
        let period = (max_idle / 4).max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            self.evict_idle(max_idle).await;
        }
    }
}

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/{template_id}", post().to(open))
        .route("/{template_id}", get().to(status))
        .route("/{template_id}", delete().to(close))
        .route("/{template_id}/edit", post().to(edit))
        .route("/{template_id}/save", post().to(save))
        .route("/{template_id}/recover", post().to(recover))
        .route("/{template_id}/recover", delete().to(dismiss))
}

/// The Actix web handler for `POST /api/sessions/{template_id}`.
///
/// # Arguments
/// * `state` - The shared `AppState` holding the store and the session registry.
/// * `template_id` - The template to open.
///
/// # Returns
/// `201 Created` for a new session, `200 OK` when one was already open. The
/// body carries the sync status and the pending recovery snapshot, if any.
async fn open(
    state: web::Data<AppState>,
    template_id: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let template_id = template_id.into_inner();
    let (session, created) = state
        .sessions
        .open(&template_id, state.store.clone(), state.autosave)
        .await?;

    let body = json!({
        "template_id": template_id,
        "status": session.reconciler.status(),
        "recovery": session.pending_snapshot(),
    });
    if created {
        Ok(HttpResponse::Created().json(body))
    } else {
        Ok(HttpResponse::Ok().json(body))
    }
}

async fn status(
    state: web::Data<AppState>,
    template_id: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let session = state.sessions.get(&template_id).await?;
    Ok(HttpResponse::Ok().json(session.reconciler.status()))
}

/// The Actix web handler for `POST /api/sessions/{template_id}/edit`.
///
/// Renders the new configuration and hands both to the reconciler, which
/// decides when to persist them.
///
/// # Returns
/// `202 Accepted` with the sync status at the time of the call.
async fn edit(
    state: web::Data<AppState>,
    template_id: web::Path<String>,
    payload: web::Json<SessionEditRequest>,
) -> Result<HttpResponse, ServiceError> {
    let config = payload.into_inner().config;
    let document = render(&config);
    let session = state.sessions.get(&template_id).await?;
    session.reconciler.edit(config, document).await?;
    Ok(HttpResponse::Accepted().json(session.reconciler.status()))
}

/// The Actix web handler for `POST /api/sessions/{template_id}/save`.
///
/// Waits for the confirmed save, including any auto-save already in flight
/// for the same template.
///
/// # Returns
/// The `SaveReceipt` with the new version, or `400` for an empty name.
async fn save(
    state: web::Data<AppState>,
    template_id: web::Path<String>,
    payload: web::Json<SessionSaveRequest>,
) -> Result<HttpResponse, ServiceError> {
    let payload = payload.into_inner();
    if payload.name.trim().is_empty() {
        return Err(ServiceError::InvalidRequest("template name cannot be empty".to_string()));
    }
    let session = state.sessions.get(&template_id).await?;
    let receipt = session
        .reconciler
        .save(payload.name.trim(), &payload.description)
        .await?;
    Ok(HttpResponse::Ok().json(receipt))
}

async fn recover(
    state: web::Data<AppState>,
    template_id: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let session = state.sessions.get(&template_id).await?;
    let offer = session
        .take_offer()
        .ok_or_else(|| ServiceError::InvalidRequest("no recovery offer pending".to_string()))?;

    let snapshot = offer.accept();
    session
        .reconciler
        .edit(snapshot.config.clone(), snapshot.document)
        .await?;
    log::info!("template {template_id}: background draft recovered");
    Ok(HttpResponse::Ok().json(json!({
        "config": snapshot.config,
        "status": session.reconciler.status(),
    })))
}

async fn dismiss(
    state: web::Data<AppState>,
    template_id: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let session = state.sessions.get(&template_id).await?;
    session.take_offer();
    Ok(HttpResponse::NoContent().finish())
}

async fn close(
    state: web::Data<AppState>,
    template_id: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let session = state
        .sessions
        .remove(&template_id)
        .await
        .ok_or_else(|| ServiceError::SessionNotOpen(template_id.to_string()))?;
    session.reconciler.close().await;
    Ok(HttpResponse::NoContent().finish())
}
