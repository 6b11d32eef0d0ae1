//! Tracks long-running background jobs such as batch certificate merges.
//!
//! - `JobsState`: clonable, shared map of job statuses plus the sender used to
//!   report changes. It lives in the Actix application state.
//! - `JobUpdate`: a status change reported by a background worker.
//! - `start_job_updater`: long-running task applying `JobUpdate`s to the map.
//!
//! Workers never write the map directly; they push updates through `tx` so
//! job execution stays decoupled from bookkeeping.

use common::jobs::JobStatus;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, RwLock};

const UPDATE_CHANNEL_CAPACITY: usize = 100;

/// Shared, clonable state of every background job.
///
/// Created once in `main.rs` and injected into Actix as `web::Data`, so the
/// merge handlers and the status endpoint see the same map.
#[derive(Clone)]
pub struct JobsState {
    /// A map from a job id to its current `JobStatus`.
    ///
    /// Read by `/api/merge/status/{job_id}`; written only by
    /// `start_job_updater` and `register`.
    pub jobs: Arc<RwLock<HashMap<String, JobStatus>>>,

    /// Sender half of the update channel drained by `start_job_updater`.
    ///
    /// Merge workers report progress through it instead of locking `jobs`.
    pub tx: mpsc::Sender<JobUpdate>,
}

/// A status change for one background job, sent through `JobsState.tx`.
#[derive(Debug)]
pub struct JobUpdate {
    /// The job being updated.
    pub(crate) job_id: String,
    /// Its new status.
    pub(crate) status: JobStatus,
}

impl JobUpdate {
    pub fn new(job_id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            status,
        }
    }
}

impl JobsState {
    /// Creates an empty state and the receiver to hand to `start_job_updater`.
    pub fn new() -> (Self, mpsc::Receiver<JobUpdate>) {
        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let state = Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            tx,
        };
        (state, rx)
    }

    /// Registers `job_id` as `Pending` so it is visible before the worker starts.
    pub async fn register(&self, job_id: &str) {
        self.jobs
            .write()
            .await
            .insert(job_id.to_string(), JobStatus::Pending);
    }

    pub async fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Reports a status change; lost only if the updater has stopped.
    pub async fn report(&self, job_id: &str, status: JobStatus) {
        if self.tx.send(JobUpdate::new(job_id, status)).await.is_err() {
            log::warn!("job updater is gone, dropping update for {job_id}");
        }
    }
}

/// Applies every received `JobUpdate` to `state.jobs` until all senders are dropped.
///
/// Spawned once as a long-running task in `main.rs`.
///
/// # Arguments
/// * `state` - The shared `JobsState` whose map is updated.
/// * `rx` - The receiver returned by `JobsState::new`.
pub async fn start_job_updater(state: JobsState, mut rx: mpsc::Receiver<JobUpdate>) {
    while let Some(update) = rx.recv().await {
        let mut jobs = state.jobs.write().await;
        jobs.insert(update.job_id, update.status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn updates_flow_through_the_updater() {
        let (state, rx) = JobsState::new();
        let updater = tokio::spawn(start_job_updater(state.clone(), rx));

        state.register("job-1").await;
        assert_eq!(state.status("job-1").await, Some(JobStatus::Pending));

        state.report("job-1", JobStatus::InProgress(50)).await;
        state.report("job-1", JobStatus::Completed("2 certificates".to_string())).await;
        tokio::task::yield_now().await;
        for _ in 0..10 {
            if matches!(state.status("job-1").await, Some(JobStatus::Completed(_))) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(
            state.status("job-1").await,
            Some(JobStatus::Completed("2 certificates".to_string()))
        );
        assert_eq!(state.status("missing").await, None);
        updater.abort();
    }
}
