// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Full reindex as a background job.
//!
//! The job status lives in the host's KV store under [`REINDEX_JOB_KEY`], so
//! any cluster node can report or cancel it. The worker polls that key after
//! every batch and stops when it sees `canceled`. Every status write is a
//! compare-and-set, so a cancel from another node is never overwritten.
//!
//! The status carries the `(create_at, id)` of the last stored post. A
//! canceled or failed job can be resumed from there without clearing the
//! index.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use parley_core::host::PostCursor;
use parley_core::{HostPlatform, ParleyError};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::embedding_search::EmbeddingSearch;
use crate::indexer::{document_for, is_indexable};

pub const REINDEX_JOB_KEY: &str = "reindex_job_status";

/// Posts fetched from the host per page.
const BATCH_SIZE: usize = 100;

/// Progress is written back to KV at least this many rows apart.
const PROGRESS_INTERVAL: i64 = 500;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobState {
    Running,
    Completed,
    Failed,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub status: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    pub processed_rows: i64,
    pub total_rows: i64,
    /// Last post stored; `processed_rows` counts every post up to it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<PostCursor>,
}

impl JobStatus {
    fn started(total_rows: i64) -> Self {
        Self {
            status: JobState::Running,
            error: None,
            started_at: now_ms(),
            completed_at: None,
            processed_rows: 0,
            total_rows,
            cursor: None,
        }
    }

    /// The same job running again from its cursor.
    fn resumed(mut self) -> Self {
        self.status = JobState::Running;
        self.error = None;
        self.completed_at = None;
        self
    }

    fn finish(&mut self, state: JobState, error: Option<String>) {
        self.status = state;
        self.error = error;
        self.completed_at = Some(now_ms());
    }

    fn is_resumable(&self) -> bool {
        matches!(self.status, JobState::Canceled | JobState::Failed)
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Starts, resumes, reports, and cancels the reindex job.
pub struct JobManager {
    host: Arc<dyn HostPlatform>,
    search: Arc<EmbeddingSearch>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager").finish_non_exhaustive()
    }
}

impl JobManager {
    pub fn new(host: Arc<dyn HostPlatform>, search: Arc<EmbeddingSearch>) -> Self {
        Self {
            host,
            search,
            worker: Mutex::new(None),
        }
    }

    /// The last persisted job status, if a job ever ran.
    pub async fn status(&self) -> Result<Option<JobStatus>, ParleyError> {
        Ok(read_status(self.host.as_ref()).await?.1)
    }

    /// Starts a reindex from scratch in the background and returns its
    /// initial status.
    ///
    /// Fails with [`ParleyError::JobAlreadyRunning`] while another job is
    /// running; the existing status is left untouched.
    pub async fn start(&self, bot_ids: HashSet<String>) -> Result<JobStatus, ParleyError> {
        if let Some(existing) = self.status().await?
            && existing.status == JobState::Running
        {
            return Err(ParleyError::JobAlreadyRunning);
        }

        let total_rows = match self.host.count_indexable_posts().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "could not count posts for reindex");
                0
            }
        };
        let status = update_status(self.host.as_ref(), |current| match current {
            Some(existing) if existing.status == JobState::Running => {
                Err(ParleyError::JobAlreadyRunning)
            }
            _ => Ok(Some(JobStatus::started(total_rows))),
        })
        .await?
        .ok_or(ParleyError::JobAlreadyRunning)?;
        info!(total_rows, "reindex job started");

        self.spawn_worker(bot_ids, status.clone());
        Ok(status)
    }

    /// Continues a canceled or failed job after its last stored post.
    ///
    /// The index is kept and `processed_rows` carries over. A job that never
    /// stored a batch starts over from an empty index.
    pub async fn resume(&self, bot_ids: HashSet<String>) -> Result<JobStatus, ParleyError> {
        let status = update_status(self.host.as_ref(), |current| match current {
            Some(existing) if existing.status == JobState::Running => {
                Err(ParleyError::JobAlreadyRunning)
            }
            Some(existing) if existing.is_resumable() => Ok(Some(existing.resumed())),
            Some(existing) => Err(ParleyError::InvalidInput(format!(
                "a {} reindex job cannot be resumed",
                existing.status
            ))),
            None => Err(ParleyError::InvalidInput(
                "there is no reindex job to resume".to_string(),
            )),
        })
        .await?
        .ok_or(ParleyError::JobAlreadyRunning)?;
        info!(
            processed = status.processed_rows,
            total = status.total_rows,
            "reindex job resumed"
        );

        self.spawn_worker(bot_ids, status.clone());
        Ok(status)
    }

    /// Flags a running job as canceled. The worker stops after its current batch.
    pub async fn cancel(&self) -> Result<JobStatus, ParleyError> {
        let status = update_status(self.host.as_ref(), |current| match current {
            Some(mut status) if status.status == JobState::Running => {
                status.finish(JobState::Canceled, None);
                Ok(Some(status))
            }
            Some(status) => Err(ParleyError::JobNotRunning(status.status.to_string())),
            None => Err(ParleyError::JobNotRunning("none".to_string())),
        })
        .await?
        .ok_or_else(|| ParleyError::JobNotRunning("none".to_string()))?;
        info!(processed = status.processed_rows, "reindex job canceled");
        Ok(status)
    }

    /// Waits for the current worker, if any, to exit.
    pub async fn wait(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn spawn_worker(&self, bot_ids: HashSet<String>, initial: JobStatus) {
        let host = self.host.clone();
        let search = self.search.clone();
        let handle = tokio::spawn(async move {
            let worker_host = host.clone();
            let inner = tokio::spawn(async move {
                run_worker(worker_host, search, bot_ids, initial).await
            });
            let outcome = match inner.await {
                Ok(result) => result,
                Err(join_err) => Err(ParleyError::Internal(format!(
                    "reindex worker panicked: {join_err}"
                ))),
            };
            if let Err(e) = outcome {
                error!(error = %e, "reindex job failed");
                mark_failed(host.as_ref(), e.to_string()).await;
            }
        });

        let mut slot = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }
}

async fn read_status(
    host: &dyn HostPlatform,
) -> Result<(Option<serde_json::Value>, Option<JobStatus>), ParleyError> {
    let raw = host.kv_get(REINDEX_JOB_KEY).await?;
    let status: Option<JobStatus> = raw.clone().map(serde_json::from_value).transpose()?;
    Ok((raw, status))
}

/// Read-modify-write of the stored status.
///
/// `apply` returns the replacement, or `None` to leave the stored value
/// alone. If another writer got in between the read and the write, the
/// whole step runs again against the new value.
async fn update_status<F>(
    host: &dyn HostPlatform,
    mut apply: F,
) -> Result<Option<JobStatus>, ParleyError>
where
    F: FnMut(Option<JobStatus>) -> Result<Option<JobStatus>, ParleyError>,
{
    loop {
        let (raw, current) = read_status(host).await?;
        let Some(next) = apply(current)? else {
            return Ok(None);
        };
        if host
            .kv_compare_and_set(REINDEX_JOB_KEY, raw.as_ref(), serde_json::to_value(&next)?)
            .await?
        {
            return Ok(Some(next));
        }
    }
}

/// What the worker writes after a batch, given the stored status.
///
/// A running job is replaced by `progress` when `write_running` is set. A
/// canceled job keeps its state but records the worker's position so it
/// can be resumed. Anything else is left alone.
fn next_status(
    current: Option<JobStatus>,
    progress: &JobStatus,
    write_running: bool,
) -> Option<JobStatus> {
    let mut current = current?;
    match current.status {
        JobState::Running if write_running => Some(progress.clone()),
        JobState::Canceled if current.cursor != progress.cursor => {
            current.cursor = progress.cursor.clone();
            current.processed_rows = progress.processed_rows;
            Some(current)
        }
        _ => None,
    }
}

/// Syncs the worker's progress with the stored status. Returns whether the
/// job is still running.
async fn sync_progress(
    host: &dyn HostPlatform,
    progress: &JobStatus,
    write_running: bool,
) -> Result<bool, ParleyError> {
    let mut running = false;
    update_status(host, |current| {
        running = current
            .as_ref()
            .is_some_and(|c| c.status == JobState::Running);
        Ok(next_status(current, progress, write_running))
    })
    .await?;
    Ok(running)
}

async fn mark_failed(host: &dyn HostPlatform, message: String) {
    let result = update_status(host, |current| {
        Ok(current
            .filter(|c| c.status == JobState::Running)
            .map(|mut c| {
                c.finish(JobState::Failed, Some(message.clone()));
                c
            }))
    })
    .await;
    if let Err(e) = result {
        error!(error = %e, "could not persist failed reindex status");
    }
}

async fn run_worker(
    host: Arc<dyn HostPlatform>,
    search: Arc<EmbeddingSearch>,
    bot_ids: HashSet<String>,
    mut status: JobStatus,
) -> Result<(), ParleyError> {
    let mut cursor = status.cursor.clone();
    if cursor.is_none() {
        search.clear().await?;
    }

    let mut last_saved = status.processed_rows;
    loop {
        let page = host.get_indexable_posts(cursor.as_ref(), BATCH_SIZE).await?;
        let Some(last) = page.last() else {
            break;
        };
        let next_cursor = last.cursor();

        let docs: Vec<_> = page
            .iter()
            .filter(|p| is_indexable(&p.post, &p.channel, &bot_ids))
            .map(|p| document_for(&p.post, &p.channel))
            .collect();
        search.store(&docs).await?;
        status.processed_rows += page.len() as i64;
        status.cursor = Some(next_cursor.clone());
        cursor = Some(next_cursor);

        let write = status.processed_rows - last_saved >= PROGRESS_INTERVAL;
        if !sync_progress(host.as_ref(), &status, write).await? {
            info!(processed = status.processed_rows, "reindex worker stopping");
            return Ok(());
        }
        if write {
            last_saved = status.processed_rows;
        }
        if page.len() < BATCH_SIZE {
            break;
        }
    }

    status.finish(JobState::Completed, None);
    if sync_progress(host.as_ref(), &status, true).await? {
        info!(processed = status.processed_rows, "reindex job completed");
    } else {
        info!(processed = status.processed_rows, "reindex worker stopping");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_kv_json() {
        let mut status = JobStatus::started(42);
        status.processed_rows = 7;
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["status"], "running");
        assert!(value.get("completed_at").is_none());
        let back: JobStatus = serde_json::from_value(value).unwrap();
        assert_eq!(back, status);
    }

    #[test]
    fn finish_sets_completion_time() {
        let mut status = JobStatus::started(1);
        status.finish(JobState::Failed, Some("boom".into()));
        assert_eq!(status.status, JobState::Failed);
        assert_eq!(status.error.as_deref(), Some("boom"));
        assert!(status.completed_at.is_some());
    }

    fn at(create_at: i64, id: &str) -> Option<PostCursor> {
        Some(PostCursor {
            create_at,
            id: id.into(),
        })
    }

    fn progress(processed: i64, cursor: Option<PostCursor>) -> JobStatus {
        let mut status = JobStatus::started(10);
        status.processed_rows = processed;
        status.cursor = cursor;
        status
    }

    #[test]
    fn running_progress_is_written_only_when_due() {
        let stored = JobStatus::started(10);
        let p = progress(5, at(50, "p5"));
        assert_eq!(next_status(Some(stored.clone()), &p, true), Some(p.clone()));
        assert_eq!(next_status(Some(stored), &p, false), None);
        assert_eq!(next_status(None, &p, true), None);
    }

    #[test]
    fn canceled_status_records_the_resume_point() {
        let mut stored = progress(2, at(20, "p2"));
        stored.finish(JobState::Canceled, None);
        let p = progress(5, at(50, "p5"));

        let next = next_status(Some(stored.clone()), &p, false).unwrap();
        assert_eq!(next.status, JobState::Canceled);
        assert_eq!(next.completed_at, stored.completed_at);
        assert_eq!(next.processed_rows, 5);
        assert_eq!(next.cursor, at(50, "p5"));

        assert_eq!(next_status(Some(next), &p, true), None);
    }

    #[test]
    fn completed_or_failed_status_is_never_replaced() {
        let p = progress(5, at(50, "p5"));
        for state in [JobState::Completed, JobState::Failed] {
            let mut stored = JobStatus::started(10);
            stored.finish(state, None);
            assert_eq!(next_status(Some(stored), &p, true), None);
        }
    }

    #[test]
    fn only_canceled_and_failed_jobs_resume() {
        let mut status = progress(3, at(30, "p3"));
        assert!(!status.is_resumable());
        status.finish(JobState::Failed, Some("boom".into()));
        assert!(status.is_resumable());

        let resumed = status.resumed();
        assert_eq!(resumed.status, JobState::Running);
        assert_eq!(resumed.error, None);
        assert_eq!(resumed.completed_at, None);
        assert_eq!(resumed.processed_rows, 3);
        assert_eq!(resumed.cursor, at(30, "p3"));
    }

    #[tokio::test]
    async fn a_cancel_between_read_and_write_wins() {
        let host = parley_test_utils::MockHost::new();
        host.kv_put(
            REINDEX_JOB_KEY,
            serde_json::to_value(JobStatus::started(10)).unwrap(),
        );
        let p = progress(5, at(50, "p5"));

        let mut attempts = 0;
        let written = update_status(&host, |current| {
            attempts += 1;
            if attempts == 1 {
                let mut canceled = current.clone().unwrap();
                canceled.finish(JobState::Canceled, None);
                host.kv_put(REINDEX_JOB_KEY, serde_json::to_value(canceled).unwrap());
            }
            Ok(next_status(current, &p, true))
        })
        .await
        .unwrap();

        assert_eq!(attempts, 2);
        let stored: JobStatus =
            serde_json::from_value(host.kv(REINDEX_JOB_KEY).unwrap()).unwrap();
        assert_eq!(stored.status, JobState::Canceled);
        assert_eq!(stored.cursor, at(50, "p5"));
        assert_eq!(written, Some(stored));
    }

    #[tokio::test]
    async fn completion_does_not_overwrite_a_cancel() {
        let host = parley_test_utils::MockHost::new();
        let mut canceled = JobStatus::started(10);
        canceled.finish(JobState::Canceled, None);
        host.kv_put(REINDEX_JOB_KEY, serde_json::to_value(&canceled).unwrap());

        let mut done = progress(10, at(100, "p9"));
        done.finish(JobState::Completed, None);
        assert!(!sync_progress(&host, &done, true).await.unwrap());

        let stored: JobStatus =
            serde_json::from_value(host.kv(REINDEX_JOB_KEY).unwrap()).unwrap();
        assert_eq!(stored.status, JobState::Canceled);
        assert_eq!(stored.processed_rows, 10);
    }
}
