//! Runs variation requests in the background, one at a time.
//!
//! A worker owns one client, and so one output directory. At most one request
//! is in flight per worker; a second submission is refused, not queued.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::VariationError;
use crate::variation::{VariationClient, VariationRequest, VariationResult};

/// Summary of a finished request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobSummary {
    /// Images described by the response.
    pub requested: usize,
    /// Images written to disk.
    pub saved: usize,
    /// Images that couldn't be downloaded.
    pub skipped: usize,
    /// Where the raw response was written.
    pub response_record_path: PathBuf,
}

impl From<&VariationResult> for JobSummary {
    fn from(result: &VariationResult) -> Self {
        Self {
            requested: result.requested(),
            saved: result.saved_image_paths.len(),
            skipped: result.skipped_count(),
            response_record_path: result.response_record_path.clone(),
        }
    }
}

/// What the worker is doing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum JobStatus {
    /// Nothing submitted yet.
    #[default]
    Idle,
    /// A request for this image is running.
    Busy {
        /// Image being varied.
        source: PathBuf,
    },
    /// The last request finished.
    Done(JobSummary),
    /// The last request failed with this message.
    Failed(String),
}

impl JobStatus {
    /// True for `Done` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed(_))
    }
}

/// Background runner for a [`VariationClient`].
#[derive(Clone)]
pub struct VariationWorker {
    client: Arc<VariationClient>,
    in_flight: Arc<Mutex<()>>,
    status: Arc<watch::Sender<JobStatus>>,
}

impl VariationWorker {
    /// Wraps `client`; the worker starts idle.
    pub fn new(client: VariationClient) -> Self {
        let (status, _) = watch::channel(JobStatus::Idle);
        Self {
            client: Arc::new(client),
            in_flight: Arc::new(Mutex::new(())),
            status: Arc::new(status),
        }
    }

    /// Receives every status change from now on.
    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status.subscribe()
    }

    /// Current status.
    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    /// True while a request is running.
    pub fn is_busy(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Starts `request` on a tokio task.
    ///
    /// Returns `None` without doing anything when a request is already
    /// running. Must be called from within a tokio runtime.
    pub fn submit(
        &self,
        request: VariationRequest,
    ) -> Option<JoinHandle<Result<VariationResult, VariationError>>> {
        let Ok(slot) = Arc::clone(&self.in_flight).try_lock_owned() else {
            debug!(
                "Refusing {}: a request is already running",
                request.source_image_path.display()
            );
            return None;
        };

        self.status.send_replace(JobStatus::Busy {
            source: request.source_image_path.clone(),
        });

        let client = Arc::clone(&self.client);
        let guard = Completion {
            status: Arc::clone(&self.status),
            slot: Some(slot),
        };
        Some(tokio::spawn(async move {
            let result = client.create_variation(&request).await;
            let next = match &result {
                Ok(result) => JobStatus::Done(JobSummary::from(result)),
                Err(err) => {
                    error!("Variation request failed: {err}");
                    JobStatus::Failed(err.to_string())
                }
            };
            guard.finish(next);
            result
        }))
    }
}

/// Publishes the final status and frees the slot. Dropped unfinished, as
/// when the task panics or is aborted, it publishes `Failed` instead.
struct Completion {
    status: Arc<watch::Sender<JobStatus>>,
    slot: Option<OwnedMutexGuard<()>>,
}

impl Completion {
    fn finish(mut self, next: JobStatus) {
        self.status.send_replace(next);
        self.slot = None;
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.slot.is_some() {
            error!("Variation task ended without a result");
            self.status
                .send_replace(JobStatus::Failed(TASK_ABANDONED.to_string()));
            self.slot = None;
        }
    }
}

const TASK_ABANDONED: &str = "variation task ended without a result";
