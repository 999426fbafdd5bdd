//! Bulk operation runner.
//!
//! Drives one Shopify bulk query from submission to a terminal state:
//!
//! 1. `submit` posts the query inside `bulkOperationRunQuery`. Validation
//!    errors come back as `userErrors` and fail the job immediately.
//! 2. `await_completion` polls `currentBulkOperation` on a fixed interval
//!    until the operation is COMPLETED, FAILED, CANCELED or EXPIRED.
//!
//! Nothing is retried: a rejected or failed bulk job almost always means the
//! query itself is wrong. The store runs one bulk operation at a time, so
//! callers must run jobs one after another.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use product_porter_core::{BulkOperation, BulkOperationStatus, UserError};

use crate::shopify::queries::{self, BulkRunResponse, CurrentBulkOperationResponse};
use crate::shopify::{AdminClient, ShopifyError};

/// Errors that end a bulk job.
#[derive(Debug, Error)]
pub enum BulkError {
    /// Shopify rejected the query.
    #[error("Bulk submission rejected: {}", format_user_errors(.0))]
    Submission(Vec<UserError>),

    /// The submission response named no operation and no errors.
    #[error("Bulk submission returned no operation")]
    NoOperation,

    /// The operation reached FAILED.
    #[error("Bulk operation failed: {error_code}")]
    Failed {
        /// Remote `errorCode`.
        error_code: String,
    },

    /// The operation reached COMPLETED but has no result URL.
    #[error("Bulk operation completed without a download URL")]
    CompletedWithoutUrl,

    /// The operation was canceled or expired.
    #[error("Bulk operation ended with status {0}")]
    Terminated(BulkOperationStatus),

    /// The caller's deadline passed before a terminal state.
    #[error("Bulk operation not finished after {0:?}")]
    TimedOut(Duration),

    /// Shopify API call failed.
    #[error("Shopify error: {0}")]
    Api(#[from] ShopifyError),
}

fn format_user_errors(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Handle of a submitted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    pub id: String,
    pub status: BulkOperationStatus,
}

/// Outcome of a `bulkOperationRunQuery` call.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub operation: Option<OperationHandle>,
    pub user_errors: Vec<UserError>,
}

/// A finished operation with its result location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedOperation {
    pub id: String,
    pub url: String,
    pub object_count: u64,
    pub elapsed: Duration,
}

/// The two remote calls a bulk job needs.
///
/// Implemented by [`AdminClient`]; tests substitute scripted fakes.
pub trait BulkApi {
    /// Start a bulk query.
    fn run_query(&self, query: &str) -> impl Future<Output = Result<Submission, ShopifyError>>;

    /// Fetch the store's current bulk operation, if any.
    fn current_operation(
        &self,
    ) -> impl Future<Output = Result<Option<BulkOperation>, ShopifyError>>;
}

impl BulkApi for AdminClient {
    async fn run_query(&self, query: &str) -> Result<Submission, ShopifyError> {
        let response: BulkRunResponse = self
            .execute(&queries::bulk_run_mutation(query), None)
            .await?;
        let payload = response.bulk_operation_run_query;

        Ok(Submission {
            operation: payload.bulk_operation.map(|op| OperationHandle {
                id: op.id,
                status: op.status,
            }),
            user_errors: payload.user_errors,
        })
    }

    async fn current_operation(&self) -> Result<Option<BulkOperation>, ShopifyError> {
        let response: CurrentBulkOperationResponse = self
            .execute(queries::CURRENT_BULK_OPERATION, None)
            .await?;
        Ok(response.current_bulk_operation)
    }
}

/// Polling behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Fixed pause between polls.
    pub interval: Duration,
    /// Give up after this long; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5000),
            timeout: None,
        }
    }
}

/// One observation of poll throughput.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollProgress {
    pub object_count: u64,
    /// Objects added since the previous poll.
    pub delta: u64,
    /// Seconds since the previous poll.
    pub interval_secs: f64,
    /// `delta / interval_secs`, or 0 for a zero-length interval.
    pub rate: f64,
    /// Time since submission.
    pub elapsed: Duration,
}

/// Tracks object counts between polls to report throughput.
#[derive(Debug, Clone, Copy)]
pub struct Throughput {
    started: Instant,
    last_at: Instant,
    last_count: u64,
}

impl Throughput {
    #[must_use]
    pub const fn new(started: Instant) -> Self {
        Self {
            started,
            last_at: started,
            last_count: 0,
        }
    }

    /// Record a poll and return the progress since the previous one.
    #[allow(clippy::cast_precision_loss)]
    pub fn observe(&mut self, object_count: u64, now: Instant) -> PollProgress {
        let interval_secs = now.duration_since(self.last_at).as_secs_f64();
        let delta = object_count.saturating_sub(self.last_count);
        let rate = if interval_secs > 0.0 {
            delta as f64 / interval_secs
        } else {
            0.0
        };
        self.last_at = now;
        self.last_count = object_count;

        PollProgress {
            object_count,
            delta,
            interval_secs,
            rate,
            elapsed: now.duration_since(self.started),
        }
    }
}

/// Render seconds as `mm:ss`, or `h:mm:ss` past the hour.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (h, m, s) = (total / 3600, (total / 60) % 60, total % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

/// Runs bulk jobs against a [`BulkApi`].
#[derive(Debug)]
pub struct BulkJobRunner<'a, A> {
    api: &'a A,
    name: String,
}

impl<'a, A: BulkApi> BulkJobRunner<'a, A> {
    /// Create a runner; `name` labels every log line (the artifact name).
    #[must_use]
    pub fn new(api: &'a A, name: impl Into<String>) -> Self {
        Self {
            api,
            name: name.into(),
        }
    }

    /// Submit `query` as a bulk operation.
    ///
    /// # Errors
    ///
    /// Returns `BulkError::Submission` carrying every user error Shopify
    /// reported, `BulkError::NoOperation` if the response is empty, or
    /// `BulkError::Api` if the call itself failed.
    #[instrument(skip(self, query), fields(job = %self.name))]
    pub async fn submit(&self, query: &str) -> Result<OperationHandle, BulkError> {
        info!("Starting bulk operation");
        let submission = self.api.run_query(query).await?;

        if !submission.user_errors.is_empty() {
            for e in &submission.user_errors {
                error!(error = %e, "Bulk submission rejected");
            }
            return Err(BulkError::Submission(submission.user_errors));
        }

        let handle = submission.operation.ok_or(BulkError::NoOperation)?;
        info!(operation = %handle.id, status = %handle.status, "Bulk operation submitted");
        Ok(handle)
    }

    /// Poll until the operation reaches a terminal state.
    ///
    /// Snapshots of any other operation, finished or not, are logged and
    /// polled past.
    ///
    /// # Errors
    ///
    /// Returns `BulkError::Failed` or `BulkError::Terminated` for a remote
    /// failure, `BulkError::CompletedWithoutUrl` when there is nothing to
    /// download, `BulkError::TimedOut` once `options.timeout` passes, and
    /// `BulkError::Api` if a poll fails.
    #[instrument(skip(self, handle, options), fields(job = %self.name, operation = %handle.id))]
    pub async fn await_completion(
        &self,
        handle: &OperationHandle,
        options: &PollOptions,
    ) -> Result<CompletedOperation, BulkError> {
        let started = Instant::now();
        let mut throughput = Throughput::new(started);

        loop {
            let current = self.api.current_operation().await?;

            match current {
                Some(op) if op.id != handle.id => {
                    warn!(
                        current = %op.id,
                        status = %op.status,
                        "Current bulk operation is not the submitted one"
                    );
                }
                Some(op) if op.status.is_terminal() => {
                    return Self::finish(op, started.elapsed());
                }
                Some(op) => {
                    let progress = throughput.observe(op.object_count, Instant::now());
                    info!(
                        status = %op.status,
                        object_count = progress.object_count,
                        delta = progress.delta,
                        interval_secs = %format!("{:.1}", progress.interval_secs),
                        rate = %format!("{:.1}/s", progress.rate),
                        elapsed = %format_duration(progress.elapsed),
                        "Bulk operation in progress"
                    );
                }
                None => info!("Waiting for bulk operation to appear"),
            }

            if let Some(timeout) = options.timeout
                && started.elapsed() >= timeout
            {
                return Err(BulkError::TimedOut(timeout));
            }

            tokio::time::sleep(options.interval).await;
        }
    }

    /// Submit and wait.
    ///
    /// # Errors
    ///
    /// See [`BulkJobRunner::submit`] and [`BulkJobRunner::await_completion`].
    pub async fn run(
        &self,
        query: &str,
        options: &PollOptions,
    ) -> Result<CompletedOperation, BulkError> {
        let handle = self.submit(query).await?;
        self.await_completion(&handle, options).await
    }

    /// Map a terminal snapshot to the job result.
    fn finish(op: BulkOperation, elapsed: Duration) -> Result<CompletedOperation, BulkError> {
        match op.status {
            BulkOperationStatus::Completed => {
                let Some(url) = op.url.filter(|u| !u.is_empty()) else {
                    error!("Bulk operation completed without a download URL");
                    return Err(BulkError::CompletedWithoutUrl);
                };
                info!(
                    object_count = op.object_count,
                    elapsed = %format_duration(elapsed),
                    "Bulk operation completed"
                );
                Ok(CompletedOperation {
                    id: op.id,
                    url,
                    object_count: op.object_count,
                    elapsed,
                })
            }
            BulkOperationStatus::Failed => {
                let error_code = op.error_code.unwrap_or_else(|| "UNKNOWN".to_string());
                error!(error_code = %error_code, "Bulk operation failed");
                Err(BulkError::Failed { error_code })
            }
            status => {
                error!(status = %status, "Bulk operation ended");
                Err(BulkError::Terminated(status))
            }
        }
    }
}
