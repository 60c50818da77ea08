//! Cancellable, time-bounded polling of a report job's status URL.
//!
//! After the finalize call is accepted asynchronously, the client
//! repeatedly checks the job-status endpoint until the job reaches a
//! terminal state, the absolute timeout elapses, or the caller cancels.
//! Checks are strictly sequential: the next tick cannot start while a
//! previous check is still in flight, so overlapping requests are
//! impossible by construction.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, JobState, JobStatusResponse, SubmissionApi};

/// Default delay between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
/// Default absolute bound on the whole poll loop.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Tunable parameters for the poll loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between consecutive status checks.
    pub interval: Duration,
    /// Absolute wall-clock bound measured from poll start. A slow
    /// in-flight check is cut off by the same deadline.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// Non-terminal observations reported while the loop runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollProgress {
    /// The job reported a non-terminal state.
    Status(JobState),
    /// The status endpoint could not be reached or answered with an
    /// error; the loop keeps polling.
    Unreachable,
}

/// Terminal outcome of a poll loop. Produced exactly once.
#[derive(Debug)]
pub enum PollOutcome {
    /// The job finished; the record carries the document URLs.
    Done(JobStatusResponse),
    /// The job failed server-side, with the server's message.
    Failed(String),
    /// No terminal state was observed within the configured bound.
    TimedOut,
    /// The caller cancelled the loop.
    Cancelled,
}

/// Poll `status_url` until a terminal outcome.
///
/// Transient transport or HTTP failures surface through `on_progress`
/// as [`PollProgress::Unreachable`] and do not abort the loop. The
/// first check happens one interval after the call. Cancelling the
/// token after the loop has returned is a harmless no-op.
pub async fn poll_job_status<A>(
    api: &A,
    status_url: &str,
    config: &PollConfig,
    mut on_progress: impl FnMut(PollProgress),
    cancel: &CancellationToken,
) -> PollOutcome
where
    A: SubmissionApi + ?Sized,
{
    let deadline = tokio::time::Instant::now() + config.timeout;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = tokio::time::sleep_until(deadline) => return PollOutcome::TimedOut,
            _ = tokio::time::sleep(config.interval) => {}
        }

        let fetched: Result<JobStatusResponse, ApiError> = tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = tokio::time::sleep_until(deadline) => return PollOutcome::TimedOut,
            result = api.fetch_job_status(status_url) => result,
        };

        match fetched {
            Ok(job) => match job.status {
                JobState::Done => return PollOutcome::Done(job),
                JobState::Failed => {
                    return PollOutcome::Failed(
                        job.error
                            .unwrap_or_else(|| "Report generation failed".to_string()),
                    )
                }
                state => on_progress(PollProgress::Status(state)),
            },
            Err(e) => {
                tracing::warn!(error = %e, status_url, "Status check failed; will retry");
                on_progress(PollProgress::Unreachable);
            }
        }
    }
}
