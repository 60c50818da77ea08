//! The three-phase submission state machine.
//!
//! Drives one submission attempt end to end: local validation, the
//! metadata round-trip that yields upload credentials and a
//! `visit_id`, the parallel direct-to-storage photo fan-out with
//! per-file failure tracking, the attach/finalize round-trips, and --
//! when the server defers document generation to a background job --
//! the status poll. Each phase either completes cleanly or returns an
//! error; there is no partial-success path.

use std::fmt;

use tokio_util::sync::CancellationToken;

use sitevisit_core::error::CoreError;
use sitevisit_core::report::{
    validate_submission, PendingUpload, PhotoUploadRecord, SubmissionPayload,
};

use crate::api::{
    ApiError, DocumentLinks, FinalizeOutcome, MetadataResponse, SubmissionApi, STATUS_SUCCESS,
};
use crate::events::{Notifier, Severity};
use crate::poller::{poll_job_status, PollConfig, PollOutcome, PollProgress};
use crate::retry::{next_delay, RetryConfig};

/// States of the submission state machine, in protocol order. Used for
/// structured logging of phase transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPhase {
    Idle,
    ValidatingInput,
    SubmittingMetadata,
    UploadingPhotos,
    Finalizing,
    PollingJob,
    Done,
    Failed,
}

impl fmt::Display for SubmissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionPhase::Idle => "idle",
            SubmissionPhase::ValidatingInput => "validating_input",
            SubmissionPhase::SubmittingMetadata => "submitting_metadata",
            SubmissionPhase::UploadingPhotos => "uploading_photos",
            SubmissionPhase::Finalizing => "finalizing",
            SubmissionPhase::PollingJob => "polling_job",
            SubmissionPhase::Done => "done",
            SubmissionPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Ways one submission attempt can fail. Each variant maps to a
/// distinct user-facing message; configuration errors are deliberately
/// separate from generic server errors because they indicate a server
/// misconfiguration rather than a transient fault.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("{0}")]
    Validation(String),

    #[error("Server configuration error: {0}")]
    Configuration(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("{failed} of {total} photo uploads failed")]
    PhotoUploads { failed: usize, total: usize },

    #[error("Submission interrupted: {0}")]
    Transport(String),

    #[error("Report generation failed: {0}")]
    JobFailed(String),

    #[error("Timed out waiting for report generation")]
    Timeout,

    #[error("Submission cancelled")]
    Cancelled,
}

impl From<ApiError> for SubmissionError {
    fn from(e: ApiError) -> Self {
        match e {
            // Server-reported: surface the server's message verbatim
            // when the body carries one.
            ApiError::Api { status, body } => {
                SubmissionError::Server(extract_server_message(status, body))
            }
            ApiError::Request(e) => SubmissionError::Transport(e.to_string()),
        }
    }
}

impl From<CoreError> for SubmissionError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(msg) => SubmissionError::Validation(msg),
            other => SubmissionError::Validation(other.to_string()),
        }
    }
}

/// Prefer the `error` field of a JSON error body; fall back to the raw
/// body text with the HTTP status.
fn extract_server_message(status: u16, body: String) -> String {
    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&body) {
        if let Some(message) = parsed.get("error").and_then(|v| v.as_str()) {
            return message.to_string();
        }
    }
    format!("HTTP {status}: {body}")
}

/// Upload credentials and job identity obtained in the metadata phase.
#[derive(Debug, Clone)]
pub struct UploadTicket {
    pub visit_id: String,
    pub cloud_name: String,
    pub upload_preset: String,
}

impl UploadTicket {
    /// Extract the ticket from a metadata response. The three fields
    /// are all mandatory; a missing one is a configuration error and
    /// never guessed at.
    fn from_response(response: MetadataResponse) -> Result<Self, SubmissionError> {
        if response.status != STATUS_SUCCESS {
            return Err(SubmissionError::Server(response.error.unwrap_or_else(
                || format!("Metadata submission rejected (status '{}')", response.status),
            )));
        }

        let missing = |field: &str| {
            SubmissionError::Configuration(format!(
                "Metadata response is missing '{field}'"
            ))
        };

        Ok(Self {
            visit_id: response.visit_id.ok_or_else(|| missing("visit_id"))?,
            cloud_name: response
                .cloudinary_cloud_name
                .ok_or_else(|| missing("cloudinary_cloud_name"))?,
            upload_preset: response
                .cloudinary_upload_preset
                .ok_or_else(|| missing("cloudinary_upload_preset"))?,
        })
    }
}

/// Drives the submission protocol against a [`SubmissionApi`].
pub struct Orchestrator<A> {
    api: A,
    retry: RetryConfig,
    poll: PollConfig,
}

impl<A: SubmissionApi> Orchestrator<A> {
    pub fn new(api: A) -> Self {
        Self::with_configs(api, RetryConfig::default(), PollConfig::default())
    }

    pub fn with_configs(api: A, retry: RetryConfig, poll: PollConfig) -> Self {
        Self { api, retry, poll }
    }

    /// Run one full submission attempt.
    ///
    /// `photos` is the flattened `(item_index, photo_index)` sequence
    /// over the payload's items. A retry after any failure starts over
    /// from validation and obtains a fresh `visit_id`; there is no
    /// resume-from-phase-2 path.
    pub async fn submit(
        &self,
        payload: &SubmissionPayload,
        photos: &[PendingUpload<'_>],
        notifier: &dyn Notifier,
        cancel: &CancellationToken,
    ) -> Result<DocumentLinks, SubmissionError> {
        // Client-generated correlation id for this attempt; a retry
        // gets a fresh one, just as it gets a fresh visit_id.
        let attempt_id = uuid::Uuid::new_v4();

        tracing::debug!(phase = %SubmissionPhase::ValidatingInput, %attempt_id, "Validating submission");
        validate_submission(payload)?;

        tracing::info!(
            phase = %SubmissionPhase::SubmittingMetadata,
            %attempt_id,
            items = payload.report_items.len(),
            photos = photos.len(),
            "Submitting report metadata",
        );
        let ticket = UploadTicket::from_response(self.api.submit_metadata(payload).await?)?;
        tracing::info!(visit_id = %ticket.visit_id, "Metadata accepted");

        let records = self.upload_photos(&ticket, photos, notifier).await?;

        // The attach call is part of the server's job state machine and
        // happens even when there are no photos at all.
        self.api
            .attach_photo_urls(&ticket.visit_id, &records)
            .await?;

        tracing::info!(
            phase = %SubmissionPhase::Finalizing,
            visit_id = %ticket.visit_id,
            "Requesting document generation",
        );
        match self.api.finalize(&ticket.visit_id).await? {
            FinalizeOutcome::Completed(links) => {
                tracing::info!(phase = %SubmissionPhase::Done, "Documents ready");
                Ok(links)
            }
            FinalizeOutcome::Accepted { status_url } => {
                self.await_job(&status_url, notifier, cancel).await
            }
        }
    }

    /// Phase 2: fan out all uploads at once and let every attempt
    /// settle before deciding. Partial failure information is
    /// collected, not discarded: dozens of finished uploads should not
    /// be forfeited silently because of one flaky transfer, and the
    /// user is told exactly how many failed.
    async fn upload_photos(
        &self,
        ticket: &UploadTicket,
        photos: &[PendingUpload<'_>],
        notifier: &dyn Notifier,
    ) -> Result<Vec<PhotoUploadRecord>, SubmissionError> {
        let total = photos.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        tracing::info!(phase = %SubmissionPhase::UploadingPhotos, total, "Uploading photos");
        notifier.notify(
            Severity::Info,
            "Uploading photos",
            &format!("Uploading {total} photos"),
        );

        let uploads = photos.iter().map(|photo| self.upload_one(ticket, photo));
        let results = futures::future::join_all(uploads).await;

        let mut records = Vec::with_capacity(total);
        let mut failed = 0usize;
        for (photo, result) in photos.iter().zip(results) {
            match result {
                Ok(photo_url) => records.push(PhotoUploadRecord {
                    item_index: photo.item_index,
                    photo_index: photo.photo_index,
                    photo_url,
                }),
                Err(e) => {
                    failed += 1;
                    tracing::error!(
                        item_index = photo.item_index,
                        photo_index = photo.photo_index,
                        file = %photo.file.file_name,
                        error = %e,
                        "Photo upload failed",
                    );
                }
            }
        }

        if failed > 0 {
            return Err(SubmissionError::PhotoUploads { failed, total });
        }

        // Completion order is arbitrary; re-impose (item, photo) order
        // once so the server replays deterministically.
        records.sort_by_key(|r| (r.item_index, r.photo_index));
        Ok(records)
    }

    /// Upload one photo, retrying transient failures with backoff.
    async fn upload_one(
        &self,
        ticket: &UploadTicket,
        photo: &PendingUpload<'_>,
    ) -> Result<String, ApiError> {
        let mut delay = self.retry.initial_delay;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self
                .api
                .upload_photo(&ticket.cloud_name, &ticket.upload_preset, photo.file)
                .await
            {
                Ok(url) => return Ok(url),
                Err(e) if attempt < self.retry.max_attempts => {
                    tracing::warn!(
                        item_index = photo.item_index,
                        photo_index = photo.photo_index,
                        attempt,
                        error = %e,
                        "Photo upload attempt failed; retrying",
                    );
                    tokio::time::sleep(delay).await;
                    delay = next_delay(delay, &self.retry);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Phase 5: wait for the background job to reach a terminal state.
    async fn await_job(
        &self,
        status_url: &str,
        notifier: &dyn Notifier,
        cancel: &CancellationToken,
    ) -> Result<DocumentLinks, SubmissionError> {
        tracing::info!(phase = %SubmissionPhase::PollingJob, status_url, "Awaiting report job");
        notifier.notify(
            Severity::Info,
            "Generating report",
            "The server is generating your documents",
        );

        let outcome = poll_job_status(
            &self.api,
            status_url,
            &self.poll,
            |progress| match progress {
                PollProgress::Status(state) => {
                    tracing::debug!(?state, "Report job progress");
                }
                PollProgress::Unreachable => {
                    tracing::warn!("Status endpoint unreachable; continuing to poll");
                }
            },
            cancel,
        )
        .await;

        match outcome {
            PollOutcome::Done(job) => {
                let pdf_url = job.pdf_url.ok_or_else(|| {
                    SubmissionError::Server("Job completed without a pdf_url".to_string())
                })?;
                let excel_url = job.excel_url.ok_or_else(|| {
                    SubmissionError::Server("Job completed without an excel_url".to_string())
                })?;
                tracing::info!(phase = %SubmissionPhase::Done, "Documents ready");
                Ok(DocumentLinks { pdf_url, excel_url })
            }
            PollOutcome::Failed(message) => Err(SubmissionError::JobFailed(message)),
            PollOutcome::TimedOut => Err(SubmissionError::Timeout),
            PollOutcome::Cancelled => Err(SubmissionError::Cancelled),
        }
    }
}
