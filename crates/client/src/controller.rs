//! Owner of client-side form state across submission attempts.
//!
//! The controller holds what the form holds: the pending-item store,
//! the visit-info fields, and the two signature exports. It runs the
//! orchestrator and applies the terminal-outcome rules: a success
//! clears everything except the technician name; any failure preserves
//! all state so the user can retry without re-entering it. The submit
//! gate is released on every path through a single release point.

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;

use sitevisit_core::pending::PendingItemStore;
use sitevisit_core::report::{
    flatten_photos, ReportItem, Signatures, SubmissionPayload, FIELD_TECHNICIAN_NAME,
};

use crate::api::{DocumentLinks, SubmissionApi};
use crate::events::{Notifier, Severity};
use crate::orchestrator::{Orchestrator, SubmissionError, SubmissionPhase};
use crate::poller::PollConfig;
use crate::retry::RetryConfig;

pub struct SubmissionController<A> {
    orchestrator: Orchestrator<A>,
    notifier: Box<dyn Notifier>,
    store: PendingItemStore,
    visit_info: BTreeMap<String, String>,
    signatures: Signatures,
    in_flight: bool,
}

impl<A: SubmissionApi> SubmissionController<A> {
    pub fn new(api: A, notifier: Box<dyn Notifier>) -> Self {
        Self::with_configs(api, notifier, RetryConfig::default(), PollConfig::default())
    }

    pub fn with_configs(
        api: A,
        notifier: Box<dyn Notifier>,
        retry: RetryConfig,
        poll: PollConfig,
    ) -> Self {
        Self {
            orchestrator: Orchestrator::with_configs(api, retry, poll),
            notifier,
            store: PendingItemStore::new(),
            visit_info: BTreeMap::new(),
            signatures: Signatures::default(),
            in_flight: false,
        }
    }

    /// Replace the default pending-item store (e.g. to attach a view).
    pub fn with_store(mut self, store: PendingItemStore) -> Self {
        self.store = store;
        self
    }

    // ---- form state ----

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.visit_info.insert(name.into(), value.into());
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.visit_info.get(name).map(String::as_str)
    }

    pub fn set_signatures(&mut self, signatures: Signatures) {
        self.signatures = signatures;
    }

    pub fn signatures(&self) -> &Signatures {
        &self.signatures
    }

    pub fn add_item(&mut self, item: ReportItem) {
        self.store.add(item);
    }

    pub fn remove_item(&mut self, index: usize) -> Option<ReportItem> {
        self.store.remove_at(index)
    }

    pub fn store(&self) -> &PendingItemStore {
        &self.store
    }

    // ---- submission ----

    /// Run one submission attempt over the current form state.
    pub async fn submit(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<DocumentLinks, SubmissionError> {
        if self.in_flight {
            return Err(SubmissionError::Validation(
                "A submission is already in progress".to_string(),
            ));
        }

        self.in_flight = true;
        let result = self.run_submission(cancel).await;
        // Single release point: the submit gate re-opens on every
        // success and every failure path.
        self.in_flight = false;

        match &result {
            Ok(_) => {
                self.notifier.notify(
                    Severity::Success,
                    "Report submitted",
                    "Your documents are ready to download",
                );
                self.reset_after_success();
            }
            Err(e) => {
                tracing::warn!(phase = %SubmissionPhase::Failed, error = %e, "Submission failed");
                let (severity, title) = failure_presentation(e);
                self.notifier.notify(severity, title, &e.to_string());
                // Pending items and signatures are deliberately kept so
                // a retry does not start from a blank form.
            }
        }

        result
    }

    async fn run_submission(
        &self,
        cancel: &CancellationToken,
    ) -> Result<DocumentLinks, SubmissionError> {
        let payload = SubmissionPayload::from_parts(
            self.visit_info.clone(),
            self.store.items(),
            self.signatures.clone(),
        );
        let photos = flatten_photos(self.store.items());
        self.orchestrator
            .submit(&payload, &photos, self.notifier.as_ref(), cancel)
            .await
    }

    /// Clear the form after a successful submission. The technician
    /// name survives the reset: the same person usually files several
    /// reports in a row.
    fn reset_after_success(&mut self) {
        self.store.clear();
        self.signatures = Signatures::default();

        let technician = self.visit_info.get(FIELD_TECHNICIAN_NAME).cloned();
        self.visit_info.clear();
        if let Some(name) = technician {
            self.visit_info.insert(FIELD_TECHNICIAN_NAME.to_string(), name);
        }
    }
}

/// Map a failure to its user-facing severity and title.
fn failure_presentation(error: &SubmissionError) -> (Severity, &'static str) {
    match error {
        SubmissionError::Validation(_) => (Severity::Warning, "Cannot submit yet"),
        SubmissionError::Configuration(_) => (Severity::Error, "Server misconfigured"),
        SubmissionError::PhotoUploads { .. } => (Severity::Error, "Photo upload failed"),
        SubmissionError::Server(_) | SubmissionError::Transport(_) => {
            (Severity::Error, "Submission failed")
        }
        SubmissionError::JobFailed(_) => (Severity::Error, "Report generation failed"),
        SubmissionError::Timeout => (Severity::Error, "Report generation timed out"),
        SubmissionError::Cancelled => (Severity::Info, "Submission cancelled"),
    }
}
