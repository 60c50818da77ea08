//! User-facing notification seam.
//!
//! The protocol code reports progress and failures as
//! `(severity, title, message)` triples; what renders them (a terminal,
//! a toast widget) is the embedder's concern.

/// How loudly to present a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// Notification sink for user-visible events.
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, title: &str, message: &str);
}

/// Notifier that logs through [`tracing`], for headless embedders.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, severity: Severity, title: &str, message: &str) {
        match severity {
            Severity::Error => tracing::error!(%title, "{message}"),
            Severity::Warning => tracing::warn!(%title, "{message}"),
            Severity::Info | Severity::Success => {
                tracing::info!(severity = severity.as_str(), %title, "{message}")
            }
        }
    }
}

/// Notifier that discards everything.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _severity: Severity, _title: &str, _message: &str) {}
}
