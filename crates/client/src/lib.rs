//! HTTP client for the site-visit report submission protocol.
//!
//! Implements the three-phase submission flow (metadata envelope,
//! direct-to-storage photo upload, finalize), the job-status poller for
//! asynchronous document generation, and the controller that owns
//! client-side form state across submission attempts.

pub mod api;
pub mod controller;
pub mod events;
pub mod orchestrator;
pub mod poller;
pub mod retry;
