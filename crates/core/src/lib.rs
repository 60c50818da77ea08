//! Core domain model for the site-visit reporting client.
//!
//! Pure logic only: the asset/system/description catalog, report items
//! and payload shapes, the pending-item store, and best-effort photo
//! normalization. All network and filesystem concerns live in the
//! client and CLI crates.

pub mod catalog;
pub mod error;
pub mod normalize;
pub mod pending;
pub mod report;
