//! Asset / system / description lookup catalog.
//!
//! The report form only accepts selections drawn from a nested lookup
//! table: every asset owns a set of systems, every system a set of
//! descriptions. The table ships as a JSON document with exactly that
//! nesting and is loaded once at startup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The nested asset → system → description lookup table.
///
/// Keys are the display strings shown in the form dropdowns; the
/// innermost vectors hold the valid descriptions for one system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog(BTreeMap<String, BTreeMap<String, Vec<String>>>);

impl Catalog {
    /// Parse a catalog from its JSON representation.
    pub fn from_json_str(raw: &str) -> Result<Self, CoreError> {
        serde_json::from_str(raw).map_err(|e| CoreError::Catalog(format!("Invalid catalog JSON: {e}")))
    }

    /// Number of assets in the catalog.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the catalog contains no assets at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All asset names, in sorted order.
    pub fn assets(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// System names belonging to `asset`, or `None` for an unknown asset.
    pub fn systems(&self, asset: &str) -> Option<impl Iterator<Item = &str>> {
        self.0.get(asset).map(|systems| systems.keys().map(String::as_str))
    }

    /// Descriptions belonging to `system` under `asset`.
    pub fn descriptions(&self, asset: &str, system: &str) -> Option<&[String]> {
        self.0
            .get(asset)
            .and_then(|systems| systems.get(system))
            .map(Vec::as_slice)
    }

    /// Check that a full selection is internally consistent: the system
    /// must belong to the asset and the description to the system.
    ///
    /// Empty selections are reported as "required" rather than "unknown"
    /// so the caller can surface a sensible form error.
    pub fn validate_selection(
        &self,
        asset: &str,
        system: &str,
        description: &str,
    ) -> Result<(), CoreError> {
        if asset.trim().is_empty() {
            return Err(CoreError::Validation("Asset selection is required".to_string()));
        }
        if system.trim().is_empty() {
            return Err(CoreError::Validation("System selection is required".to_string()));
        }
        if description.trim().is_empty() {
            return Err(CoreError::Validation(
                "Description selection is required".to_string(),
            ));
        }

        let systems = self.0.get(asset).ok_or_else(|| {
            CoreError::Validation(format!("Unknown asset: '{asset}'"))
        })?;

        let descriptions = systems.get(system).ok_or_else(|| {
            CoreError::Validation(format!("System '{system}' does not belong to asset '{asset}'"))
        })?;

        if !descriptions.iter().any(|d| d == description) {
            return Err(CoreError::Validation(format!(
                "Description '{description}' does not belong to system '{system}'"
            )));
        }

        Ok(())
    }
}
