//! Report items and the submission payload.
//!
//! A [`ReportItem`] is one catalogued defect/observation line in a
//! site-visit report. Items are built from unvalidated drafts, are
//! immutable once built (remove-and-re-add is the only edit path), and
//! own their normalized photos until submission. The
//! [`SubmissionPayload`] is the JSON metadata envelope sent during the
//! first protocol phase: photo bytes are stripped and replaced by
//! per-item counts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::CoreError;
use crate::normalize::{normalize, NormalizeBounds, NormalizedPhoto};

/// Hard cap on photos attached to a single item.
pub const MAX_PHOTOS_PER_ITEM: usize = 10;

/// Minimum length of a signature data-URI. A blank canvas exports to a
/// short string; anything under this length is treated as no signature.
pub const MIN_SIGNATURE_LEN: usize = 100;

/// `visit_info` key whose value survives the post-submission form reset.
pub const FIELD_TECHNICIAN_NAME: &str = "technician_name";

/// An in-memory file handle: name, MIME type, and raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Unvalidated input for one report line, as collected from the form.
#[derive(Debug, Clone, Default)]
pub struct ReportItemDraft {
    pub asset: String,
    pub system: String,
    pub description: String,
    /// Free-form quantity text; defaults to 1 when missing or unparseable.
    pub quantity: Option<String>,
    pub brand: Option<String>,
    pub comments: Option<String>,
    pub photos: Vec<PhotoFile>,
}

/// One validated line entry in the report.
#[derive(Debug, Clone)]
pub struct ReportItem {
    pub asset: String,
    pub system: String,
    pub description: String,
    pub quantity: u32,
    pub brand: Option<String>,
    pub comments: Option<String>,
    pub photos: Vec<NormalizedPhoto>,
}

impl ReportItem {
    /// Validate a draft against the catalog and normalize its photos.
    ///
    /// The photo-count limit is checked before any normalization work
    /// is done, so an over-limit draft is rejected cheaply.
    pub fn from_draft(
        draft: ReportItemDraft,
        catalog: &Catalog,
        bounds: &NormalizeBounds,
    ) -> Result<Self, CoreError> {
        catalog.validate_selection(&draft.asset, &draft.system, &draft.description)?;

        if draft.photos.len() > MAX_PHOTOS_PER_ITEM {
            return Err(CoreError::Validation(format!(
                "An item may carry at most {MAX_PHOTOS_PER_ITEM} photos, got {}",
                draft.photos.len()
            )));
        }

        let quantity = parse_quantity(draft.quantity.as_deref());
        let photos = draft
            .photos
            .into_iter()
            .map(|photo| normalize(photo, bounds))
            .collect();

        Ok(Self {
            asset: draft.asset,
            system: draft.system,
            description: draft.description,
            quantity,
            brand: none_if_blank(draft.brand),
            comments: none_if_blank(draft.comments),
            photos,
        })
    }

    /// Number of photos attached to this item.
    pub fn photo_count(&self) -> usize {
        self.photos.len()
    }
}

/// Parse a quantity string, defaulting to 1 on missing, unparseable, or
/// non-positive input.
fn parse_quantity(raw: Option<&str>) -> u32 {
    raw.and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|q| *q > 0)
        .unwrap_or(1)
}

fn none_if_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Signature pad exports, as data-URI strings (empty when not signed).
///
/// The serde rename preserves the wire casing the server expects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signatures {
    #[serde(default)]
    pub tech_signature: String,
    #[serde(rename = "opMan_signature", default)]
    pub op_man_signature: String,
}

/// One item as it appears in the metadata payload: photos replaced by a
/// count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadItem {
    pub asset: String,
    pub system: String,
    pub description: String,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    pub photo_count: usize,
}

impl From<&ReportItem> for PayloadItem {
    fn from(item: &ReportItem) -> Self {
        Self {
            asset: item.asset.clone(),
            system: item.system.clone(),
            description: item.description.clone(),
            quantity: item.quantity,
            brand: item.brand.clone(),
            comments: item.comments.clone(),
            photo_count: item.photo_count(),
        }
    }
}

/// The JSON metadata envelope for the first protocol phase. Carries no
/// photo bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub visit_info: BTreeMap<String, String>,
    pub report_items: Vec<PayloadItem>,
    pub signatures: Signatures,
}

impl SubmissionPayload {
    /// Assemble the envelope from the form fields, pending items, and
    /// signature exports.
    pub fn from_parts(
        visit_info: BTreeMap<String, String>,
        items: &[ReportItem],
        signatures: Signatures,
    ) -> Self {
        Self {
            visit_info,
            report_items: items.iter().map(PayloadItem::from).collect(),
            signatures,
        }
    }
}

/// Pre-network validation of a submission. Pure: re-running it on a
/// retry yields the identical result.
pub fn validate_submission(payload: &SubmissionPayload) -> Result<(), CoreError> {
    let technician = payload
        .visit_info
        .get(FIELD_TECHNICIAN_NAME)
        .map(|s| s.trim())
        .unwrap_or_default();
    if technician.is_empty() {
        return Err(CoreError::Validation("Technician name is required".to_string()));
    }

    if payload.signatures.tech_signature.len() < MIN_SIGNATURE_LEN {
        return Err(CoreError::Validation(
            "Technician signature is required".to_string(),
        ));
    }

    if payload.report_items.is_empty() {
        return Err(CoreError::Validation(
            "Add at least one report item before submitting".to_string(),
        ));
    }

    Ok(())
}

/// One photo awaiting upload, positioned by its item and photo indices.
#[derive(Debug, Clone, Copy)]
pub struct PendingUpload<'a> {
    pub item_index: usize,
    pub photo_index: usize,
    pub file: &'a PhotoFile,
}

/// Flatten all photos across items into `(item_index, photo_index)`
/// order. The indices are positional references into the
/// `report_items` ordering at submission time; the server uses them to
/// re-attach uploaded URLs to the correct slot.
pub fn flatten_photos(items: &[ReportItem]) -> Vec<PendingUpload<'_>> {
    items
        .iter()
        .enumerate()
        .flat_map(|(item_index, item)| {
            item.photos
                .iter()
                .enumerate()
                .map(move |(photo_index, photo)| PendingUpload {
                    item_index,
                    photo_index,
                    file: photo.file(),
                })
        })
        .collect()
}

/// Produced per successfully uploaded photo; sent to the attach
/// endpoint so the server can wire URLs back to item/photo slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoUploadRecord {
    pub item_index: usize,
    pub photo_index: usize,
    pub photo_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn catalog() -> Catalog {
        Catalog::from_json_str(
            r#"{"HVAC": {"Chiller": ["Refrigerant leak", "Compressor noise"]}}"#,
        )
        .unwrap()
    }

    fn photo(name: &str) -> PhotoFile {
        PhotoFile {
            file_name: name.to_string(),
            content_type: "application/octet-stream".to_string(),
            bytes: vec![0u8; 8],
        }
    }

    fn draft_with_photos(count: usize) -> ReportItemDraft {
        ReportItemDraft {
            asset: "HVAC".to_string(),
            system: "Chiller".to_string(),
            description: "Refrigerant leak".to_string(),
            quantity: Some("2".to_string()),
            brand: Some("Acme".to_string()),
            comments: None,
            photos: (0..count).map(|i| photo(&format!("p{i}.jpg"))).collect(),
        }
    }

    fn valid_signature() -> String {
        format!("data:image/png;base64,{}", "A".repeat(120))
    }

    fn payload_with(items: &[ReportItem]) -> SubmissionPayload {
        let mut visit_info = BTreeMap::new();
        visit_info.insert(FIELD_TECHNICIAN_NAME.to_string(), "Jane Doe".to_string());
        SubmissionPayload::from_parts(
            visit_info,
            items,
            Signatures {
                tech_signature: valid_signature(),
                op_man_signature: String::new(),
            },
        )
    }

    // -- drafts ---------------------------------------------------------------

    #[test]
    fn draft_builds_item_with_defaults() {
        let item =
            ReportItem::from_draft(draft_with_photos(2), &catalog(), &NormalizeBounds::default())
                .unwrap();
        assert_eq!(item.quantity, 2);
        assert_eq!(item.photo_count(), 2);
        assert_eq!(item.brand.as_deref(), Some("Acme"));
        assert!(item.comments.is_none());
    }

    #[test]
    fn quantity_defaults_to_one() {
        assert_eq!(parse_quantity(None), 1);
        assert_eq!(parse_quantity(Some("")), 1);
        assert_eq!(parse_quantity(Some("many")), 1);
        assert_eq!(parse_quantity(Some("0")), 1);
        assert_eq!(parse_quantity(Some(" 3 ")), 3);
    }

    #[test]
    fn over_limit_photos_rejected() {
        let err = ReportItem::from_draft(
            draft_with_photos(MAX_PHOTOS_PER_ITEM + 1),
            &catalog(),
            &NormalizeBounds::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("at most"));
    }

    #[test]
    fn inconsistent_selection_rejected() {
        let mut draft = draft_with_photos(0);
        draft.description = "Belt worn".to_string();
        assert!(
            ReportItem::from_draft(draft, &catalog(), &NormalizeBounds::default()).is_err()
        );
    }

    // -- payload --------------------------------------------------------------

    #[test]
    fn payload_replaces_photos_with_counts() {
        let item =
            ReportItem::from_draft(draft_with_photos(3), &catalog(), &NormalizeBounds::default())
                .unwrap();
        let payload = payload_with(std::slice::from_ref(&item));

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["report_items"][0]["photo_count"], 3);
        assert!(json["report_items"][0].get("photos").is_none());
    }

    #[test]
    fn signature_field_keeps_wire_casing() {
        let json = serde_json::to_value(Signatures {
            tech_signature: "t".to_string(),
            op_man_signature: "o".to_string(),
        })
        .unwrap();
        assert_eq!(json["tech_signature"], "t");
        assert_eq!(json["opMan_signature"], "o");
    }

    // -- validation -----------------------------------------------------------

    #[test]
    fn valid_payload_accepted() {
        let item =
            ReportItem::from_draft(draft_with_photos(1), &catalog(), &NormalizeBounds::default())
                .unwrap();
        assert!(validate_submission(&payload_with(std::slice::from_ref(&item))).is_ok());
    }

    #[test]
    fn missing_technician_name_rejected() {
        let item =
            ReportItem::from_draft(draft_with_photos(0), &catalog(), &NormalizeBounds::default())
                .unwrap();
        let mut payload = payload_with(std::slice::from_ref(&item));
        payload.visit_info.insert(FIELD_TECHNICIAN_NAME.to_string(), "  ".to_string());
        assert!(validate_submission(&payload).is_err());
    }

    #[test]
    fn short_signature_rejected() {
        let item =
            ReportItem::from_draft(draft_with_photos(0), &catalog(), &NormalizeBounds::default())
                .unwrap();
        let mut payload = payload_with(std::slice::from_ref(&item));
        payload.signatures.tech_signature = "data:image/png;base64,AAAA".to_string();
        assert!(validate_submission(&payload).is_err());
    }

    #[test]
    fn empty_item_list_rejected() {
        let payload = payload_with(&[]);
        assert!(validate_submission(&payload).is_err());
    }

    // -- flattening -----------------------------------------------------------

    #[test]
    fn flatten_preserves_item_then_photo_order() {
        let bounds = NormalizeBounds::default();
        let cat = catalog();
        let first = ReportItem::from_draft(draft_with_photos(2), &cat, &bounds).unwrap();
        let second = ReportItem::from_draft(draft_with_photos(1), &cat, &bounds).unwrap();

        let items = [first, second];
        let flat = flatten_photos(&items);
        let positions: Vec<(usize, usize)> =
            flat.iter().map(|u| (u.item_index, u.photo_index)).collect();
        assert_eq!(positions, vec![(0, 0), (0, 1), (1, 0)]);
    }
}
