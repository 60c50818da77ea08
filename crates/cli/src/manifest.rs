//! Visit manifest loading.
//!
//! A manifest is the headless stand-in for the report form: a JSON
//! document naming the visit-info fields, the signature image files,
//! and the report items with their photo paths. Relative paths are
//! resolved against the manifest's own directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use sitevisit_core::report::{PhotoFile, ReportItemDraft, Signatures};

/// The top-level manifest document.
#[derive(Debug, Deserialize)]
pub struct VisitManifest {
    #[serde(default)]
    pub visit_info: BTreeMap<String, String>,
    #[serde(default)]
    pub signatures: SignatureFiles,
    #[serde(default)]
    pub items: Vec<ManifestItem>,
}

/// Paths to the signature-pad PNG exports.
#[derive(Debug, Default, Deserialize)]
pub struct SignatureFiles {
    pub tech_signature_file: Option<PathBuf>,
    pub op_man_signature_file: Option<PathBuf>,
}

/// One report item as written in the manifest.
#[derive(Debug, Deserialize)]
pub struct ManifestItem {
    pub asset: String,
    pub system: String,
    pub description: String,
    pub quantity: Option<String>,
    pub brand: Option<String>,
    pub comments: Option<String>,
    #[serde(default)]
    pub photos: Vec<PathBuf>,
}

impl ManifestItem {
    /// Load the item's photo files and produce a draft for validation.
    pub fn into_draft(self, base_dir: &Path) -> anyhow::Result<ReportItemDraft> {
        let photos = self
            .photos
            .iter()
            .map(|p| load_photo(&resolve(base_dir, p)))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(ReportItemDraft {
            asset: self.asset,
            system: self.system,
            description: self.description,
            quantity: self.quantity,
            brand: self.brand,
            comments: self.comments,
            photos,
        })
    }
}

/// Parse a manifest file.
pub fn load_manifest(path: &Path) -> anyhow::Result<VisitManifest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Reading manifest {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Parsing manifest {}", path.display()))
}

/// Read the signature files named in the manifest into data-URIs.
/// Missing entries become empty strings (no signature).
pub fn resolve_signatures(
    files: &SignatureFiles,
    base_dir: &Path,
) -> anyhow::Result<Signatures> {
    let read = |file: &Option<PathBuf>| -> anyhow::Result<String> {
        match file {
            Some(path) => signature_data_uri(&resolve(base_dir, path)),
            None => Ok(String::new()),
        }
    };

    Ok(Signatures {
        tech_signature: read(&files.tech_signature_file)?,
        op_man_signature: read(&files.op_man_signature_file)?,
    })
}

/// Read a signature PNG and encode it the way the signature pad
/// exports it.
pub fn signature_data_uri(path: &Path) -> anyhow::Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Reading signature {}", path.display()))?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(&bytes)))
}

/// Read one photo file into memory with a MIME type from its extension.
pub fn load_photo(path: &Path) -> anyhow::Result<PhotoFile> {
    let bytes = std::fs::read(path).with_context(|| format!("Reading photo {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("photo")
        .to_string();
    Ok(PhotoFile {
        content_type: content_type_for(&file_name).to_string(),
        file_name,
        bytes,
    })
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("leak.jpg"), b"not really a jpeg").unwrap();
        let manifest_path = dir.path().join("visit.json");
        std::fs::write(
            &manifest_path,
            r#"{
                "visit_info": {"technician_name": "Jane Doe", "building_name": "Tower A"},
                "items": [{
                    "asset": "HVAC",
                    "system": "Chiller",
                    "description": "Refrigerant leak",
                    "quantity": "2",
                    "photos": ["leak.jpg"]
                }]
            }"#,
        )
        .unwrap();

        let manifest = load_manifest(&manifest_path).unwrap();
        assert_eq!(
            manifest.visit_info.get("technician_name").map(String::as_str),
            Some("Jane Doe")
        );
        assert_eq!(manifest.items.len(), 1);

        let draft = manifest
            .items
            .into_iter()
            .next()
            .unwrap()
            .into_draft(dir.path())
            .unwrap();
        assert_eq!(draft.photos.len(), 1);
        assert_eq!(draft.photos[0].file_name, "leak.jpg");
        assert_eq!(draft.photos[0].content_type, "image/jpeg");
    }

    #[test]
    fn missing_photo_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let item = ManifestItem {
            asset: "HVAC".to_string(),
            system: "Chiller".to_string(),
            description: "Refrigerant leak".to_string(),
            quantity: None,
            brand: None,
            comments: None,
            photos: vec![PathBuf::from("nope.jpg")],
        };
        assert!(item.into_draft(dir.path()).is_err());
    }

    #[test]
    fn signature_reads_as_data_uri() {
        let dir = tempfile::tempdir().unwrap();
        let sig_path = dir.path().join("sig.png");
        std::fs::write(&sig_path, vec![0u8; 100]).unwrap();

        let uri = signature_data_uri(&sig_path).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
        // A real signature export comfortably clears the blank-canvas
        // length check.
        assert!(uri.len() > 100);
    }

    #[test]
    fn absent_signature_files_become_empty_strings() {
        let signatures =
            resolve_signatures(&SignatureFiles::default(), Path::new(".")).unwrap();
        assert!(signatures.tech_signature.is_empty());
        assert!(signatures.op_man_signature.is_empty());
    }

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type_for("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("a.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("a.png"), "image/png");
        assert_eq!(content_type_for("a.webp"), "image/webp");
        assert_eq!(content_type_for("a.pdf"), "application/octet-stream");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }
}
