//! Downloading the generated report documents.

use std::path::{Path, PathBuf};

use anyhow::Context;

/// Extract a filename from a URL by taking the last path segment.
///
/// Strips query parameters and fragments. Falls back to `"download"`
/// if no meaningful segment is found.
pub fn filename_from_url(url: &str) -> String {
    // Strip query string and fragment
    let clean = url.split('?').next().unwrap_or(url);
    let clean = clean.split('#').next().unwrap_or(clean);

    // Strip scheme and domain to get the path only
    let path = if let Some(rest) = clean
        .strip_prefix("https://")
        .or_else(|| clean.strip_prefix("http://"))
    {
        rest.find('/').map(|i| &rest[i..]).unwrap_or("")
    } else {
        clean
    };

    path.rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("download")
        .to_string()
}

/// Fetch `url` and write it into `dir`, returning the written path.
pub async fn download_to(
    client: &reqwest::Client,
    url: &str,
    dir: &Path,
) -> anyhow::Result<PathBuf> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Requesting {url}"))?
        .error_for_status()
        .with_context(|| format!("Downloading {url}"))?;

    let bytes = response.bytes().await?;
    let path = dir.join(filename_from_url(url));
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("Writing {}", path.display()))?;

    tracing::info!(url, path = %path.display(), size = bytes.len(), "Document downloaded");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_simple_filename() {
        assert_eq!(
            filename_from_url("https://host/generated/visit_report.pdf"),
            "visit_report.pdf"
        );
    }

    #[test]
    fn strips_query_params() {
        assert_eq!(
            filename_from_url("https://host/generated/report.xlsx?token=abc"),
            "report.xlsx"
        );
    }

    #[test]
    fn empty_path_returns_default() {
        assert_eq!(filename_from_url("https://host/"), "download");
    }
}
