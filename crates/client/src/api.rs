//! REST API client for the report-submission endpoints.
//!
//! Wraps the application server's protocol endpoints (metadata submit,
//! attach photo URLs, finalize, job status) and the direct
//! image-storage upload, using [`reqwest`]. The [`SubmissionApi`] trait
//! fronts the five operations so the orchestrator and poller can run
//! against an in-memory fake in tests.

use serde::{Deserialize, Serialize};

use sitevisit_core::report::{PhotoFile, PhotoUploadRecord, SubmissionPayload};

/// Body `status` value every protocol endpoint uses for success.
pub const STATUS_SUCCESS: &str = "success";
/// Body `status` value the finalize endpoint uses for async acceptance.
pub const STATUS_ACCEPTED: &str = "accepted";

/// Default base URL for direct image-storage uploads.
pub const DEFAULT_UPLOAD_BASE_URL: &str = "https://api.cloudinary.com/v1_1";

/// Response from the metadata-submission endpoint.
///
/// All protocol fields are optional at the wire level; the orchestrator
/// decides which absences are configuration errors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataResponse {
    #[serde(default)]
    pub status: String,
    pub visit_id: Option<String>,
    pub cloudinary_cloud_name: Option<String>,
    pub cloudinary_upload_preset: Option<String>,
    pub error: Option<String>,
}

/// Response from a direct image-storage upload.
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub secure_url: String,
}

/// Generic `{status, error}` acknowledgement body.
#[derive(Debug, Deserialize)]
struct AckBody {
    #[serde(default)]
    status: String,
    error: Option<String>,
}

/// Raw finalize response body. Either carries both document URLs
/// (synchronous completion) or an acceptance status with a poll URL.
#[derive(Debug, Deserialize)]
struct FinalizeBody {
    #[serde(default)]
    status: String,
    pdf_url: Option<String>,
    excel_url: Option<String>,
    status_url: Option<String>,
    error: Option<String>,
}

/// Links to the generated documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLinks {
    pub pdf_url: String,
    pub excel_url: String,
}

/// The two legal outcomes of the finalize call.
#[derive(Debug, Clone)]
pub enum FinalizeOutcome {
    /// The server rendered the documents synchronously.
    Completed(DocumentLinks),
    /// The server enqueued a background job; poll `status_url`.
    Accepted { status_url: String },
}

/// Lifecycle states of a server-side report job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Processing,
    Done,
    Failed,
}

/// One job-status poll response.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobState,
    pub pdf_url: Option<String>,
    pub excel_url: Option<String>,
    pub error: Option<String>,
}

/// Errors from the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status or an explicit
    /// error body.
    #[error("Server error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body, or the server's error message.
        body: String,
    },
}

/// The five protocol operations, abstracted for testability.
#[async_trait::async_trait]
pub trait SubmissionApi: Send + Sync {
    /// Phase 1: send the metadata envelope, receive upload credentials
    /// and a `visit_id`.
    async fn submit_metadata(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<MetadataResponse, ApiError>;

    /// Phase 2a: upload one photo directly to image storage. Returns
    /// the hosted URL.
    async fn upload_photo(
        &self,
        cloud_name: &str,
        upload_preset: &str,
        photo: &PhotoFile,
    ) -> Result<String, ApiError>;

    /// Phase 2b: hand the uploaded URLs back to the server. Must be
    /// called even with an empty list.
    async fn attach_photo_urls(
        &self,
        visit_id: &str,
        records: &[PhotoUploadRecord],
    ) -> Result<(), ApiError>;

    /// Phase 3: trigger document generation.
    async fn finalize(&self, visit_id: &str) -> Result<FinalizeOutcome, ApiError>;

    /// Poll a job's status URL.
    async fn fetch_job_status(&self, status_url: &str) -> Result<JobStatusResponse, ApiError>;
}

/// HTTP implementation of [`SubmissionApi`] against a single server.
pub struct ReportApi {
    client: reqwest::Client,
    base_url: String,
    upload_base_url: String,
}

#[derive(Serialize)]
struct AttachRequest<'a> {
    photo_urls: &'a [PhotoUploadRecord],
}

impl ReportApi {
    /// Create a new API client.
    ///
    /// * `base_url` - application server base, e.g. `http://host:5002`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: trim_trailing_slash(base_url.into()),
            upload_base_url: DEFAULT_UPLOAD_BASE_URL.to_string(),
        }
    }

    /// Override the image-storage upload base URL.
    pub fn with_upload_base_url(mut self, upload_base_url: impl Into<String>) -> Self {
        self.upload_base_url = trim_trailing_slash(upload_base_url.into());
        self
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (connection pooling across uploads).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_trailing_slash(base_url.into()),
            upload_base_url: DEFAULT_UPLOAD_BASE_URL.to_string(),
        }
    }

    /// Default status URL for a visit, used when the finalize response
    /// omits one.
    fn default_status_url(&self, visit_id: &str) -> String {
        format!("{}/site-visit/status?visit_id={visit_id}", self.base_url)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::Api`] carrying
    /// the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[async_trait::async_trait]
impl SubmissionApi for ReportApi {
    async fn submit_metadata(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<MetadataResponse, ApiError> {
        let response = self
            .client
            .post(format!("{}/site-visit/submit-metadata", self.base_url))
            .json(payload)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn upload_photo(
        &self,
        cloud_name: &str,
        upload_preset: &str,
        photo: &PhotoFile,
    ) -> Result<String, ApiError> {
        let part = reqwest::multipart::Part::bytes(photo.bytes.clone())
            .file_name(photo.file_name.clone())
            .mime_str(&photo.content_type)?;
        let form = reqwest::multipart::Form::new()
            .text("upload_preset", upload_preset.to_string())
            .part("file", part);

        let response = self
            .client
            .post(format!("{}/{cloud_name}/image/upload", self.upload_base_url))
            .multipart(form)
            .send()
            .await?;

        let parsed: UploadResponse = Self::parse_response(response).await?;
        Ok(parsed.secure_url)
    }

    async fn attach_photo_urls(
        &self,
        visit_id: &str,
        records: &[PhotoUploadRecord],
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .post(format!("{}/site-visit/attach-photo-urls", self.base_url))
            .query(&[("visit_id", visit_id)])
            .json(&AttachRequest {
                photo_urls: records,
            })
            .send()
            .await?;

        let ack: AckBody = Self::parse_response(response).await?;
        // The acknowledgement must be explicit; anything else is fatal
        // to the submission.
        if ack.status != STATUS_SUCCESS {
            return Err(ApiError::Api {
                status: 200,
                body: ack
                    .error
                    .unwrap_or_else(|| format!("Attach rejected (status '{}')", ack.status)),
            });
        }
        Ok(())
    }

    async fn finalize(&self, visit_id: &str) -> Result<FinalizeOutcome, ApiError> {
        let response = self
            .client
            .get(format!("{}/site-visit/finalize", self.base_url))
            .query(&[("visit_id", visit_id)])
            .send()
            .await?;

        let http_status = response.status();
        let response = Self::ensure_success(response).await?;
        let body: FinalizeBody = response.json().await?;

        // Async acceptance: HTTP 202, or an explicit body status.
        if http_status == reqwest::StatusCode::ACCEPTED || body.status == STATUS_ACCEPTED {
            let status_url = body
                .status_url
                .unwrap_or_else(|| self.default_status_url(visit_id));
            return Ok(FinalizeOutcome::Accepted { status_url });
        }

        // Synchronous completion carries both document URLs directly.
        if let (Some(pdf_url), Some(excel_url)) = (body.pdf_url, body.excel_url) {
            return Ok(FinalizeOutcome::Completed(DocumentLinks {
                pdf_url,
                excel_url,
            }));
        }

        Err(ApiError::Api {
            status: http_status.as_u16(),
            body: body
                .error
                .unwrap_or_else(|| "Finalize response carried neither document URLs nor an acceptance status".to_string()),
        })
    }

    async fn fetch_job_status(&self, status_url: &str) -> Result<JobStatusResponse, ApiError> {
        let response = self.client.get(status_url).send().await?;
        Self::parse_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_parses_lowercase_wire_values() {
        let job: JobStatusResponse = serde_json::from_str(
            r#"{"status": "done", "pdf_url": "a", "excel_url": "b"}"#,
        )
        .unwrap();
        assert_eq!(job.status, JobState::Done);
        assert_eq!(job.pdf_url.as_deref(), Some("a"));
    }

    #[test]
    fn metadata_response_tolerates_missing_fields() {
        let parsed: MetadataResponse =
            serde_json::from_str(r#"{"status": "success", "visit_id": "v1"}"#).unwrap();
        assert_eq!(parsed.status, STATUS_SUCCESS);
        assert_eq!(parsed.visit_id.as_deref(), Some("v1"));
        assert!(parsed.cloudinary_cloud_name.is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = ReportApi::new("http://localhost:5002/");
        assert_eq!(
            api.default_status_url("v9"),
            "http://localhost:5002/site-visit/status?visit_id=v9"
        );
    }

    #[test]
    fn attach_request_serializes_photo_urls() {
        let records = vec![PhotoUploadRecord {
            item_index: 0,
            photo_index: 1,
            photo_url: "https://cdn.example/p.jpg".to_string(),
        }];
        let json = serde_json::to_value(AttachRequest {
            photo_urls: &records,
        })
        .unwrap();
        assert_eq!(json["photo_urls"][0]["photo_index"], 1);
    }
}
