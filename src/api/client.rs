//! [`ApiClient`]: one async method per service endpoint.

use super::wire::{AnswerResponse, HealthStatus, QuestionRequest, UploadResponse};
use crate::config::ClientConfig;
use crate::error::{ClientError, ErrorBody};
use crate::input::StagedFile;
use crate::model::{collect_chunks, ChunkMetadata, DocumentId};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client as HttpClient, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

/// The pdfchat API client.
///
/// Cheap to clone: the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// Root of the service, always ending in `/`.
    base: Url,

    /// An initialized HTTP client (request timeout applied).
    http: HttpClient,

    /// Per-request override for the upload, which waits on ingestion.
    upload_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("edgequake-pdfchat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base: config.base_url.clone(),
            http,
            upload_timeout: Duration::from_secs(config.upload_timeout_secs),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `{base}/upload/{doc_id}`: where the raw PDF can be fetched or embedded.
    pub fn artifact_url(&self, doc_id: &DocumentId) -> Url {
        self.endpoint(&["upload", &doc_id.to_string()])
    }

    /// Uploads a PDF for ingestion.
    ///
    /// `doc_name` is sent only when present; the service names the document
    /// after the file otherwise.
    pub async fn upload(
        &self,
        file: &StagedFile,
        doc_name: Option<&str>,
    ) -> Result<UploadResponse, ClientError> {
        let endpoint = self.endpoint(&["upload"]);

        let part = Part::bytes(file.bytes().to_vec())
            .file_name(file.file_name().to_string())
            .mime_str("application/pdf")
            .map_err(|e| ClientError::Internal(format!("Invalid MIME type: {e}")))?;
        let mut form = Form::new().part("file", part);
        if let Some(name) = doc_name {
            form = form.text("doc_name", name.to_string());
        }

        info!("Uploading '{}' ({} bytes)", file.file_name(), file.len());
        let res = self
            .http
            .post(endpoint.clone())
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport(&endpoint, e))?;

        read_json(&endpoint, res).await
    }

    /// Returns the chunk list of a document, in service order.
    pub async fn list_chunks(&self, doc_id: &DocumentId) -> Result<Vec<ChunkMetadata>, ClientError> {
        let endpoint = self.endpoint(&["upload", &doc_id.to_string(), "chunks"]);

        let res = self
            .http
            .get(endpoint.clone())
            .send()
            .await
            .map_err(|e| transport(&endpoint, e))?;

        let items: Vec<serde_json::Value> = read_json(&endpoint, res).await?;
        let chunks = collect_chunks(items);
        debug!("Document {}: {} chunks", doc_id, chunks.len());
        Ok(chunks)
    }

    /// Asks a question about a document.
    pub async fn ask(&self, doc_id: &DocumentId, question: &str) -> Result<AnswerResponse, ClientError> {
        let endpoint = self.endpoint(&["query"]);
        let payload = QuestionRequest { doc_id, question };

        let res = self
            .http
            .post(endpoint.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport(&endpoint, e))?;

        read_json(&endpoint, res).await
    }

    /// Checks that the service is up.
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let endpoint = self.base.clone();

        let res = self
            .http
            .get(endpoint.clone())
            .send()
            .await
            .map_err(|e| transport(&endpoint, e))?;

        read_json(&endpoint, res).await
    }

    /// Reports whether the document artifact can be embedded: the service
    /// answers a `HEAD` with success and a PDF content type.
    ///
    /// Any failure reads as "cannot render"; this never errors.
    pub async fn probe_artifact(&self, doc_id: &DocumentId) -> bool {
        let endpoint = self.artifact_url(doc_id);

        match self.http.head(endpoint.clone()).send().await {
            Ok(res) if res.status().is_success() => {
                let is_pdf = res
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|ct| ct.starts_with("application/pdf"));
                debug!("Probe {}: pdf={}", endpoint, is_pdf);
                is_pdf
            }
            Ok(res) => {
                debug!("Probe {}: HTTP {}", endpoint, res.status());
                false
            }
            Err(e) => {
                debug!("Probe {}: {}", endpoint, e);
                false
            }
        }
    }

    /// Join path segments onto the base, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

fn transport(endpoint: &Url, source: reqwest::Error) -> ClientError {
    ClientError::Transport {
        endpoint: endpoint.to_string(),
        source,
    }
}

/// Read a response body, mapping non-success statuses to
/// [`ClientError::Service`] and bad JSON to [`ClientError::Decode`].
async fn read_json<T: DeserializeOwned>(endpoint: &Url, res: Response) -> Result<T, ClientError> {
    let status = res.status();
    let bytes = res.bytes().await.map_err(|e| transport(endpoint, e))?;

    if !status.is_success() {
        return Err(ClientError::Service {
            status,
            body: ErrorBody::parse(&bytes),
        });
    }

    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode {
        endpoint: endpoint.to_string(),
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        let config = ClientConfig::builder().base_url(base).build().unwrap();
        ApiClient::new(&config).unwrap()
    }

    #[test]
    fn artifact_url_is_deterministic() {
        let c = client("http://localhost:5000");
        let id = DocumentId::from(42);
        assert_eq!(c.artifact_url(&id).as_str(), "http://localhost:5000/upload/42");
        assert_eq!(c.artifact_url(&id), c.artifact_url(&id));
    }

    #[test]
    fn endpoint_keeps_prefix_and_encodes_segments() {
        let c = client("https://notes.example.com/api/");
        assert_eq!(
            c.artifact_url(&DocumentId::from("a b/c")).as_str(),
            "https://notes.example.com/api/upload/a%20b%2Fc"
        );
        assert_eq!(
            c.endpoint(&["query"]).as_str(),
            "https://notes.example.com/api/query"
        );
    }
}
