use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::domain::{AskRequest, AskResponse, Dataset, UploadFile, UploadReceipt};
use crate::error::PilotError;

/// Outcome of one remote call together with its round-trip time.
#[derive(Debug, Clone, PartialEq)]
pub struct Timed<T> {
    pub result: Result<T, PilotError>,
    pub round_trip: Duration,
}

impl<T> Timed<T> {
    pub fn new(result: Result<T, PilotError>, round_trip: Duration) -> Self {
        Self { result, round_trip }
    }

    pub fn round_trip_ms(&self) -> u128 {
        self.round_trip.as_millis()
    }
}

/// The remote analytics service as seen by a session.
#[async_trait]
pub trait AnalyticsGateway: Send + Sync {
    async fn upload(&self, file: UploadFile) -> Timed<UploadReceipt>;

    async fn ask(&self, dataset_id: &str, question: &str) -> Timed<AskResponse>;

    async fn list_datasets(&self) -> Timed<Vec<Dataset>>;

    /// A dataset the service no longer knows about counts as deleted.
    async fn delete_dataset(&self, dataset_id: &str) -> Timed<()>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

fn detail_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(text) if !text.trim().is_empty() => Some(text),
        serde_json::Value::String(_) | serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Maps a non-success response to the error taxonomy: client errors are
/// validation failures, everything else is a network failure.
/// Content type for an uploaded file, judged by its extension.
fn upload_mime(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, extension)| extension.to_ascii_lowercase());
    match extension.as_deref() {
        Some("csv") => "text/csv",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("xls") => "application/vnd.ms-excel",
        _ => "application/octet-stream",
    }
}

async fn failure(response: Response, fallback: &str) -> PilotError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = detail_message(&body).unwrap_or_else(|| fallback.to_string());

    if status.is_client_error() {
        PilotError::Validation { message }
    } else {
        PilotError::Network { message }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, PilotError> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, PilotError> {
        let base_url = Url::parse(api_base)?;
        if base_url.cannot_be_a_base() {
            return Err(PilotError::Config {
                message: format!("API base cannot hold paths: {}", api_base),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PilotError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        info!("Analytics gateway configured for {}", base_url);

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends path segments to the base URL, escaping each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, PilotError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PilotError::Config {
                message: format!("API base cannot hold paths: {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send_upload(&self, file: UploadFile) -> Result<UploadReceipt, PilotError> {
        let url = self.endpoint(&["upload"])?;
        let part = Part::bytes(file.content.to_vec())
            .file_name(file.file_name.clone())
            .mime_str(upload_mime(&file.file_name))?;
        let form = Form::new().part("file", part);

        let response = self.client.post(url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(failure(response, "Upload failed").await);
        }
        decode(response).await
    }

    async fn send_ask(&self, dataset_id: &str, question: &str) -> Result<AskResponse, PilotError> {
        let url = self.endpoint(&["ask"])?;
        let request = AskRequest {
            dataset_id,
            question,
        };

        let response = self.client.post(url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(failure(response, "Query failed").await);
        }
        decode(response).await
    }

    async fn send_list(&self) -> Result<Vec<Dataset>, PilotError> {
        let url = self.endpoint(&["datasets"])?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(failure(response, "Failed to list datasets").await);
        }
        decode(response).await
    }

    async fn send_delete(&self, dataset_id: &str) -> Result<(), PilotError> {
        let url = self.endpoint(&["datasets", dataset_id])?;

        let response = self.client.delete(url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("Dataset {} was already gone remotely", dataset_id);
            return Ok(());
        }
        if !status.is_success() {
            return Err(failure(response, "Failed to delete dataset").await);
        }
        Ok(())
    }
}

fn log_outcome<T>(operation: &str, timed: &Timed<T>) {
    match &timed.result {
        Ok(_) => info!(
            "{} completed in {}ms",
            operation,
            timed.round_trip_ms()
        ),
        Err(e) if e.is_remote() => warn!(
            "{} failed after {}ms: {}",
            operation,
            timed.round_trip_ms(),
            e
        ),
        Err(e) => error!("{} could not be sent: {}", operation, e),
    }
}

#[async_trait]
impl AnalyticsGateway for HttpGateway {
    async fn upload(&self, file: UploadFile) -> Timed<UploadReceipt> {
        info!(
            "Uploading {} ({} bytes)",
            file.file_name,
            file.content.len()
        );
        let start = Instant::now();
        let result = self.send_upload(file).await;
        let timed = Timed::new(result, start.elapsed());
        log_outcome("Upload", &timed);
        timed
    }

    async fn ask(&self, dataset_id: &str, question: &str) -> Timed<AskResponse> {
        info!("Asking dataset {}: {}", dataset_id, question);
        let start = Instant::now();
        let result = self.send_ask(dataset_id, question).await;
        let timed = Timed::new(result, start.elapsed());
        log_outcome("Ask", &timed);
        timed
    }

    async fn list_datasets(&self) -> Timed<Vec<Dataset>> {
        let start = Instant::now();
        let result = self.send_list().await;
        let timed = Timed::new(result, start.elapsed());
        log_outcome("List datasets", &timed);
        timed
    }

    async fn delete_dataset(&self, dataset_id: &str) -> Timed<()> {
        info!("Deleting dataset {}", dataset_id);
        let start = Instant::now();
        let result = self.send_delete(dataset_id).await;
        let timed = Timed::new(result, start.elapsed());
        log_outcome("Delete dataset", &timed);
        timed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_mime_follows_extension() {
        assert_eq!(upload_mime("sales.csv"), "text/csv");
        assert_eq!(
            upload_mime("Q3.Report.XLSX"),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        assert_eq!(upload_mime("legacy.xls"), "application/vnd.ms-excel");
        assert_eq!(upload_mime("notes"), "application/octet-stream");
        assert_eq!(upload_mime("data.json"), "application/octet-stream");
    }

    #[test]
    fn endpoint_appends_to_base_path() {
        let gateway =
            HttpGateway::new("http://127.0.0.1:8000/api", Duration::from_secs(5)).unwrap();

        let url = gateway.endpoint(&["datasets", "ds 1/x"]).unwrap();

        assert_eq!(url.as_str(), "http://127.0.0.1:8000/api/datasets/ds%201%2Fx");
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let gateway = HttpGateway::new("http://localhost/api/", Duration::from_secs(5)).unwrap();

        let url = gateway.endpoint(&["ask"]).unwrap();

        assert_eq!(url.as_str(), "http://localhost/api/ask");
    }

    #[test]
    fn rejects_unusable_base() {
        assert!(matches!(
            HttpGateway::new("mailto:someone@example.com", Duration::from_secs(5)),
            Err(PilotError::Config { .. })
        ));
        assert!(matches!(
            HttpGateway::new("not a url", Duration::from_secs(5)),
            Err(PilotError::Config { .. })
        ));
    }

    #[test]
    fn detail_is_taken_verbatim() {
        assert_eq!(
            detail_message(r#"{"detail": "Only CSV or Excel supported"}"#).as_deref(),
            Some("Only CSV or Excel supported")
        );
        assert_eq!(
            detail_message(r#"{"detail": [{"loc": ["body"], "msg": "field required"}]}"#)
                .as_deref(),
            Some(r#"[{"loc":["body"],"msg":"field required"}]"#)
        );
        assert_eq!(detail_message("<html>502</html>"), None);
        assert_eq!(detail_message(r#"{"error": "x"}"#), None);
    }
}
