use std::time::Duration;

use dagview_core::{JobStatus, RemoteJob};
use futures_util::StreamExt;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusQueryError {
    #[error("invalid status url: {0}")]
    InvalidUrl(String),
    #[error("status query timed out")]
    Timeout,
    #[error("status query returned http {0}")]
    HttpStatus(u16),
    #[error("status response larger than {max_bytes} bytes")]
    TooLarge { max_bytes: u64 },
    #[error("unreadable status body: {0}")]
    InvalidBody(String),
    #[error("network error: {0}")]
    Network(String),
}

/// Queries the current status of a remote job.
#[async_trait::async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn fetch_status(&self, job: &RemoteJob) -> Result<JobStatus, StatusQueryError>;
}

#[derive(Debug, Clone)]
pub struct StatusSourceSettings {
    /// Scheme and host of the API, e.g. `http://localhost:8080`.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for StatusSourceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(15),
            max_bytes: 1024 * 1024,
        }
    }
}

#[derive(Deserialize)]
struct DagRunBody {
    state: Option<String>,
}

/// [`JobStatusSource`] reading the `state` field of the DAG run endpoint.
#[derive(Debug, Clone)]
pub struct HttpStatusSource {
    settings: StatusSourceSettings,
    base: Url,
    client: reqwest::Client,
}

impl HttpStatusSource {
    pub fn new(settings: StatusSourceSettings) -> Result<Self, StatusQueryError> {
        let base = Url::parse(&settings.base_url)
            .map_err(|err| StatusQueryError::InvalidUrl(err.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| StatusQueryError::Network(err.to_string()))?;
        Ok(Self {
            settings,
            base,
            client,
        })
    }

    pub fn status_url(&self, job: &RemoteJob) -> Result<Url, StatusQueryError> {
        self.base
            .join(&job.status_path())
            .map_err(|err| StatusQueryError::InvalidUrl(err.to_string()))
    }
}

#[async_trait::async_trait]
impl JobStatusSource for HttpStatusSource {
    async fn fetch_status(&self, job: &RemoteJob) -> Result<JobStatus, StatusQueryError> {
        let url = self.status_url(job)?;
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(StatusQueryError::HttpStatus(status.as_u16()));
        }

        let max_bytes = self.settings.max_bytes;
        if response.content_length().is_some_and(|len| len > max_bytes) {
            return Err(StatusQueryError::TooLarge { max_bytes });
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            if body.len() as u64 + chunk.len() as u64 > max_bytes {
                return Err(StatusQueryError::TooLarge { max_bytes });
            }
            body.extend_from_slice(&chunk);
        }

        let parsed: DagRunBody = serde_json::from_slice(&body)
            .map_err(|err| StatusQueryError::InvalidBody(err.to_string()))?;
        Ok(parsed
            .state
            .as_deref()
            .map_or(JobStatus::Unknown, JobStatus::from_state))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> StatusQueryError {
    if err.is_timeout() {
        return StatusQueryError::Timeout;
    }
    StatusQueryError::Network(err.to_string())
}
