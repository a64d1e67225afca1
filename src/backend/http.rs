use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{
    AskRequest, AskResponse, Backend, ErrorBody, ProcessVideoRequest, ProcessVideoResponse,
    VideoListing,
};
use crate::config::BackendConfig;
use crate::error::{ClientError, Result};

/// JSON-over-HTTP backend implementation
pub struct HttpBackend {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let mut base_url = Url::parse(&config.base_url).map_err(|e| {
            ClientError::Config(format!("invalid backend url {}: {}", config.base_url, e))
        })?;

        // Url::join replaces the last path segment unless the base ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds));
        if let Some(seconds) = config.request_timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self { base_url, client })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Config(format!("invalid endpoint {}: {}", path, e)))
    }

    /// Turn a response into `T`, or into a `Backend` error for non-2xx statuses
    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(Self::backend_error(status, &body));
        }

        Ok(serde_json::from_slice(&body)?)
    }

    fn backend_error(status: StatusCode, body: &[u8]) -> ClientError {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.is_empty());

        warn!(
            "Backend returned {}: {}",
            status,
            message.as_deref().unwrap_or("<no error message>")
        );

        ClientError::Backend {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn ask(&self, question: &str, video_title: &str) -> Result<AskResponse> {
        let url = self.endpoint("ask")?;
        let request = AskRequest {
            question: question.to_string(),
            video_title: video_title.to_string(),
        };

        debug!("Asking {} about '{}'", url, video_title);

        let response = self.client.post(url).json(&request).send().await?;
        let answer: AskResponse = Self::read_json(response).await?;
        answer.validate()?;

        debug!("Received answer with {} segments", answer.segments.len());
        Ok(answer)
    }

    async fn process_video(&self, url: &str) -> Result<ProcessVideoResponse> {
        let endpoint = self.endpoint("process-video")?;
        let request = ProcessVideoRequest {
            url: url.to_string(),
        };

        debug!("Submitting {} for processing", url);

        let response = self.client.post(endpoint).json(&request).send().await?;
        Self::read_json(response).await
    }

    async fn list_videos(&self) -> Result<Vec<VideoListing>> {
        let url = self.endpoint("videos")?;

        debug!("Fetching video list from {}", url);

        let response = self.client.get(url).send().await?;
        Self::read_json(response).await
    }
}
