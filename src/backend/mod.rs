//! Backend inference service collaborator
//!
//! The question-answering service is reached over JSON-over-HTTP. The
//! [`Backend`] trait is the seam the controllers call through, so tests and
//! alternative transports can stand in for [`http::HttpBackend`].

pub mod http;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::BackendConfig;
use crate::error::Result;
use crate::model::{AnswerMeta, Segment, Video};

/// Body of `POST /ask`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
    pub video_title: String,
}

/// Successful answer from `POST /ask`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer_translated: String,
    pub answer_original: String,
    pub question_language: String,
    pub video_language: String,
    pub segments: Vec<Segment>,
}

impl AskResponse {
    /// Reject answers whose segments have impossible bounds
    pub fn validate(&self) -> Result<()> {
        for segment in &self.segments {
            segment.validate()?;
        }
        Ok(())
    }

    pub fn meta(&self) -> AnswerMeta {
        AnswerMeta {
            question_language: self.question_language.clone(),
            video_language: self.video_language.clone(),
            answer_original: self.answer_original.clone(),
        }
    }
}

/// Body of `POST /process-video`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessVideoRequest {
    pub url: String,
}

/// Successful reply from `POST /process-video`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessVideoResponse {
    pub video_title: String,
}

/// Error body the backend sends with non-2xx statuses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// One entry of `GET /videos`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoListing {
    pub title: String,
    pub file: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl VideoListing {
    pub fn to_video(&self) -> Video {
        Video::new(self.title.clone(), self.file.clone())
    }
}

/// Trait for the question-answering backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// Ask a question about an ingested video
    async fn ask(&self, question: &str, video_title: &str) -> Result<AskResponse>;

    /// Download and index a video so it can be asked about
    async fn process_video(&self, url: &str) -> Result<ProcessVideoResponse>;

    /// List the videos the backend can answer questions about
    async fn list_videos(&self) -> Result<Vec<VideoListing>>;
}

/// Create the HTTP backend described by the configuration
pub fn create_backend(config: &BackendConfig) -> Result<Arc<dyn Backend>> {
    Ok(Arc::new(http::HttpBackend::new(config.clone())?))
}
