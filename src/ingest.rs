//! Video ingest dialog
//!
//! State machine for submitting a video URL to the backend:
//!
//! ```text
//! Idle --submit--> Loading --2xx--------------> Success(title) --auto-dismiss--> Idle
//!                          --non-2xx----------> Error(message)  --edit/submit--> ...
//!                          --transport error--> Error("Error connecting to server")
//! ```
//!
//! A successful ingest schedules the dialog to close itself after the
//! configured delay. The deadline is cancelled when the dialog is closed or a
//! new submission starts.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::error::{ClientError, Result};

/// Shown when the backend rejects a URL without saying why
pub const INGEST_FALLBACK_ERROR: &str = "Failed to process video";

/// Shown when the backend could not be reached
pub const INGEST_CONNECT_ERROR: &str = "Error connecting to server";

/// Notified after a video has been ingested so listings can refresh
#[async_trait]
pub trait VideoAddedListener: Send + Sync {
    async fn on_video_added(&self, title: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestState {
    Idle,
    Loading,
    Success { title: String },
    Error { message: String },
}

impl IngestState {
    pub fn is_loading(&self) -> bool {
        matches!(self, IngestState::Loading)
    }

    /// Status line the dialog shows under the URL field
    pub fn status_message(&self) -> Option<String> {
        match self {
            IngestState::Success { title } => {
                Some(format!("Video \"{}\" processed successfully!", title))
            }
            IngestState::Error { message } => Some(message.clone()),
            IngestState::Idle | IngestState::Loading => None,
        }
    }
}

/// How an ingest request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestResult {
    Processed { title: String },
    Rejected { message: String },
    Unreachable,
}

impl IngestResult {
    fn from_backend(result: Result<String>) -> Self {
        match result {
            Ok(title) => IngestResult::Processed { title },
            Err(ClientError::Backend { message, .. }) => IngestResult::Rejected {
                message: message.unwrap_or_else(|| INGEST_FALLBACK_ERROR.to_string()),
            },
            Err(ClientError::InvalidResponse(_)) => IngestResult::Rejected {
                message: INGEST_FALLBACK_ERROR.to_string(),
            },
            Err(_) => IngestResult::Unreachable,
        }
    }
}

/// Result of one ingest attempt, tagged with the attempt it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub attempt: u64,
    pub result: IngestResult,
}

/// An in-flight `process-video` call
pub struct PendingIngest {
    attempt: u64,
    url: String,
    backend: Arc<dyn Backend>,
}

impl fmt::Debug for PendingIngest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingIngest")
            .field("attempt", &self.attempt)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl PendingIngest {
    pub async fn resolve(self) -> IngestOutcome {
        let result = self
            .backend
            .process_video(&self.url)
            .await
            .map(|response| response.video_title);

        if let Err(e) = &result {
            warn!("Ingest of {} failed: {}", self.url, e);
        }

        IngestOutcome {
            attempt: self.attempt,
            result: IngestResult::from_backend(result),
        }
    }
}

/// Drives the ingest dialog: URL field, submission state and auto-dismiss
pub struct VideoIngestController {
    backend: Arc<dyn Backend>,
    auto_dismiss: Duration,
    open: bool,
    url: String,
    state: IngestState,
    attempt: u64,
    dismiss_at: Option<Instant>,
}

impl VideoIngestController {
    pub fn new(backend: Arc<dyn Backend>, auto_dismiss: Duration) -> Self {
        Self {
            backend,
            auto_dismiss,
            open: false,
            url: String::new(),
            state: IngestState::Idle,
            attempt: 0,
            dismiss_at: None,
        }
    }

    pub fn state(&self) -> &IngestState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    /// Close the dialog, cancelling any scheduled auto-dismiss
    pub fn close(&mut self) {
        self.open = false;
        self.dismiss_at = None;
        if matches!(self.state, IngestState::Success { .. }) {
            self.state = IngestState::Idle;
        }
    }

    /// Replace the URL field. Editing clears a displayed error; edits are
    /// ignored while a submission is in flight.
    pub fn edit_url(&mut self, url: impl Into<String>) -> bool {
        if self.state.is_loading() {
            return false;
        }
        self.url = url.into();
        if matches!(self.state, IngestState::Error { .. }) {
            self.state = IngestState::Idle;
        }
        true
    }

    /// Submit the current URL field
    pub fn submit(&mut self) -> Result<PendingIngest> {
        if self.state.is_loading() {
            return Err(ClientError::IngestInFlight);
        }

        let url = self.url.trim();
        if url.is_empty() {
            return Err(ClientError::Validation("video URL is required".to_string()));
        }
        let url = url.to_string();

        self.open = true;
        self.dismiss_at = None;
        self.state = IngestState::Loading;
        self.attempt += 1;

        debug!("Ingest attempt {} started for {}", self.attempt, url);

        Ok(PendingIngest {
            attempt: self.attempt,
            url,
            backend: Arc::clone(&self.backend),
        })
    }

    /// Apply a finished ingest. Returns the new video's title on success.
    pub fn settle(&mut self, outcome: IngestOutcome) -> Option<String> {
        if outcome.attempt != self.attempt || !self.state.is_loading() {
            warn!("Ignoring outcome of stale ingest attempt {}", outcome.attempt);
            return None;
        }

        match outcome.result {
            IngestResult::Processed { title } => {
                info!("Video \"{}\" processed successfully", title);
                self.url.clear();
                self.state = IngestState::Success {
                    title: title.clone(),
                };
                self.dismiss_at = Some(Instant::now() + self.auto_dismiss);
                Some(title)
            }
            IngestResult::Rejected { message } => {
                self.state = IngestState::Error { message };
                None
            }
            IngestResult::Unreachable => {
                self.state = IngestState::Error {
                    message: INGEST_CONNECT_ERROR.to_string(),
                };
                None
            }
        }
    }

    /// When the pending auto-dismiss fires, if one is scheduled
    pub fn dismiss_deadline(&self) -> Option<Instant> {
        self.dismiss_at
    }

    /// Run the auto-dismiss if its deadline has passed
    pub fn fire_due_dismissal(&mut self, now: Instant) -> bool {
        match self.dismiss_at {
            Some(deadline) if deadline <= now => {
                debug!("Auto-dismissing ingest dialog");
                self.dismiss_at = None;
                self.open = false;
                self.state = IngestState::Idle;
                true
            }
            _ => false,
        }
    }
}

/// Sleep until `deadline`, or forever when there is none
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
