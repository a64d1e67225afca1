//! Ask/answer cycle
//!
//! Submitting a question is a two-phase protocol. [`QuerySubmissionController::submit`]
//! returns a [`PendingQuery`] whose user turn is appended to the log right
//! away, before any network activity. Awaiting [`PendingQuery::resolve`] later
//! produces the assistant turn (or the error turn) for the same request.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::{AskResponse, Backend};
use crate::error::{ClientError, Result};
use crate::model::{ChatMessage, RequestId, SegmentView, Video};

/// Drives ask cycles against the backend and hands out request ids
pub struct QuerySubmissionController {
    backend: Arc<dyn Backend>,
    next_request: u64,
}

impl QuerySubmissionController {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            next_request: 1,
        }
    }

    /// Start an ask cycle for `query` against `active_video`.
    ///
    /// Rejected with `ClientError::Validation` when the query is blank or no
    /// video is selected; nothing is sent in that case.
    pub fn submit(&mut self, query: &str, active_video: Option<&Video>) -> Result<PendingQuery> {
        let question = query.trim();
        if question.is_empty() {
            return Err(ClientError::Validation("query is empty".to_string()));
        }

        let video = active_video
            .ok_or_else(|| ClientError::Validation("no video selected".to_string()))?;

        let request = RequestId(self.next_request);
        self.next_request += 1;

        debug!("Query {} submitted for '{}'", request, video.title);

        Ok(PendingQuery {
            request,
            question: question.to_string(),
            video_title: video.title.clone(),
            backend: Arc::clone(&self.backend),
        })
    }
}

/// An ask cycle whose user turn exists but whose answer is still outstanding
pub struct PendingQuery {
    request: RequestId,
    question: String,
    video_title: String,
    backend: Arc<dyn Backend>,
}

impl fmt::Debug for PendingQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingQuery")
            .field("request", &self.request)
            .field("question", &self.question)
            .field("video_title", &self.video_title)
            .finish_non_exhaustive()
    }
}

/// Settled result of an ask cycle, ready to be appended to the log
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub request: RequestId,
    pub video_title: String,
    pub message: ChatMessage,
}

impl PendingQuery {
    pub fn request(&self) -> RequestId {
        self.request
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    /// The optimistic user turn for this request
    pub fn user_turn(&self) -> ChatMessage {
        ChatMessage::user(self.question.clone())
    }

    /// Call the backend and turn the reply into the assistant's turn.
    /// Network and backend failures both become the same error turn.
    pub async fn resolve(self) -> QueryOutcome {
        let message = match self.backend.ask(&self.question, &self.video_title).await {
            Ok(answer) => answer_message(answer),
            Err(e) if e.is_backend_failure() => {
                warn!("Backend could not answer query {}: {}", self.request, e);
                ChatMessage::answer_error()
            }
            Err(e) => {
                warn!("Query {} failed: {}", self.request, e);
                ChatMessage::answer_error()
            }
        };

        QueryOutcome {
            request: self.request,
            video_title: self.video_title,
            message,
        }
    }
}

/// Map a backend answer to the assistant turn shown in the log
pub fn answer_message(answer: AskResponse) -> ChatMessage {
    let meta = answer.meta();
    let segments = answer.segments.iter().map(SegmentView::from).collect();

    ChatMessage::Assistant {
        content: answer.answer_translated,
        meta: Some(meta),
        segments,
    }
}
