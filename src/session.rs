//! Session aggregate
//!
//! [`SessionState`] is owned by a single root and is the only place session
//! data is mutated. Every operation that changes what a view would show
//! publishes a fresh [`SessionSnapshot`] on a `watch` channel; views render
//! from snapshots and never write back.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::backend::Backend;
use crate::config::IngestConfig;
use crate::error::Result;
use crate::ingest::{
    IngestOutcome, IngestState, PendingIngest, VideoAddedListener, VideoIngestController,
};
use crate::model::{ChatMessage, LogEntry, RequestId, SegmentView, Video};
use crate::playback::{MediaHandle, PlaybackSynchronizer};
use crate::query::{PendingQuery, QueryOutcome, QuerySubmissionController};

/// Read-only view of the ingest dialog
#[derive(Debug, Clone, PartialEq)]
pub struct IngestView {
    pub open: bool,
    pub url: String,
    pub state: IngestState,
    /// Submissions made so far; tells apart repeated identical states
    pub attempt: u64,
}

/// Immutable copy of the session published after every change
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub active_video: Option<Video>,
    pub current_query: String,
    pub log: Vec<LogEntry>,
    pub ingest: IngestView,
    pub media_bound: bool,
}

impl SessionSnapshot {
    fn empty() -> Self {
        Self {
            active_video: None,
            current_query: String::new(),
            log: Vec::new(),
            ingest: IngestView {
                open: false,
                url: String::new(),
                state: IngestState::Idle,
                attempt: 0,
            },
            media_bound: false,
        }
    }
}

pub struct SessionState {
    active_video: Option<Video>,
    current_query: String,
    log: Vec<LogEntry>,
    /// Newest request whose answer has been applied, per video title
    latest_answered: HashMap<String, RequestId>,
    queries: QuerySubmissionController,
    ingest: VideoIngestController,
    playback: PlaybackSynchronizer,
    video_added: Option<Arc<dyn VideoAddedListener>>,
    updates: watch::Sender<SessionSnapshot>,
}

impl SessionState {
    pub fn new(backend: Arc<dyn Backend>, config: &IngestConfig) -> Self {
        let (updates, _) = watch::channel(SessionSnapshot::empty());
        Self {
            active_video: None,
            current_query: String::new(),
            log: Vec::new(),
            latest_answered: HashMap::new(),
            queries: QuerySubmissionController::new(Arc::clone(&backend)),
            ingest: VideoIngestController::new(
                backend,
                Duration::from_millis(config.auto_dismiss_ms),
            ),
            playback: PlaybackSynchronizer::new(),
            video_added: None,
            updates,
        }
    }

    /// Register the collaborator told about successfully ingested videos
    pub fn with_video_added_listener(mut self, listener: Arc<dyn VideoAddedListener>) -> Self {
        self.video_added = Some(listener);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            active_video: self.active_video.clone(),
            current_query: self.current_query.clone(),
            log: self.log.clone(),
            ingest: IngestView {
                open: self.ingest.is_open(),
                url: self.ingest.url().to_string(),
                state: self.ingest.state().clone(),
                attempt: self.ingest.attempt(),
            },
            media_bound: self.playback.is_bound(),
        }
    }

    fn publish(&self) {
        self.updates.send_replace(self.snapshot());
    }

    pub fn active_video(&self) -> Option<&Video> {
        self.active_video.as_ref()
    }

    pub fn current_query(&self) -> &str {
        &self.current_query
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn ingest(&self) -> &VideoIngestController {
        &self.ingest
    }

    /// Make `video` the target of subsequent questions
    pub fn select_video(&mut self, video: Video) {
        info!("Selected video \"{}\"", video.title);
        self.active_video = Some(video);
        self.publish();
    }

    /// Bind or unbind the player's media element
    pub fn set_media_ref(&mut self, media: Option<&MediaHandle>) {
        self.playback.bind(media);
        self.publish();
    }

    fn append(&mut self, request: RequestId, message: ChatMessage, superseded: bool) {
        self.log.push(LogEntry {
            request,
            message,
            recorded_at: Utc::now(),
            superseded,
        });
    }

    /// First phase of an ask: append the user turn and hand back the
    /// request still to be resolved. Returns None for blank queries or
    /// when no video is selected; the log is left untouched then.
    pub fn submit_query(&mut self, text: &str) -> Option<PendingQuery> {
        let pending = match self.queries.submit(text, self.active_video.as_ref()) {
            Ok(pending) => pending,
            Err(e) => {
                debug!("Query not submitted: {}", e);
                return None;
            }
        };

        self.current_query = pending.question().to_string();
        self.append(pending.request(), pending.user_turn(), false);
        self.publish();
        Some(pending)
    }

    /// Second phase of an ask: append the assistant or error turn.
    ///
    /// Outcomes are applied in arrival order. An answer older than one
    /// already applied for the same video is still appended, but flagged as
    /// superseded.
    pub fn apply_answer(&mut self, outcome: QueryOutcome) {
        let latest = self.latest_answered.get(&outcome.video_title).copied();
        let superseded = latest.map_or(false, |latest| latest > outcome.request);

        if superseded {
            debug!(
                "Answer {} arrived after newer answer {:?} for \"{}\"",
                outcome.request, latest, outcome.video_title
            );
        } else {
            self.latest_answered
                .insert(outcome.video_title.clone(), outcome.request);
        }

        self.append(outcome.request, outcome.message, superseded);
        self.publish();
    }

    /// Run both phases of an ask back to back. Returns false if the query
    /// was rejected before reaching the backend.
    pub async fn ask(&mut self, text: &str) -> bool {
        match self.submit_query(text) {
            Some(pending) => {
                let outcome = pending.resolve().await;
                self.apply_answer(outcome);
                true
            }
            None => false,
        }
    }

    /// Jump playback to a segment from a previous answer
    pub fn play_segment(&self, segment: &SegmentView) -> bool {
        self.seek_to(segment.start_time)
    }

    pub fn seek_to(&self, start_time: f64) -> bool {
        self.playback.seek_to(start_time)
    }

    pub fn open_ingest(&mut self) {
        self.ingest.open();
        self.publish();
    }

    pub fn close_ingest(&mut self) {
        self.ingest.close();
        self.publish();
    }

    pub fn edit_ingest_url(&mut self, url: &str) -> bool {
        let accepted = self.ingest.edit_url(url);
        self.publish();
        accepted
    }

    pub fn submit_ingest(&mut self) -> Result<PendingIngest> {
        let pending = self.ingest.submit()?;
        self.publish();
        Ok(pending)
    }

    /// Apply a finished ingest. On success the listener is notified from its
    /// own task; the session never waits on it.
    pub fn settle_ingest(&mut self, outcome: IngestOutcome) -> Option<String> {
        let title = self.ingest.settle(outcome);
        self.publish();

        if let (Some(title), Some(listener)) = (&title, &self.video_added) {
            let listener = Arc::clone(listener);
            let title = title.clone();
            tokio::spawn(async move {
                listener.on_video_added(&title).await;
            });
        }
        title
    }

    /// Fill the URL field, submit it and wait for the result
    pub async fn ingest_url(&mut self, url: &str) -> Result<Option<String>> {
        self.edit_ingest_url(url);
        let pending = self.submit_ingest()?;
        let outcome = pending.resolve().await;
        Ok(self.settle_ingest(outcome))
    }

    pub fn dismissal_deadline(&self) -> Option<Instant> {
        self.ingest.dismiss_deadline()
    }

    /// Close the ingest dialog if its auto-dismiss is due
    pub fn fire_due_dismissal(&mut self, now: Instant) -> bool {
        let fired = self.ingest.fire_due_dismissal(now);
        if fired {
            self.publish();
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{sample_answer, MockBackend};
    use crate::backend::ProcessVideoResponse;
    use crate::error::ClientError;
    use crate::model::ANSWER_ERROR_MESSAGE;
    use crate::playback::tests::{MediaCall, RecordingMedia};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session() -> (Arc<MockBackend>, SessionState) {
        let backend = Arc::new(MockBackend::new());
        let session = SessionState::new(backend.clone(), &IngestConfig { auto_dismiss_ms: 2000 });
        (backend, session)
    }

    #[derive(Default)]
    struct CountingListener {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl VideoAddedListener for CountingListener {
        async fn on_video_added(&self, _title: &str) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Never finishes handling the notification
    struct StalledListener;

    #[async_trait::async_trait]
    impl VideoAddedListener for StalledListener {
        async fn on_video_added(&self, _title: &str) {
            std::future::pending::<()>().await;
        }
    }

    async fn wait_for_calls(listener: &CountingListener, expected: usize) {
        let waiting = async {
            while listener.calls.load(Ordering::SeqCst) < expected {
                tokio::task::yield_now().await;
            }
        };
        tokio::time::timeout(Duration::from_secs(5), waiting)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ask_appends_user_then_assistant() {
        let (backend, mut session) = session();
        backend.push_answer(Ok(sample_answer()));
        session.select_video(Video::new("armbar", "/armbar.mp4"));

        assert!(session.ask("what is it about?").await);

        let log = session.log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].message, ChatMessage::user("what is it about?"));
        assert!(matches!(log[1].message, ChatMessage::Assistant { .. }));
        assert_eq!(log[0].request, log[1].request);
        assert_eq!(session.current_query(), "what is it about?");
    }

    #[tokio::test]
    async fn test_failed_ask_appends_error_turn() {
        let (_, mut session) = session();
        session.select_video(Video::new("armbar", "/armbar.mp4"));

        assert!(session.ask("anyone there?").await);

        let log = session.log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].message.content(), ANSWER_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_blank_query_leaves_log_unchanged() {
        let (backend, mut session) = session();
        session.select_video(Video::new("armbar", "/armbar.mp4"));

        assert!(!session.ask("   ").await);
        assert!(session.log().is_empty());
        assert!(backend.asked.lock().unwrap().is_empty());
    }

    #[test]
    fn test_user_turn_is_visible_before_answer() {
        let (_, mut session) = session();
        session.select_video(Video::new("armbar", "/armbar.mp4"));
        let updates = session.subscribe();

        let pending = session.submit_query("where is the sweep?").unwrap();

        let snapshot = updates.borrow().clone();
        assert_eq!(snapshot.log.len(), 1);
        assert_eq!(snapshot.log[0].request, pending.request());
        assert_eq!(snapshot.current_query, "where is the sweep?");
    }

    #[tokio::test]
    async fn test_out_of_order_answer_is_superseded() {
        let (backend, mut session) = session();
        session.select_video(Video::new("armbar", "/armbar.mp4"));
        backend.push_answer(Ok(sample_answer()));
        backend.push_answer(Ok(sample_answer()));

        let first = session.submit_query("first").unwrap();
        let second = session.submit_query("second").unwrap();

        let second_outcome = second.resolve().await;
        let first_outcome = first.resolve().await;
        session.apply_answer(second_outcome);
        session.apply_answer(first_outcome);

        let log = session.log();
        assert_eq!(log.len(), 4);
        assert!(!log[2].superseded);
        assert!(log[3].superseded);
        assert!(log[3].request < log[2].request);
    }

    #[tokio::test]
    async fn test_answers_for_other_videos_are_not_superseded() {
        let (backend, mut session) = session();
        backend.push_answer(Ok(sample_answer()));
        backend.push_answer(Ok(sample_answer()));

        session.select_video(Video::new("armbar", "/armbar.mp4"));
        let first = session.submit_query("first").unwrap();
        session.select_video(Video::new("triangle", "/triangle.mp4"));
        let second = session.submit_query("second").unwrap();

        let second_outcome = second.resolve().await;
        let first_outcome = first.resolve().await;
        assert_eq!(first_outcome.video_title, "armbar");

        session.apply_answer(second_outcome);
        session.apply_answer(first_outcome);
        assert!(session.log().iter().all(|entry| !entry.superseded));
    }

    #[tokio::test]
    async fn test_segment_play_seeks_bound_media() {
        let (backend, mut session) = session();
        backend.push_answer(Ok(sample_answer()));
        session.select_video(Video::new("armbar", "/armbar.mp4"));
        session.ask("what is it about?").await;

        let media = Arc::new(RecordingMedia::default());
        let handle: MediaHandle = media.clone();
        session.set_media_ref(Some(&handle));
        assert!(session.snapshot().media_bound);

        let segment = session.log()[1].message.segments()[0].clone();
        assert!(session.play_segment(&segment));
        assert_eq!(media.calls(), vec![MediaCall::Seek(1.0), MediaCall::Play]);
    }

    #[test]
    fn test_seek_without_media_changes_nothing() {
        let (_, session) = session();
        let before = session.snapshot();
        assert!(!session.seek_to(10.0));
        assert_eq!(session.snapshot(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ingest_success_notifies_listener_once() {
        let backend = Arc::new(MockBackend::new());
        let listener = Arc::new(CountingListener::default());
        let mut session = SessionState::new(backend.clone(), &IngestConfig { auto_dismiss_ms: 2000 })
            .with_video_added_listener(listener.clone());
        backend.push_ingest(Ok(ProcessVideoResponse {
            video_title: "armbar".to_string(),
        }));

        session.open_ingest();
        let title = session.ingest_url("https://www.youtube.com/watch?v=abc").await.unwrap();
        assert_eq!(title.as_deref(), Some("armbar"));
        wait_for_calls(&listener, 1).await;

        let deadline = session.dismissal_deadline().unwrap();
        crate::ingest::sleep_until_deadline(Some(deadline)).await;
        assert!(session.fire_due_dismissal(Instant::now()));
        assert!(!session.snapshot().ingest.open);
        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_listener_does_not_block_session() {
        let backend = Arc::new(MockBackend::new());
        let mut session = SessionState::new(backend.clone(), &IngestConfig { auto_dismiss_ms: 2000 })
            .with_video_added_listener(Arc::new(StalledListener));
        backend.push_ingest(Ok(ProcessVideoResponse {
            video_title: "armbar".to_string(),
        }));
        backend.push_answer(Ok(sample_answer()));
        session.select_video(Video::new("armbar", "/armbar.mp4"));

        session.open_ingest();
        session.edit_ingest_url("https://www.youtube.com/watch?v=abc");
        let ingest = session.submit_ingest().unwrap();
        let query = session.submit_query("what happens next?").unwrap();

        let settled = ingest.resolve().await;
        assert_eq!(session.settle_ingest(settled).as_deref(), Some("armbar"));

        session.apply_answer(query.resolve().await);
        assert_eq!(session.log().len(), 2);
        assert!(matches!(session.log()[1].message, ChatMessage::Assistant { .. }));

        let deadline = session.dismissal_deadline().unwrap();
        tokio::time::timeout(
            Duration::from_secs(5),
            crate::ingest::sleep_until_deadline(Some(deadline)),
        )
        .await
        .unwrap();
        assert!(session.fire_due_dismissal(Instant::now()));
        assert!(!session.snapshot().ingest.open);
    }

    #[tokio::test]
    async fn test_ingest_failure_keeps_dialog_open() {
        let (backend, mut session) = session();
        backend.push_ingest(Err(ClientError::Backend {
            status: 400,
            message: Some("invalid url".to_string()),
        }));

        session.open_ingest();
        let title = session.ingest_url("https://example.com/bad").await.unwrap();
        assert!(title.is_none());

        let view = session.snapshot().ingest;
        assert!(view.open);
        assert_eq!(view.url, "https://example.com/bad");
        assert_eq!(
            view.state,
            IngestState::Error {
                message: "invalid url".to_string()
            }
        );
    }
}
