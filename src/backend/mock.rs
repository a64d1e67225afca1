//! In-memory backend for controller and session tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{AskResponse, Backend, ProcessVideoResponse, VideoListing};
use crate::error::{ClientError, Result};
use crate::model::Segment;

#[derive(Default)]
pub struct MockBackend {
    ask_results: Mutex<VecDeque<Result<AskResponse>>>,
    ingest_results: Mutex<VecDeque<Result<ProcessVideoResponse>>>,
    videos: Mutex<Vec<VideoListing>>,
    pub asked: Mutex<Vec<(String, String)>>,
    pub ingested: Mutex<Vec<String>>,
    pub list_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_answer(&self, result: Result<AskResponse>) {
        self.ask_results.lock().unwrap().push_back(result);
    }

    pub fn push_ingest(&self, result: Result<ProcessVideoResponse>) {
        self.ingest_results.lock().unwrap().push_back(result);
    }

    pub fn set_videos(&self, videos: Vec<VideoListing>) {
        *self.videos.lock().unwrap() = videos;
    }

    pub fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

/// The answer used throughout the tests: one Spanish segment, English question
pub fn sample_answer() -> AskResponse {
    AskResponse {
        answer_translated: "It's about X".to_string(),
        answer_original: "Es sobre X".to_string(),
        question_language: "en".to_string(),
        video_language: "es".to_string(),
        segments: vec![Segment {
            start: 1.0,
            end: 3.5,
            text: "intro".to_string(),
            speaker: "S1".to_string(),
        }],
    }
}

pub fn listing(title: &str) -> VideoListing {
    VideoListing {
        title: title.to_string(),
        file: format!("/{}.mp4", title),
        thumbnail: Some(format!("/{}.mp4", title)),
        duration: Some(String::new()),
        description: Some("Uploaded video".to_string()),
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn ask(&self, question: &str, video_title: &str) -> Result<AskResponse> {
        self.asked
            .lock()
            .unwrap()
            .push((question.to_string(), video_title.to_string()));
        self.ask_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Network("no scripted answer".to_string())))
    }

    async fn process_video(&self, url: &str) -> Result<ProcessVideoResponse> {
        self.ingested.lock().unwrap().push(url.to_string());
        self.ingest_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Network("no scripted ingest".to_string())))
    }

    async fn list_videos(&self) -> Result<Vec<VideoListing>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.videos.lock().unwrap().clone())
    }
}
