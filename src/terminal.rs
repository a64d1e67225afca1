//! Terminal front-end pieces used by the `vidqa` binary
//!
//! Line commands, URL field validation, a media element that stands in for
//! a video player, and a renderer that prints what changed between two
//! session snapshots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use url::Url;

use crate::ingest::IngestState;
use crate::model::{ChatMessage, LogEntry, Video};
use crate::playback::MediaElement;
use crate::session::SessionSnapshot;

/// One line of user input
#[derive(Debug, Clone, PartialEq)]
pub enum InputCommand {
    Ask(String),
    Videos,
    Select(String),
    Add(String),
    Play { turn: usize, segment: usize },
    Log,
    Help,
    Quit,
    Invalid(String),
}

pub const HELP: &str = "\
Commands:
  :videos                  list videos the backend knows about
  :select <title|#>        choose the video to ask about
  :add <url>               ingest a new video from a URL
  :play <turn#> <seg#>     jump playback to a segment of an answer
  :log                     print the whole chat log
  :quit                    exit
Anything else is sent as a question about the selected video.";

/// Parse a line of input; blank lines yield None
pub fn parse_line(line: &str) -> Option<InputCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Some(command) = line.strip_prefix(':') else {
        return Some(InputCommand::Ask(line.to_string()));
    };

    let mut parts = command.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let rest = parts.next().map(str::trim).unwrap_or_default();

    let parsed = match name {
        "videos" | "v" => InputCommand::Videos,
        "select" | "s" if !rest.is_empty() => InputCommand::Select(rest.to_string()),
        "add" | "a" if !rest.is_empty() => InputCommand::Add(rest.to_string()),
        "play" | "p" => parse_play(rest).unwrap_or_else(|| {
            InputCommand::Invalid("usage: :play <turn#> <segment#>".to_string())
        }),
        "log" | "l" => InputCommand::Log,
        "help" | "h" | "?" => InputCommand::Help,
        "quit" | "q" | "exit" => InputCommand::Quit,
        "select" | "s" => InputCommand::Invalid("usage: :select <title|#>".to_string()),
        "add" | "a" => InputCommand::Invalid("usage: :add <url>".to_string()),
        other => InputCommand::Invalid(format!("unknown command :{}", other)),
    };
    Some(parsed)
}

fn parse_play(args: &str) -> Option<InputCommand> {
    let mut numbers = args.split_whitespace().map(str::parse::<usize>);
    let turn = numbers.next()?.ok()?;
    let segment = numbers.next()?.ok()?;
    if numbers.next().is_some() || turn == 0 || segment == 0 {
        return None;
    }
    Some(InputCommand::Play { turn, segment })
}

/// Check that the URL field holds an http(s) URL before it is submitted
pub fn validate_video_url(input: &str) -> std::result::Result<Url, String> {
    let url = Url::parse(input.trim()).map_err(|e| format!("not a valid URL: {}", e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(format!("unsupported URL scheme: {}", scheme)),
    }
}

/// Media element that tracks position and reports seeks on stdout
#[derive(Default)]
pub struct TerminalPlayer {
    video: Mutex<Option<Video>>,
    position: Mutex<f64>,
    playing: AtomicBool,
}

impl TerminalPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a new video, resetting position and pausing
    pub fn load(&self, video: &Video) {
        if let Ok(mut current) = self.video.lock() {
            *current = Some(video.clone());
        }
        if let Ok(mut position) = self.position.lock() {
            *position = 0.0;
        }
        self.playing.store(false, Ordering::SeqCst);
    }

    pub fn position(&self) -> f64 {
        self.position.lock().map(|p| *p).unwrap_or_default()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn title(&self) -> String {
        self.video
            .lock()
            .ok()
            .and_then(|v| v.as_ref().map(|v| v.title.clone()))
            .unwrap_or_else(|| "<no video>".to_string())
    }
}

impl MediaElement for TerminalPlayer {
    fn set_current_time(&self, seconds: f64) {
        if let Ok(mut position) = self.position.lock() {
            *position = seconds;
        }
    }

    fn play(&self) {
        self.playing.store(true, Ordering::SeqCst);
        println!("▶ {} @ {:.2}s", self.title(), self.position());
    }
}

/// Format one chat log entry for the terminal; `turn` is 1-based
pub fn render_entry(turn: usize, entry: &LogEntry) -> String {
    let mut out = String::new();
    let marker = if entry.superseded { " (superseded)" } else { "" };

    match &entry.message {
        ChatMessage::User { content } => {
            out.push_str(&format!("[{}] you: {}", turn, content));
        }
        ChatMessage::Assistant {
            content,
            meta,
            segments,
        } => {
            out.push_str(&format!("[{}] assistant{}: {}", turn, marker, content));
            if let Some(meta) = meta {
                out.push_str(&format!(
                    "\n    question language: {} | video language: {}\n    original answer: {}",
                    meta.question_language, meta.video_language, meta.answer_original
                ));
            }
            for (i, segment) in segments.iter().enumerate() {
                out.push_str(&format!(
                    "\n    {}. [{}] {}: {}",
                    i + 1,
                    segment.time,
                    segment.speaker,
                    segment.text
                ));
            }
        }
        ChatMessage::Error { content } => {
            out.push_str(&format!("[{}] assistant{}: {}", turn, marker, content));
        }
    }
    out
}

/// Prints only what changed since the last snapshot it saw
#[derive(Debug, Default)]
pub struct SnapshotRenderer {
    printed: usize,
    ingest: Option<(u64, IngestState)>,
}

impl SnapshotRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, snapshot: &SessionSnapshot) -> Vec<String> {
        let mut lines: Vec<String> = snapshot
            .log
            .iter()
            .enumerate()
            .skip(self.printed)
            .map(|(i, entry)| render_entry(i + 1, entry))
            .collect();
        self.printed = snapshot.log.len();

        let seen = (snapshot.ingest.attempt, snapshot.ingest.state.clone());
        if self.ingest.as_ref() != Some(&seen) {
            let state = &seen.1;
            match state {
                IngestState::Loading => lines.push("Processing video...".to_string()),
                other => {
                    if let Some(message) = other.status_message() {
                        lines.push(message);
                    }
                }
            }
            self.ingest = Some(seen);
        }

        lines
    }
}
