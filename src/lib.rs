//! Video Q&A Session Client
//!
//! Session orchestration for asking questions about a video and jumping
//! playback to the segments an answer cites. The question-answering backend
//! is reached over HTTP; rendering is left to whoever subscribes to the
//! session's snapshots.

pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod playback;
pub mod query;
pub mod session;
pub mod terminal;

// Re-export main types for easy access
pub use crate::backend::{create_backend, Backend};
pub use crate::catalog::VideoCatalog;
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{ClientError, Result};
pub use crate::ingest::{IngestState, VideoAddedListener, VideoIngestController};
pub use crate::model::{ChatMessage, LogEntry, Segment, SegmentView, Video};
pub use crate::playback::{MediaElement, MediaHandle, PlaybackSynchronizer};
pub use crate::query::{PendingQuery, QueryOutcome, QuerySubmissionController};
pub use crate::session::{SessionSnapshot, SessionState};
