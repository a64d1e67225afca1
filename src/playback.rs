//! Seek-and-play against a media element the session does not own.

use std::sync::{Arc, Weak};
use tracing::debug;

/// A media element owned by the video player collaborator
pub trait MediaElement: Send + Sync {
    /// Move the playback position, in seconds
    fn set_current_time(&self, seconds: f64);

    /// Resume playback from the current position
    fn play(&self);
}

/// Strong handle held by whoever owns the media element
pub type MediaHandle = Arc<dyn MediaElement>;

/// Borrows the player's media element for one-shot seek commands
#[derive(Debug, Clone, Default)]
pub struct PlaybackSynchronizer {
    media: Option<Weak<dyn MediaElement>>,
}

impl PlaybackSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind or unbind the media element; replaces any previous binding
    pub fn bind(&mut self, media: Option<&MediaHandle>) {
        self.media = media.map(Arc::downgrade);
    }

    /// Whether a media element is bound and still alive
    pub fn is_bound(&self) -> bool {
        self.live().is_some()
    }

    fn live(&self) -> Option<MediaHandle> {
        self.media.as_ref().and_then(Weak::upgrade)
    }

    /// Seek to `start_time` and resume playback. Returns false, without
    /// doing anything, when no live media element is bound.
    pub fn seek_to(&self, start_time: f64) -> bool {
        match self.live() {
            Some(media) => {
                debug!("Seeking media to {:.2}s", start_time);
                media.set_current_time(start_time);
                media.play();
                true
            }
            None => {
                debug!("Ignoring seek to {:.2}s: no media bound", start_time);
                false
            }
        }
    }
}
