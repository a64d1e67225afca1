//! Video catalog backing the recommendation list
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::backend::{Backend, VideoListing};
use crate::error::Result;
use crate::ingest::VideoAddedListener;
use crate::model::Video;

/// Cached copy of the backend's video listing
pub struct VideoCatalog {
    backend: Arc<dyn Backend>,
    listings: RwLock<Vec<VideoListing>>,
}

impl VideoCatalog {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            listings: RwLock::new(Vec::new()),
        }
    }

    /// Re-fetch the listing; returns the number of videos now known
    pub async fn refresh(&self) -> Result<usize> {
        let listings = self.backend.list_videos().await?;
        let count = listings.len();
        *self.listings.write().await = listings;
        info!("Video catalog refreshed: {} videos", count);
        Ok(count)
    }

    pub async fn listings(&self) -> Vec<VideoListing> {
        self.listings.read().await.clone()
    }

    pub async fn videos(&self) -> Vec<Video> {
        self.listings
            .read()
            .await
            .iter()
            .map(VideoListing::to_video)
            .collect()
    }

    /// Look a video up by exact title or by 1-based position in the list
    pub async fn find(&self, key: &str) -> Option<Video> {
        let listings = self.listings.read().await;
        let key = key.trim();

        if let Some(listing) = listings.iter().find(|l| l.title == key) {
            return Some(listing.to_video());
        }

        key.parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| listings.get(i))
            .map(VideoListing::to_video)
    }
}

#[async_trait]
impl VideoAddedListener for VideoCatalog {
    async fn on_video_added(&self, title: &str) {
        info!("Refreshing catalog after \"{}\" was added", title);
        if let Err(e) = self.refresh().await {
            warn!("Failed to refresh video catalog: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{listing, MockBackend};

    #[tokio::test]
    async fn test_refresh_and_find() {
        let backend = Arc::new(MockBackend::new());
        backend.set_videos(vec![listing("armbar"), listing("triangle")]);
        let catalog = VideoCatalog::new(backend.clone());

        assert!(catalog.find("armbar").await.is_none());
        assert_eq!(catalog.refresh().await.unwrap(), 2);

        assert_eq!(
            catalog.find("triangle").await,
            Some(Video::new("triangle", "/triangle.mp4"))
        );
        assert_eq!(catalog.find("1").await.map(|v| v.title), Some("armbar".to_string()));
        assert!(catalog.find("0").await.is_none());
        assert!(catalog.find("3").await.is_none());
        assert!(catalog.find("kimura").await.is_none());
    }

    #[tokio::test]
    async fn test_video_added_triggers_refresh() {
        let backend = Arc::new(MockBackend::new());
        let catalog = VideoCatalog::new(backend.clone());

        backend.set_videos(vec![listing("armbar")]);
        catalog.on_video_added("armbar").await;

        assert_eq!(backend.list_count(), 1);
        assert_eq!(catalog.videos().await.len(), 1);
    }
}
