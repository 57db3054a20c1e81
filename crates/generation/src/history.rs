//! In-memory history of finished generations.
//!
//! The ledger owns the blob handles of its entries: removing an entry
//! releases every locally backed handle it carries, exactly once. Ordering
//! is newest first and the ledger itself is unbounded.

use chrono::{DateTime, Utc};
use media_store::{BlobStore, ResourceHandle};
use serde::Serialize;

/// A finished video generation.
#[derive(Debug, Clone, Serialize)]
pub struct VideoItem {
    pub id: String,
    pub prompt: String,
    pub video: ResourceHandle,
    pub thumbnail: Option<ResourceHandle>,
    pub created_at: DateTime<Utc>,
}

/// A finished image generation.
#[derive(Debug, Clone, Serialize)]
pub struct ImageItem {
    pub id: String,
    pub prompt: String,
    pub image: ResourceHandle,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum HistoryItem {
    Video(VideoItem),
    Image(ImageItem),
}

impl HistoryItem {
    pub fn id(&self) -> &str {
        match self {
            HistoryItem::Video(v) => &v.id,
            HistoryItem::Image(i) => &i.id,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            HistoryItem::Video(v) => &v.prompt,
            HistoryItem::Image(i) => &i.prompt,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            HistoryItem::Video(v) => v.created_at,
            HistoryItem::Image(i) => i.created_at,
        }
    }

    /// The main media handle (video or image), ignoring thumbnails.
    pub fn primary_handle(&self) -> &ResourceHandle {
        match self {
            HistoryItem::Video(v) => &v.video,
            HistoryItem::Image(i) => &i.image,
        }
    }

    /// Release every locally backed handle this item owns.
    fn release_handles(&self, store: &BlobStore) {
        match self {
            HistoryItem::Video(v) => {
                store.release(&v.video);
                if let Some(thumb) = &v.thumbnail {
                    store.release(thumb);
                }
            }
            HistoryItem::Image(i) => store.release(&i.image),
        }
    }
}

/// Newest-first list of finished generations.
#[derive(Debug, Default)]
pub struct HistoryLedger {
    items: Vec<HistoryItem>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a batch at the front, preserving the batch's own order.
    pub fn prepend(&mut self, batch: Vec<HistoryItem>) {
        self.items.splice(0..0, batch);
    }

    /// Remove an entry and release its handles. Returns whether an entry
    /// with this id existed.
    pub fn remove(&mut self, id: &str, store: &BlobStore) -> bool {
        let Some(pos) = self.items.iter().position(|item| item.id() == id) else {
            return false;
        };
        let item = self.items.remove(pos);
        item.release_handles(store);
        true
    }

    pub fn find(&self, id: &str) -> Option<&HistoryItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
