//! In-memory media blob store.
//!
//! Generated media (video and image bytes) is kept in process memory and
//! addressed through opaque `blob:` tokens, so the rest of the application
//! can treat results like ordinary links. Handles backed by remote URLs pass
//! through untouched and carry no release obligation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod thumbnail;

pub use thumbnail::{
    extract_thumbnail, ThumbnailError, CAPTURE_SECONDS, THUMBNAIL_JPEG_QUALITY, THUMBNAIL_WIDTH,
};

const LOCAL_SCHEME: &str = "blob:";

/// Opaque reference to binary media.
///
/// Local handles (`blob:` scheme) resolve through the [`BlobStore`] that
/// issued them and must be released exactly once when their owner is
/// discarded. Remote handles are plain URLs and never enter the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    /// Wrap a remote URL as a handle. No release is needed for these.
    pub fn remote(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the handle is backed by store-held bytes.
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_SCHEME)
    }
}

impl std::fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bytes plus declared media type, as held by the store.
#[derive(Debug, Clone)]
pub struct Blob {
    pub bytes: Arc<Vec<u8>>,
    pub media_type: String,
}

/// Registry of locally held media blobs.
///
/// Cheap to clone; clones share the same underlying registry.
#[derive(Debug, Clone, Default)]
pub struct BlobStore {
    inner: Arc<Mutex<HashMap<String, Blob>>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap bytes in a new locally addressable handle.
    pub fn create(&self, bytes: Vec<u8>, media_type: &str) -> ResourceHandle {
        let token = format!("{LOCAL_SCHEME}{}", Uuid::new_v4());
        self.inner.lock().insert(
            token.clone(),
            Blob {
                bytes: Arc::new(bytes),
                media_type: media_type.to_string(),
            },
        );
        ResourceHandle(token)
    }

    /// Look up the bytes behind a handle. Remote and released handles
    /// resolve to `None`.
    pub fn resolve(&self, handle: &ResourceHandle) -> Option<Blob> {
        self.inner.lock().get(handle.as_str()).cloned()
    }

    /// Release a locally backed handle. After release the token no longer
    /// resolves. Remote handles are skipped by policy: they never entered
    /// local memory.
    pub fn release(&self, handle: &ResourceHandle) {
        if !handle.is_local() {
            return;
        }
        if self.inner.lock().remove(handle.as_str()).is_none() {
            tracing::warn!(handle = %handle, "released a handle that was not held");
        }
    }

    /// Number of live local blobs.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Releases a freshly created handle on drop unless ownership is taken
/// with [`HandleGuard::into_handle`]. Used on paths where a later step can
/// still fail after the bytes have been materialized.
#[derive(Debug)]
pub struct HandleGuard {
    store: BlobStore,
    handle: Option<ResourceHandle>,
}

impl HandleGuard {
    pub fn new(store: BlobStore, handle: ResourceHandle) -> Self {
        Self {
            store,
            handle: Some(handle),
        }
    }

    pub fn handle(&self) -> &ResourceHandle {
        self.handle.as_ref().expect("guard already consumed")
    }

    /// Take ownership of the handle, defusing the guard.
    pub fn into_handle(mut self) -> ResourceHandle {
        self.handle.take().expect("guard already consumed")
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.store.release(&handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_resolve() {
        let store = BlobStore::new();
        let handle = store.create(vec![1, 2, 3], "video/mp4");

        assert!(handle.is_local());
        let blob = store.resolve(&handle).unwrap();
        assert_eq!(blob.bytes.as_slice(), &[1, 2, 3]);
        assert_eq!(blob.media_type, "video/mp4");
    }

    #[test]
    fn release_invalidates_handle() {
        let store = BlobStore::new();
        let handle = store.create(vec![0u8; 16], "image/jpeg");

        store.release(&handle);
        assert!(store.resolve(&handle).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn remote_handles_are_not_released() {
        let store = BlobStore::new();
        let local = store.create(vec![7], "video/mp4");
        let remote = ResourceHandle::remote("https://example.com/video.mp4");

        assert!(!remote.is_local());
        store.release(&remote);
        assert_eq!(store.len(), 1);
        assert!(store.resolve(&local).is_some());
        assert!(store.resolve(&remote).is_none());
    }

    #[test]
    fn guard_releases_on_drop() {
        let store = BlobStore::new();
        let handle = store.create(vec![9], "video/mp4");
        {
            let _guard = HandleGuard::new(store.clone(), handle.clone());
        }
        assert!(store.resolve(&handle).is_none());
    }

    #[test]
    fn guard_defused_by_into_handle() {
        let store = BlobStore::new();
        let handle = store.create(vec![9], "video/mp4");
        let guard = HandleGuard::new(store.clone(), handle.clone());

        let owned = guard.into_handle();
        assert_eq!(owned, handle);
        assert!(store.resolve(&owned).is_some());
    }
}
