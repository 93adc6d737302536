//! Artifact lifecycle: displayable handles for produced documents
//!
//! A store turns bytes into a loadable URL-like string and can release it
//! again. `ArtifactHandle` owns one such registration and releases it when
//! dropped, and `ArtifactSlot` holds the single current preview handle whose
//! only mutation is an atomic replace.

use base64::Engine as _;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Registry of binary artifacts addressable by URL-like strings
pub trait ArtifactStore: Send + Sync {
    /// Register bytes and return the URL a viewer can load
    fn register(&self, bytes: Vec<u8>) -> String;

    /// Release a URL. Returns false when it was already released.
    fn release(&self, url: &str) -> bool;
}

/// In-process store handing out `blob:docpress/<n>` URLs
pub struct MemoryArtifactStore {
    blobs: Mutex<HashMap<String, Arc<[u8]>>>,
    next_id: AtomicU64,
    released: AtomicU64,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            released: AtomicU64::new(0),
        }
    }

    /// Bytes behind a live URL
    pub fn fetch(&self, url: &str) -> Option<Arc<[u8]>> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()
    }

    /// Number of registered, unreleased artifacts
    pub fn live_count(&self) -> usize {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of successful releases so far
    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }

    /// Inline `data:` form of a live artifact for viewers that cannot resolve blob URLs
    pub fn data_url(&self, url: &str) -> Option<String> {
        let bytes = self.fetch(url)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes[..]);
        Some(format!("data:application/pdf;base64,{}", encoded))
    }
}

impl Default for MemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn register(&self, bytes: Vec<u8>) -> String {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let url = format!("blob:docpress/{}", id);
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.clone(), Arc::from(bytes));
        url
    }

    fn release(&self, url: &str) -> bool {
        let removed = self
            .blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url)
            .is_some();
        if removed {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }
}

/// Owned registration of one artifact; released on drop
pub struct ArtifactHandle {
    url: String,
    page_count: usize,
    store: Arc<dyn ArtifactStore>,
}

impl ArtifactHandle {
    pub fn register(store: Arc<dyn ArtifactStore>, bytes: Vec<u8>, page_count: usize) -> Self {
        let url = store.register(bytes);
        Self { url, page_count, store }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }
}

impl std::fmt::Debug for ArtifactHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactHandle")
            .field("url", &self.url)
            .field("page_count", &self.page_count)
            .finish()
    }
}

impl Drop for ArtifactHandle {
    fn drop(&mut self) {
        if !self.store.release(&self.url) {
            log::debug!("artifact {} was already released", self.url);
        }
    }
}

/// Holder of the single current preview artifact
pub struct ArtifactSlot {
    store: Arc<dyn ArtifactStore>,
    current: Mutex<Option<ArtifactHandle>>,
}

impl ArtifactSlot {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store, current: Mutex::new(None) }
    }

    /// Register `bytes`, make them current and release the previous handle.
    /// Returns the new URL.
    pub fn publish(&self, bytes: Vec<u8>, page_count: usize) -> String {
        let handle = ArtifactHandle::register(self.store.clone(), bytes, page_count);
        let url = handle.url.clone();
        let previous = self.replace(Some(handle));
        drop(previous);
        url
    }

    fn replace(&self, next: Option<ArtifactHandle>) -> Option<ArtifactHandle> {
        let mut guard = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    pub fn current_url(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|h| h.url.clone())
    }

    pub fn current_page_count(&self) -> Option<usize> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|h| h.page_count)
    }

    /// Release the current handle, if any
    pub fn teardown(&self) {
        if let Some(handle) = self.replace(None) {
            log::debug!("artifact slot: releasing {} on teardown", handle.url);
        }
    }
}
