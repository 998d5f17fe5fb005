#[cfg(test)]
mod tests;

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};

use sha2::{Digest, Sha256};
use tracing::trace;

/// Content-addressed cache of previously computed embedding vectors.
///
/// Keys are SHA-256 digests of the input text, so identical text always maps
/// to the same entry. The cache is bounded: once `capacity` entries are held,
/// the oldest entry is evicted on insert. Handles are cheap to clone and share
/// one underlying map.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    inner: Arc<Mutex<CacheInner>>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, Vec<f32>>,
    order: VecDeque<String>,
}

impl EmbeddingCache {
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner::default())),
            capacity,
        }
    }

    /// Stable content key for a piece of text.
    #[inline]
    pub fn content_key(text: &str) -> String {
        let digest = Sha256::digest(text.as_bytes());
        digest.iter().fold(String::with_capacity(64), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entries.get(key).cloned()
    }

    #[inline]
    pub fn insert(&self, key: String, embedding: Vec<f32>) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if inner.entries.insert(key.clone(), embedding).is_some() {
            // Refreshed an existing entry; insertion order is unchanged.
            return;
        }

        inner.order.push_back(key);
        if inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                trace!("Evicting cached embedding {oldest}");
                inner.entries.remove(&oldest);
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
