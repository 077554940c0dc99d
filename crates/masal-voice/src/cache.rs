//! Response cache — remembers generated audio per (character, emotion, line).
//!
//! Avoids redundant remote calls for repeated story lines. The key space is
//! finite (story lines × emotions), so there is no TTL and no size bound;
//! [`ResponseCache::clear`] is the only eviction path.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::profiles::Emotion;
use crate::text_utils;

// ── Playable audio handle ──────────────────────────────────────────

/// Opaque, replayable handle to already-fetched audio bytes.
///
/// Clones share the underlying bytes; the bytes are immutable once fetched,
/// so a cached handle can be replayed any number of times without
/// re-fetching.
#[derive(Debug, Clone)]
pub struct PlayableAudio {
    bytes: Arc<Vec<u8>>,
}

impl PlayableAudio {
    /// Wrap fetched audio bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(bytes),
        }
    }

    /// The raw audio bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// An owned copy of the bytes for handoff to a decoder that requires
    /// `'static` ownership.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.as_ref().clone()
    }
}

// ── Cache key ──────────────────────────────────────────────────────

/// Cache key: the exact (character, emotion, normalized text) triple.
///
/// This constructor is the only way to build a key, so normalization is
/// guaranteed identical on read and write — a mismatch would silently
/// duplicate remote calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    character: String,
    emotion: Emotion,
    text: String,
}

impl CacheKey {
    /// Build a key from raw request fields.
    #[must_use]
    pub fn new(character: &str, emotion: Emotion, text: &str) -> Self {
        Self {
            character: text_utils::fold_for_key(character.trim()),
            emotion,
            text: text_utils::fold_for_key(&text_utils::normalize_whitespace(text)),
        }
    }
}

// ── Cached value ───────────────────────────────────────────────────

/// What the cache knows about a line.
#[derive(Debug, Clone)]
pub enum CachedAudio {
    /// Remote generation succeeded; replay these bytes.
    Remote(PlayableAudio),
    /// Remote generation declined or failed for this line; go straight to
    /// local synthesis and skip the network.
    UseLocal,
}

// ── Cache ──────────────────────────────────────────────────────────

/// In-memory response cache.
///
/// The lock is never held across an `.await` point, so `clear()` is safe to
/// call concurrently with in-flight sessions: it does not cancel them, it
/// only stops future lookups from reusing old entries.
#[derive(Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<CacheKey, CachedAudio>>,
}

impl ResponseCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a line.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<CachedAudio> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Record the outcome for a line.
    pub fn put(&self, key: CacheKey, value: CachedAudio) {
        self.entries.lock().unwrap().insert(key, value);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap();
        let dropped = entries.len();
        entries.clear();
        tracing::debug!(dropped, "Response cache cleared");
    }

    /// Number of cached lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}
