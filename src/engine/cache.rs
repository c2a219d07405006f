//! Fraud pattern cache
//!
//! Process-wide record of previously submitted document content, keyed by
//! SHA-256 hash. A repeat submission of byte-identical content is the
//! strongest duplicate-fraud signal, so the lookup also records first
//! sightings. Entries live until the explicit maintenance sweep evicts them.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{DocumentMetadata, DocumentType};

/// Default retention window for the eviction sweep, in days.
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// What the cache remembers about the first sighting of a content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub first_seen: DateTime<Utc>,
    pub document_type: DocumentType,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    hits: usize,
    misses: usize,
}

/// Content-hash cache of previously seen submissions.
///
/// Lookup-and-insert is a single critical section so two concurrent
/// submissions of the same bytes cannot both pass as first sightings.
/// The cache grows without bound between maintenance sweeps by design.
#[derive(Debug, Default)]
pub struct FraudPatternCache {
    inner: Mutex<CacheInner>,
}

impl FraudPatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// SHA-256 hex digest of raw document content.
    pub fn hash_content(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }

    /// Look up a content hash and record it if unseen.
    ///
    /// Returns the prior entry when the hash was already known (a duplicate
    /// submission), or `None` for a first sighting. Repeats never overwrite
    /// the stored first-sighting record.
    pub fn check_and_record(
        &self,
        content_hash: &str,
        document_type: DocumentType,
        metadata: &DocumentMetadata,
    ) -> Option<CacheEntry> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.entries.get(content_hash) {
            let existing = existing.clone();
            inner.hits += 1;
            tracing::debug!(
                "Fraud pattern cache hit for {} (first seen {})",
                &content_hash[..12.min(content_hash.len())],
                existing.first_seen.to_rfc3339()
            );
            return Some(existing);
        }
        inner.misses += 1;
        inner.entries.insert(
            content_hash.to_string(),
            CacheEntry {
                first_seen: Utc::now(),
                document_type,
                metadata: metadata.clone(),
            },
        );
        None
    }

    /// Seed an entry directly, preserving its timestamp.
    pub fn insert(&self, content_hash: String, entry: CacheEntry) {
        self.inner.lock().entries.insert(content_hash, entry);
    }

    /// Drop every entry older than the retention window.
    ///
    /// Never called by the verification pipeline itself; an external
    /// scheduler owns the sweep cadence. Returns the eviction count.
    pub fn evict_stale_entries(&self, retention_days: i64) -> usize {
        let cutoff = Utc::now() - Duration::days(retention_days);
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.first_seen >= cutoff);
        let evicted = before - inner.entries.len();
        if evicted > 0 {
            tracing::info!(
                "Evicted {} stale fraud-cache entries ({} retained, {}-day window)",
                evicted,
                inner.entries.len(),
                retention_days
            );
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Statistics
    pub fn hits(&self) -> usize {
        self.inner.lock().hits
    }

    pub fn misses(&self) -> usize {
        self.inner.lock().misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> DocumentMetadata {
        DocumentMetadata {
            expected_amount: Some(1250.0),
            expected_date: None,
            issuer_name: Some("Acme Corp".to_string()),
        }
    }

    #[test]
    fn test_hash_is_stable_and_content_sensitive() {
        let a = FraudPatternCache::hash_content(b"invoice body");
        let b = FraudPatternCache::hash_content(b"invoice body");
        let c = FraudPatternCache::hash_content(b"invoice bodY");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_first_sighting_then_duplicate() {
        let cache = FraudPatternCache::new();
        let hash = FraudPatternCache::hash_content(b"doc-1");

        let first = cache.check_and_record(&hash, DocumentType::Invoice, &metadata());
        assert!(first.is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.misses(), 1);

        let second = cache.check_and_record(&hash, DocumentType::Invoice, &metadata());
        let prior = second.expect("second sighting must return the stored entry");
        assert_eq!(prior.document_type, DocumentType::Invoice);
        assert_eq!(prior.metadata.expected_amount, Some(1250.0));
        assert_eq!(cache.hits(), 1);
        // the repeat did not add a second entry
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_duplicate_preserves_first_sighting_record() {
        let cache = FraudPatternCache::new();
        let hash = FraudPatternCache::hash_content(b"doc-2");
        let seeded = CacheEntry {
            first_seen: Utc::now() - Duration::days(3),
            document_type: DocumentType::BankStatement,
            metadata: DocumentMetadata::default(),
        };
        cache.insert(hash.clone(), seeded.clone());

        let prior = cache
            .check_and_record(&hash, DocumentType::Invoice, &metadata())
            .expect("seeded hash must register as duplicate");
        assert_eq!(prior.document_type, DocumentType::BankStatement);
        assert_eq!(prior.first_seen, seeded.first_seen);
    }

    #[test]
    fn test_eviction_respects_retention_window() {
        let cache = FraudPatternCache::new();
        let stale = CacheEntry {
            first_seen: Utc::now() - Duration::days(31),
            document_type: DocumentType::Invoice,
            metadata: DocumentMetadata::default(),
        };
        let fresh = CacheEntry {
            first_seen: Utc::now() - Duration::days(29),
            document_type: DocumentType::Invoice,
            metadata: DocumentMetadata::default(),
        };
        cache.insert("stale".to_string(), stale);
        cache.insert("fresh".to_string(), fresh);

        let evicted = cache.evict_stale_entries(DEFAULT_RETENTION_DAYS);
        assert_eq!(evicted, 1);
        assert_eq!(cache.len(), 1);

        // the surviving entry is still a duplicate hit
        assert!(cache
            .check_and_record("fresh", DocumentType::Invoice, &DocumentMetadata::default())
            .is_some());
    }

    #[test]
    fn test_eviction_on_empty_cache_is_a_noop() {
        let cache = FraudPatternCache::new();
        assert_eq!(cache.evict_stale_entries(DEFAULT_RETENTION_DAYS), 0);
        assert!(cache.is_empty());
    }
}
