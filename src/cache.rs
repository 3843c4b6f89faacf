//! C9 — Cache & Diff Engine.
//!
//! URL-keyed LRU over the last build's fingerprint, interactable table, and
//! assembled [`PageMap`], plus a small per-(host, page_type) template cache
//! for compressor parameters. Grounded on the teacher's
//! `process/manager.rs`'s `parking_lot::Mutex`-guarded `LruCache` of running
//! browser sessions — same "small hot set of expensive objects keyed by a
//! caller-supplied id" shape.

use crate::assemble::{Fingerprint, PageMap};
use crate::interactive::Interactable;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    Navigation,
    Action,
    Timeout,
    SizeExceeded,
    Manual,
    StructureChanged,
    UrlChanged,
    SessionReset,
    Error,
    Ttl,
}

impl InvalidationReason {
    /// Hard reasons drop the entry outright; soft reasons only affect the
    /// tier decision on the next lookup (spec §4.9's hard/soft split).
    pub fn is_hard(self) -> bool {
        matches!(
            self,
            Self::Navigation
                | Self::UrlChanged
                | Self::SessionReset
                | Self::Manual
                | Self::StructureChanged
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    /// Both hashes match: reuse the whole previous `PageMap` unchanged.
    A,
    /// Only `dom_structure_hash` matches: reuse C4's interactable table and
    /// refs, but re-run C5 onward for fresh content.
    B,
    /// Structure changed, URL is new, or no entry exists: full rebuild.
    C,
}

struct CacheEntry {
    fingerprint: Fingerprint,
    interactables: Vec<Interactable>,
    page_map: PageMap,
    stored_at: Instant,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
struct TemplateKey {
    host: String,
    page_type: String,
}

/// Page-type-specific compressor parameters a host tends to reuse across
/// requests (e.g. the discovered per-item budget for a news portal's
/// headline list), kept separate from the per-URL entry cache since it
/// survives navigation within the same host.
#[derive(Debug, Clone, Default)]
pub struct TemplateParams {
    pub per_item_budget_tokens: Option<usize>,
}

pub struct Cache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    templates: Mutex<HashMap<TemplateKey, TemplateParams>>,
    ttl: Duration,
}

impl Cache {
    pub fn new(capacity: usize, ttl_seconds: u64) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            templates: Mutex::new(HashMap::new()),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Decides which tier applies for `url` given the fingerprint just
    /// computed for the incoming snapshot. Does not mutate the cache; call
    /// [`Cache::store`] after the pipeline finishes to record the result.
    pub fn decide_tier(&self, url: &str, candidate: Fingerprint) -> CacheTier {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get(url) else {
            return CacheTier::C;
        };
        if entry.stored_at.elapsed() > self.ttl {
            return CacheTier::C;
        }
        if entry.fingerprint.content_hash == candidate.content_hash
            && entry.fingerprint.dom_structure_hash == candidate.dom_structure_hash
        {
            CacheTier::A
        } else if entry.fingerprint.dom_structure_hash == candidate.dom_structure_hash {
            CacheTier::B
        } else {
            CacheTier::C
        }
    }

    /// Returns the cached `PageMap` for a Tier A hit, if present and fresh.
    pub fn get_full(&self, url: &str) -> Option<PageMap> {
        let mut entries = self.entries.lock();
        let entry = entries.get(url)?;
        if entry.stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.page_map.clone())
    }

    /// Returns the previous interactable table for a Tier B reuse, if
    /// present and fresh.
    pub fn get_interactables(&self, url: &str) -> Option<Vec<Interactable>> {
        let mut entries = self.entries.lock();
        let entry = entries.get(url)?;
        if entry.stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.interactables.clone())
    }

    pub fn store(
        &self,
        url: &str,
        fingerprint: Fingerprint,
        interactables: Vec<Interactable>,
        page_map: PageMap,
    ) {
        self.entries.lock().put(
            url.to_string(),
            CacheEntry {
                fingerprint,
                interactables,
                page_map,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, url: &str, reason: InvalidationReason) {
        if reason.is_hard() {
            self.entries.lock().pop(url);
        }
    }

    pub fn get_template(&self, host: &str, page_type: &str) -> TemplateParams {
        self.templates
            .lock()
            .get(&TemplateKey {
                host: host.to_string(),
                page_type: page_type.to_string(),
            })
            .cloned()
            .unwrap_or_default()
    }

    pub fn store_template(&self, host: &str, page_type: &str, params: TemplateParams) {
        self.templates.lock().insert(
            TemplateKey {
                host: host.to_string(),
                page_type: page_type.to_string(),
            },
            params,
        );
    }
}
