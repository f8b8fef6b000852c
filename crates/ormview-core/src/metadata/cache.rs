//! Concurrent fact caches.
//!
//! Each cache is a `DashMap` keyed by a structured [`FactKey`]. Population
//! follows compute-or-fetch: a miss computes outside any shard lock and the
//! first inserted value wins, so concurrent misses on the same key are
//! harmless. Errors are never stored.

use crate::error::Result;
use dashmap::DashMap;
use ormview_proto::TypeName;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use tracing::trace;

/// Number of [`FactKind`] variants.
pub const FACT_KINDS: usize = 25;

/// Kind of memoized fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FactKind {
    /// Class table name.
    ClassStorageName,
    /// Class discriminator value.
    TypeStorageName,
    /// Primary key column.
    PrimaryKeyStorageName,
    /// Primary key type.
    KeyType,
    /// Class caption.
    ClassCaption,
    /// Class caption property.
    CaptionProperty,
    /// Class is stored.
    StoredClass,
    /// Merged loading order.
    LoadingOrder,
    /// Bases then the class.
    ConversionChain,
    /// Aggregator property name.
    AggregatorProperty,
    /// Order property name.
    OrderProperty,
    /// All property names.
    PropertyNames,
    /// Property type.
    PropertyType,
    /// Declaring class of a property.
    DeclaringClass,
    /// Property storage name.
    PropertyStorageName,
    /// Property not-null flag.
    NotNull,
    /// Property stored flag.
    Stored,
    /// Property string length.
    StrLen,
    /// Property caption.
    PropertyCaption,
    /// Master usage types.
    UsageTypes,
    /// Detail item usage types.
    DetailUsageTypes,
    /// Expression for an engine.
    Expression,
    /// Resolved dotted path.
    ResolvedPath,
    /// Built view.
    View,
    /// All view names of a class.
    AllViews,
}

impl FactKind {
    /// Every kind, in reporting order.
    pub const ALL: [FactKind; FACT_KINDS] = [
        FactKind::ClassStorageName,
        FactKind::TypeStorageName,
        FactKind::PrimaryKeyStorageName,
        FactKind::KeyType,
        FactKind::ClassCaption,
        FactKind::CaptionProperty,
        FactKind::StoredClass,
        FactKind::LoadingOrder,
        FactKind::ConversionChain,
        FactKind::AggregatorProperty,
        FactKind::OrderProperty,
        FactKind::PropertyNames,
        FactKind::PropertyType,
        FactKind::DeclaringClass,
        FactKind::PropertyStorageName,
        FactKind::NotNull,
        FactKind::Stored,
        FactKind::StrLen,
        FactKind::PropertyCaption,
        FactKind::UsageTypes,
        FactKind::DetailUsageTypes,
        FactKind::Expression,
        FactKind::ResolvedPath,
        FactKind::View,
        FactKind::AllViews,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Extra key component for facts that depend on more than class and path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Qualifier {
    /// No qualifier.
    None,
    /// Position in a storage name list.
    Index(usize),
    /// Execution engine identity.
    Engine(String),
}

/// Structured cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FactKey {
    /// Fact kind.
    pub kind: FactKind,
    /// Class the fact is about.
    pub class: TypeName,
    /// Property path or view name; empty for class facts.
    pub path: String,
    /// Extra component.
    pub qualifier: Qualifier,
}

impl FactKey {
    /// Key for a class-level fact.
    pub fn class(kind: FactKind, class: &TypeName) -> Self {
        Self {
            kind,
            class: class.clone(),
            path: String::new(),
            qualifier: Qualifier::None,
        }
    }

    /// Key for a property-level fact.
    pub fn property(kind: FactKind, class: &TypeName, path: impl Into<String>) -> Self {
        Self {
            kind,
            class: class.clone(),
            path: path.into(),
            qualifier: Qualifier::None,
        }
    }

    /// Add a qualifier.
    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifier = qualifier;
        self
    }
}

/// Cache statistics.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    /// Get hit count.
    pub fn hits(&self) -> u64 {
        self.hits.load(AtomicOrdering::Relaxed)
    }

    /// Get miss count.
    pub fn misses(&self) -> u64 {
        self.misses.load(AtomicOrdering::Relaxed)
    }

    /// Calculate hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, AtomicOrdering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, AtomicOrdering::Relaxed);
    }
}

/// Memo of one value type, shared by several fact kinds.
pub struct FactCache<V> {
    entries: DashMap<FactKey, V>,
    stats: [CacheStats; FACT_KINDS],
}

impl<V: Clone> FactCache<V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            stats: std::array::from_fn(|_| CacheStats::default()),
        }
    }

    /// Return the cached value for `key`, computing it on a miss.
    ///
    /// When `cacheable` is false the value is computed and returned without
    /// touching the memo.
    pub fn get_or_try_insert_with<F>(&self, key: FactKey, cacheable: bool, compute: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        let stats = &self.stats[key.kind.index()];
        if cacheable {
            if let Some(hit) = self.entries.get(&key) {
                stats.record_hit();
                return Ok(hit.value().clone());
            }
        }

        stats.record_miss();
        trace!(kind = ?key.kind, class = %key.class, path = %key.path, "metadata cache miss");

        let value = compute()?;
        if !cacheable {
            return Ok(value);
        }
        let entry = self.entries.entry(key).or_insert(value);
        Ok(entry.value().clone())
    }

    /// Number of entries of a kind.
    pub fn len_of(&self, kind: FactKind) -> usize {
        self.entries.iter().filter(|e| e.key().kind == kind).count()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Statistics of a kind.
    pub fn stats(&self, kind: FactKind) -> &CacheStats {
        &self.stats[kind.index()]
    }

    /// Drop all entries of a kind.
    pub fn clear_kind(&self, kind: FactKind) {
        self.entries.retain(|key, _| key.kind != kind);
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<V: Clone> Default for FactCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for FactCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Snapshot of one fact kind's cache state.
#[derive(Debug, Clone, PartialEq)]
pub struct FactInfo {
    /// Fact kind.
    pub kind: FactKind,
    /// Entries currently held.
    pub entries: usize,
    /// Lookups answered from the memo.
    pub hits: u64,
    /// Lookups that had to compute.
    pub misses: u64,
}

/// Snapshot of all fact caches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheInfo {
    /// One row per kind that has been looked up at least once.
    pub kinds: Vec<FactInfo>,
}

impl CacheInfo {
    /// Row of a kind.
    pub fn kind(&self, kind: FactKind) -> Option<&FactInfo> {
        self.kinds.iter().find(|k| k.kind == kind)
    }

    /// Total entries across kinds.
    pub fn total_entries(&self) -> usize {
        self.kinds.iter().map(|k| k.entries).sum()
    }
}

impl fmt::Display for CacheInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for info in &self.kinds {
            writeln!(
                f,
                "{:?}: {} entries, {} hits, {} misses",
                info.kind, info.entries, info.hits, info.misses
            )?;
        }
        Ok(())
    }
}
