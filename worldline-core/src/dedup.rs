//! Per-stream "seen id" sets for idempotent ingestion.
//!
//! Ingestion uses claim-then-ingest: an item is applied only if
//! [`DedupSet::claim`] returns `true`, and claiming happens before the
//! transition is emitted. Sets are LRU-bounded so very long sessions do not
//! grow without limit; the bound is kept well above any poll window, so an
//! id forgotten by the set is older than anything a poll can return.

use std::num::NonZeroUsize;

use lru::LruCache;

/// Bounded membership set of ingested ids.
#[derive(Debug)]
pub struct DedupSet {
    seen: LruCache<String, ()>,
}

impl DedupSet {
    /// A set remembering at most `capacity` ids (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { seen: LruCache::new(capacity) }
    }

    /// Claim `id` for ingestion. Returns `true` the first time an id is
    /// seen, `false` for every later delivery while it is remembered.
    pub fn claim(&mut self, id: &str) -> bool {
        if self.seen.get(id).is_some() {
            return false;
        }
        self.seen.put(id.to_string(), ());
        true
    }

    /// Whether `id` has been claimed. Does not refresh recency.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Number of remembered ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing has been claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Forget every id.
    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

/// Which ingestion stream an id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Feed posts.
    Feed,
    /// Timeline events.
    Events,
    /// Log lines.
    Logs,
    /// Intervention records.
    Interventions,
}

impl Stream {
    /// Every stream.
    pub const ALL: [Self; 4] = [Self::Feed, Self::Events, Self::Logs, Self::Interventions];

    /// Label used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::Events => "events",
            Self::Logs => "logs",
            Self::Interventions => "interventions",
        }
    }
}

/// One [`DedupSet`] per ingestion stream.
#[derive(Debug)]
pub struct DedupSets {
    feed: DedupSet,
    events: DedupSet,
    logs: DedupSet,
    interventions: DedupSet,
}

impl DedupSets {
    /// Sets with `capacity` ids each.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            feed: DedupSet::new(capacity),
            events: DedupSet::new(capacity),
            logs: DedupSet::new(capacity),
            interventions: DedupSet::new(capacity),
        }
    }

    /// The set for `stream`.
    pub fn get_mut(&mut self, stream: Stream) -> &mut DedupSet {
        match stream {
            Stream::Feed => &mut self.feed,
            Stream::Events => &mut self.events,
            Stream::Logs => &mut self.logs,
            Stream::Interventions => &mut self.interventions,
        }
    }

    /// The set for `stream`, read-only.
    #[must_use]
    pub fn get(&self, stream: Stream) -> &DedupSet {
        match stream {
            Stream::Feed => &self.feed,
            Stream::Events => &self.events,
            Stream::Logs => &self.logs,
            Stream::Interventions => &self.interventions,
        }
    }

    /// Claim `id` on `stream`.
    pub fn claim(&mut self, stream: Stream, id: &str) -> bool {
        self.get_mut(stream).claim(id)
    }

    /// Forget everything (session reload).
    pub fn clear(&mut self) {
        for stream in Stream::ALL {
            self.get_mut(stream).clear();
        }
    }
}
