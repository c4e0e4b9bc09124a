use std::{collections::HashMap, sync::Mutex};

use bar_protocol::{ProbeId, Segment};
use tokio::time::Instant;

/// Until when a cached result is considered fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    At(Instant),
    /// Fresh until someone explicitly asks for a refresh (a click, or SIGUSR1).
    OnDemand,
}

impl Deadline {
    pub fn is_due(&self, now: Instant) -> bool {
        match self {
            Deadline::At(at) => now >= *at,
            Deadline::OnDemand => false,
        }
    }

    #[cfg(test)]
    pub fn instant(&self) -> Option<Instant> {
        match self {
            Deadline::At(at) => Some(*at),
            Deadline::OnDemand => None,
        }
    }
}

/// The latest result of one probe.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub segments: Vec<Segment>,
    pub valid_until: Deadline,
    pub produced_at: Instant,
}

/// An ordered copy of the cache at one point in time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CacheSnapshot {
    pub version: u64,
    pub probes: Vec<(ProbeId, Vec<Segment>)>,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<ProbeId, CacheEntry>,
    version: u64,
}

/// Latest segments of every probe, addressed by `(name, instance)`.
///
/// All access goes through a single lock that is only held for the duration of one operation,
/// so readers always see either the old or the new result of a probe, never a mix.
#[derive(Debug)]
pub struct SegmentCache {
    order: Vec<ProbeId>,
    inner: Mutex<CacheInner>,
}

impl SegmentCache {
    /// Create a cache for the given probes. Snapshots follow this order.
    pub fn new(order: impl IntoIterator<Item = ProbeId>) -> Self {
        SegmentCache { order: order.into_iter().collect(), inner: Mutex::new(CacheInner::default()) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        // The lock is never held across anything that can panic, so a poisoned lock still holds consistent data.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn knows(&self, id: &str) -> bool {
        self.order.iter().any(|known| known == id)
    }

    /// Replace the single segment with the same `(name, instance)`, or add it.
    /// The daemon always replaces whole probes, see [`SegmentCache::replace_probe`].
    #[cfg(test)]
    pub fn put(&self, segment: Segment, valid_until: Deadline, now: Instant) {
        if !self.knows(&segment.name) {
            log::warn!("Refusing to cache segment of unknown probe `{}`", segment.name);
            return;
        }
        let mut inner = self.lock();
        let entry = inner
            .entries
            .entry(ProbeId::from(segment.name.as_str()))
            .or_insert_with(|| CacheEntry { segments: Vec::new(), valid_until, produced_at: now });
        match entry.segments.iter_mut().find(|s| s.instance == segment.instance) {
            Some(existing) => *existing = segment,
            None => entry.segments.push(segment),
        }
        entry.valid_until = valid_until;
        entry.produced_at = now;
        inner.version += 1;
    }

    /// Atomically replace everything a probe produced.
    pub fn replace_probe(&self, id: &ProbeId, segments: Vec<Segment>, valid_until: Deadline, now: Instant) {
        if !self.knows(id.as_str()) {
            log::warn!("Refusing to cache segments of unknown probe `{}`", id);
            return;
        }
        debug_assert!(segments.iter().all(|s| s.name == id.as_str()));
        let mut inner = self.lock();
        inner.entries.insert(id.clone(), CacheEntry { segments, valid_until, produced_at: now });
        inner.version += 1;
    }

    #[cfg(test)]
    pub fn get(&self, name: &str, instance: Option<&str>) -> Option<Segment> {
        let inner = self.lock();
        inner.entries.get(name)?.segments.iter().find(|s| s.matches(name, instance)).cloned()
    }

    pub fn entry(&self, id: &str) -> Option<CacheEntry> {
        self.lock().entries.get(id).cloned()
    }

    pub fn deadline(&self, id: &str) -> Option<Deadline> {
        self.lock().entries.get(id).map(|e| e.valid_until)
    }

    /// Mark the result of a probe as stale.
    pub fn expire(&self, id: &str, now: Instant) {
        let mut inner = self.lock();
        if let Some(entry) = inner.entries.get_mut(id) {
            entry.valid_until = Deadline::At(now);
            inner.version += 1;
        }
    }

    /// Mark every cached result as stale.
    pub fn expire_all(&self, now: Instant) {
        let mut inner = self.lock();
        for entry in inner.entries.values_mut() {
            entry.valid_until = Deadline::At(now);
        }
        inner.version += 1;
    }

    pub fn version(&self) -> u64 {
        self.lock().version
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        let inner = self.lock();
        let probes = self
            .order
            .iter()
            .filter_map(|id| inner.entries.get(id).map(|entry| (id.clone(), entry.segments.clone())))
            .collect();
        CacheSnapshot { version: inner.version, probes }
    }
}
