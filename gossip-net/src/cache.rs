//! Expiring message cache for duplicate suppression.
//!
//! Remembers the identifiers of recently observed messages so that a copy
//! arriving within the TTL is processed at most once. Expiry is lazy: an
//! entry stops being observable at its deadline whether or not it has been
//! swept; the sweep only bounds memory and runs at most once per
//! `sweep_interval`, piggybacked on admissions.

use {
    crate::{
        envelope::Envelope,
        error::{GossipNetError, Result},
    },
    log::trace,
    std::{
        collections::HashMap,
        sync::Mutex,
        time::{Duration, Instant},
    },
    uuid::Uuid,
};

#[derive(Debug, Clone)]
struct CachedEntry {
    envelope: Envelope,
    expires_at: Instant,
}

impl CachedEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug)]
struct CacheInner {
    entries: HashMap<Uuid, CachedEntry>,
    last_sweep: Instant,
}

/// Bounded-lifetime set of recently observed message identifiers.
///
/// `try_admit`, `contains`, and `lookup` are linearizable with respect to
/// each other (one internal lock); `try_admit` is effectively a
/// compare-and-set on the message id.
#[derive(Debug)]
pub struct ExpiringCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
    sweep_interval: Duration,
}

impl ExpiringCache {
    /// Create a cache whose entries live for `ttl`.
    ///
    /// A zero TTL is rejected: it would admit every duplicate.
    pub fn new(ttl: Duration, sweep_interval: Duration) -> Result<Self> {
        if ttl.is_zero() {
            return Err(GossipNetError::Config(
                "cache TTL must be greater than zero".into(),
            ));
        }
        Ok(Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            ttl,
            sweep_interval,
        })
    }

    /// Admit `envelope` iff no live entry exists for its id.
    ///
    /// On admission the entry expires `ttl` from now. A duplicate admit
    /// leaves the existing entry untouched, including its deadline.
    pub fn try_admit(&self, envelope: &Envelope) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("cache lock poisoned");

        if now.duration_since(inner.last_sweep) >= self.sweep_interval {
            let before = inner.entries.len();
            inner.entries.retain(|_, entry| entry.is_live(now));
            inner.last_sweep = now;
            trace!("cache sweep removed {} entries", before - inner.entries.len());
        }

        match inner.entries.get(&envelope.id()) {
            Some(existing) if existing.is_live(now) => false,
            _ => {
                inner.entries.insert(
                    envelope.id(),
                    CachedEntry {
                        envelope: envelope.clone(),
                        expires_at: now + self.ttl,
                    },
                );
                true
            }
        }
    }

    /// Whether a live entry exists for `id`.
    pub fn contains(&self, id: &Uuid) -> bool {
        let now = Instant::now();
        let inner = self.inner.lock().expect("cache lock poisoned");
        inner.entries.get(id).is_some_and(|e| e.is_live(now))
    }

    /// The envelope admitted under `id`, if still live.
    pub fn lookup(&self, id: &Uuid) -> Option<Envelope> {
        let now = Instant::now();
        let inner = self.inner.lock().expect("cache lock poisoned");
        inner
            .entries
            .get(id)
            .filter(|e| e.is_live(now))
            .map(|e| e.envelope.clone())
    }

    /// Count of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let inner = self.inner.lock().expect("cache lock poisoned");
        inner.entries.values().filter(|e| e.is_live(now)).count()
    }

    /// Whether no live entries exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count of stored entries, live or expired. Only the sweep shrinks it.
    #[cfg(test)]
    fn stored_len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").entries.len()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
