//! Pending request store shared by the request and response phases.
//!
//! # Matching
//! - With a host-supplied token, a response claims exactly the request that
//!   carried the same token.
//! - Without a token, a response claims the most recent entry still inside the
//!   freshness window. This is an approximation: under concurrent traffic a
//!   response can be paired with another request's context. `reject_ambiguous`
//!   turns a multi-candidate claim into a miss instead of a guess.
//!
//! # Bounds
//! - Every insert evicts entries older than the freshness window, then the
//!   oldest entries until the store is under capacity.
//! - A claim miss never evicts anything.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::schema::CorrelationConfig;
use crate::observability::metrics;
use crate::plugin::payload::PendingRequest;

/// How a claim was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Token,
    Approximate,
    Miss,
    Ambiguous,
}

impl ClaimOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ClaimOutcome::Token => "token",
            ClaimOutcome::Approximate => "approximate",
            ClaimOutcome::Miss => "miss",
            ClaimOutcome::Ambiguous => "ambiguous",
        }
    }
}

/// Concurrent map of pending request contexts keyed by their timestamp id.
#[derive(Debug)]
pub struct CorrelationStore {
    entries: DashMap<u64, PendingRequest>,
    last_id: AtomicU64,
    freshness: Duration,
    capacity: usize,
    reject_ambiguous: bool,
}

impl CorrelationStore {
    /// Create a store from correlation settings.
    pub fn new(config: &CorrelationConfig) -> Self {
        Self {
            entries: DashMap::new(),
            last_id: AtomicU64::new(0),
            freshness: Duration::from_millis(config.freshness_ms),
            capacity: config.capacity.max(1),
            reject_ambiguous: config.reject_ambiguous,
        }
    }

    /// Generate the next id: the current time in nanoseconds, bumped past the
    /// previous id when the clock did not advance.
    pub fn next_id(&self) -> u64 {
        let now = now_nanos();
        let previous = self
            .last_id
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last.saturating_add(1)))
            })
            .unwrap_or_default();
        now.max(previous.saturating_add(1))
    }

    /// Store a pending request under its id.
    pub fn insert(&self, pending: PendingRequest) {
        self.insert_at(pending, now_nanos());
    }

    pub(crate) fn insert_at(&self, pending: PendingRequest, now: u64) {
        self.evict(now);
        self.entries.insert(pending.id, pending);
        metrics::record_pending_requests(self.entries.len());
    }

    /// Claim the pending request for a response, removing it from the store.
    pub fn claim(&self, token: Option<&str>) -> (Option<PendingRequest>, ClaimOutcome) {
        self.claim_at(token, now_nanos())
    }

    pub(crate) fn claim_at(&self, token: Option<&str>, now: u64) -> (Option<PendingRequest>, ClaimOutcome) {
        let result = match token {
            Some(token) => self.claim_token(token, now),
            None => self.claim_recent(now),
        };
        metrics::record_correlation(result.1.as_str());
        metrics::record_pending_requests(self.entries.len());
        result
    }

    /// Drop a pending request whose exchange will never produce a response.
    pub fn remove(&self, id: u64) -> Option<PendingRequest> {
        let removed = self.entries.remove(&id).map(|(_, pending)| pending);
        metrics::record_pending_requests(self.entries.len());
        removed
    }

    /// Number of live entries, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn cutoff(&self, now: u64) -> u64 {
        now.saturating_sub(self.freshness.as_nanos() as u64)
    }

    fn claim_token(&self, token: &str, now: u64) -> (Option<PendingRequest>, ClaimOutcome) {
        let cutoff = self.cutoff(now);
        let mut candidates: Vec<u64> = self
            .entries
            .iter()
            .filter(|e| *e.key() > cutoff && e.value().token.as_deref() == Some(token))
            .map(|e| *e.key())
            .collect();

        // Clients may reuse an id; the newest request carrying it wins.
        candidates.sort_unstable();
        for key in candidates.into_iter().rev() {
            if let Some((_, pending)) = self.entries.remove(&key) {
                return (Some(pending), ClaimOutcome::Token);
            }
        }
        (None, ClaimOutcome::Miss)
    }

    fn claim_recent(&self, now: u64) -> (Option<PendingRequest>, ClaimOutcome) {
        let cutoff = self.cutoff(now);

        // Another worker may remove the chosen entry between scan and remove.
        loop {
            let mut candidates: Vec<u64> = self
                .entries
                .iter()
                .filter(|e| *e.key() > cutoff)
                .map(|e| *e.key())
                .collect();

            if candidates.is_empty() {
                return (None, ClaimOutcome::Miss);
            }
            if self.reject_ambiguous && candidates.len() > 1 {
                tracing::warn!(
                    candidates = candidates.len(),
                    "Refusing ambiguous correlation match"
                );
                return (None, ClaimOutcome::Ambiguous);
            }

            candidates.sort_unstable();
            for key in candidates.into_iter().rev() {
                if let Some((_, pending)) = self.entries.remove(&key) {
                    return (Some(pending), ClaimOutcome::Approximate);
                }
            }
        }
    }

    fn evict(&self, now: u64) {
        let cutoff = self.cutoff(now);
        let before = self.entries.len();
        self.entries.retain(|id, _| *id > cutoff);

        if self.entries.len() >= self.capacity {
            let mut ids: Vec<u64> = self.entries.iter().map(|e| *e.key()).collect();
            ids.sort_unstable();
            let excess = (ids.len() + 1).saturating_sub(self.capacity);
            for id in ids.into_iter().take(excess) {
                self.entries.remove(&id);
            }
        }

        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted pending requests");
            metrics::record_correlation_evictions(evicted);
        }
    }
}

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}
