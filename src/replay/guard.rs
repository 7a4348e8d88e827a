use std::fmt;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// How long a processed transaction is remembered
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(10 * 60);

/// Canonical identifier of a decoded transaction (BLAKE3 of its raw bytes)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(String);

impl TxId {
    pub fn from_raw(raw_tx: &[u8]) -> Self {
        Self(blake3::hash(raw_tx).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Recently processed transaction ids with a fixed retention window
///
/// Expiry is fixed at first record: recording an id that is still live
/// does not extend it.
pub struct ReplayGuard {
    seen: DashMap<TxId, Instant>,
    retention: Duration,
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl ReplayGuard {
    pub fn new(retention: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn is_replay(&self, tx_id: &TxId) -> bool {
        self.is_replay_at(tx_id, Instant::now())
    }

    pub fn is_replay_at(&self, tx_id: &TxId, now: Instant) -> bool {
        // Lazily drop the entry if its window has passed
        self.seen
            .remove_if(tx_id, |_, expires_at| *expires_at <= now)
            .is_none()
            && self.seen.contains_key(tx_id)
    }

    pub fn record(&self, tx_id: TxId) {
        self.record_at(tx_id, Instant::now());
    }

    pub fn record_at(&self, tx_id: TxId, now: Instant) {
        self.check_and_record_at(tx_id, now);
    }

    /// Atomically check and record. Returns true if `tx_id` was already live
    /// (a replay), false if it has just been recorded.
    pub fn check_and_record(&self, tx_id: TxId) -> bool {
        self.check_and_record_at(tx_id, Instant::now())
    }

    pub fn check_and_record_at(&self, tx_id: TxId, now: Instant) -> bool {
        match self.seen.entry(tx_id) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() > now {
                    return true;
                }
                occupied.insert(now + self.retention);
                false
            }
            Entry::Vacant(vacant) => {
                vacant.insert(now + self.retention);
                false
            }
        }
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.seen.len();
        self.seen.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.seen.len())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
