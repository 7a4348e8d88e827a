use std::time::{Duration, Instant};

use crate::codec::EncodedPayload;
use crate::segment::{self, Segment};

use super::error::SessionResult;

/// Result of feeding one segment to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// More segments are needed
    Pending { received: u32, total: u32 },
    /// Every slot is filled; the session has been removed
    Complete(EncodedPayload),
}

impl IngestOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, IngestOutcome::Complete(_))
    }
}

/// In-flight multipart transfer from one sender
#[derive(Debug, Clone)]
pub struct ReassemblySession {
    parts: Vec<Option<Segment>>,
    total: u32,
    received_count: u32,
    created_at: Instant,
    updated_at: Instant,
}

impl ReassemblySession {
    pub fn new(total: u32, now: Instant) -> Self {
        Self {
            parts: vec![None; total as usize],
            total,
            received_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Number of distinct slots filled so far
    pub fn received_count(&self) -> u32 {
        self.received_count
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn updated_at(&self) -> Instant {
        self.updated_at
    }

    /// Store a segment in its slot. A repeated index overwrites the earlier
    /// copy without counting twice. Returns true when the slot was empty.
    ///
    /// A segment whose index has no slot is ignored.
    pub fn fill(&mut self, segment: Segment, now: Instant) -> bool {
        debug_assert_eq!(segment.total, self.total);
        let Some(slot) = (segment.index as usize)
            .checked_sub(1)
            .and_then(|i| self.parts.get_mut(i))
        else {
            return false;
        };
        let newly_filled = slot.is_none();
        *slot = Some(segment);
        if newly_filled {
            self.received_count += 1;
        }
        self.updated_at = now;
        newly_filled
    }

    pub fn is_complete(&self) -> bool {
        self.received_count == self.total
    }

    /// Indices still outstanding
    pub fn missing(&self) -> Vec<u32> {
        self.parts
            .iter()
            .enumerate()
            .filter(|(_, part)| part.is_none())
            .map(|(i, _)| i as u32 + 1)
            .collect()
    }

    /// True once no segment has arrived for longer than `idle_timeout`
    pub fn is_stale(&self, now: Instant, idle_timeout: Duration) -> bool {
        now.saturating_duration_since(self.updated_at) > idle_timeout
    }

    /// Concatenate the filled slots in index order
    pub fn join(&self) -> SessionResult<EncodedPayload> {
        Ok(segment::join(self.parts.iter().flatten(), self.total)?)
    }
}
