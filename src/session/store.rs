use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::segment::Segment;
use crate::session::error::{SessionError, SessionResult};
use crate::session::types::{IngestOutcome, ReassemblySession};

/// Sessions with no new segment for this long are dropped
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Upper bound on the `total` a sender may declare
pub const DEFAULT_MAX_SEGMENTS: u32 = 64;

/// In-memory reassembly sessions, one per sender
pub struct ReassemblyStore {
    sessions: DashMap<String, ReassemblySession>,
    idle_timeout: Duration,
    max_segments: u32,
}

impl Default for ReassemblyStore {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_SEGMENTS)
    }
}

impl ReassemblyStore {
    pub fn new(idle_timeout: Duration, max_segments: u32) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
            max_segments,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Feed a segment from `sender`
    pub fn ingest(&self, sender: &str, segment: Segment) -> SessionResult<IngestOutcome> {
        self.ingest_at(sender, segment, Instant::now())
    }

    /// [`ReassemblyStore::ingest`] with an explicit clock
    pub fn ingest_at(
        &self,
        sender: &str,
        segment: Segment,
        now: Instant,
    ) -> SessionResult<IngestOutcome> {
        segment.validate()?;
        if segment.total > self.max_segments {
            return Err(SessionError::TooManySegments {
                total: segment.total,
                max: self.max_segments,
            });
        }

        // Must run before taking the entry lock below
        self.evict_stale(now);

        match self.sessions.entry(sender.to_string()) {
            Entry::Occupied(mut occupied) => {
                let session = occupied.get_mut();

                if session.is_stale(now, self.idle_timeout) {
                    tracing::debug!(sender, "replacing stale reassembly session");
                    *session = ReassemblySession::new(segment.total, now);
                } else if session.total() != segment.total {
                    tracing::warn!(
                        sender,
                        old_total = session.total(),
                        new_total = segment.total,
                        received = session.received_count(),
                        "segment total changed, discarding pending session"
                    );
                    *session = ReassemblySession::new(segment.total, now);
                }

                if !session.fill(segment, now) {
                    tracing::debug!(sender, "duplicate segment index overwritten");
                }

                if session.is_complete() {
                    let (_, session) = occupied.remove_entry();
                    return Ok(IngestOutcome::Complete(session.join()?));
                }

                Ok(IngestOutcome::Pending {
                    received: session.received_count(),
                    total: session.total(),
                })
            }
            Entry::Vacant(vacant) => {
                let mut session = ReassemblySession::new(segment.total, now);
                session.fill(segment, now);

                if session.is_complete() {
                    return Ok(IngestOutcome::Complete(session.join()?));
                }

                let outcome = IngestOutcome::Pending {
                    received: session.received_count(),
                    total: session.total(),
                };
                vacant.insert(session);
                Ok(outcome)
            }
        }
    }

    /// Drop sessions idle past the threshold. Returns how many were removed.
    pub fn evict_stale(&self, now: Instant) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|sender, session| {
            let stale = session.is_stale(now, self.idle_timeout);
            if stale {
                tracing::info!(
                    sender = %sender,
                    received = session.received_count(),
                    total = session.total(),
                    missing = ?session.missing(),
                    "evicting incomplete reassembly session"
                );
            }
            !stale
        });
        before.saturating_sub(self.sessions.len())
    }

    /// Snapshot of a sender's pending session, if it is still live
    pub fn session(&self, sender: &str) -> Option<ReassemblySession> {
        self.session_at(sender, Instant::now())
    }

    pub fn session_at(&self, sender: &str, now: Instant) -> Option<ReassemblySession> {
        self.sessions
            .get(sender)
            .filter(|session| !session.is_stale(now, self.idle_timeout))
            .map(|session| session.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{split, SegmentError};
    use std::sync::Arc;

    const SENDER: &str = "+15550001111";

    fn payload_of(len: usize) -> String {
        let mut payload = String::from("ELINK::");
        payload.extend("0123456789abcdef".chars().cycle().take(len - payload.len()));
        payload
    }

    #[test]
    fn test_out_of_order_completion() {
        let store = ReassemblyStore::default();
        let payload = payload_of(300);
        let segments = split(&payload, 140).unwrap();

        let first = store.ingest(SENDER, segments[2].clone()).unwrap();
        assert_eq!(first, IngestOutcome::Pending { received: 1, total: 3 });

        let second = store.ingest(SENDER, segments[0].clone()).unwrap();
        assert_eq!(second, IngestOutcome::Pending { received: 2, total: 3 });

        match store.ingest(SENDER, segments[1].clone()).unwrap() {
            IngestOutcome::Complete(joined) => assert_eq!(joined.as_str(), payload),
            other => panic!("expected completion, got {other:?}"),
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_completes_only_when_every_index_filled() {
        let store = ReassemblyStore::default();
        let segments = split(&payload_of(300), 140).unwrap();

        // Same index three times never completes a three-part session
        for _ in 0..3 {
            let outcome = store.ingest(SENDER, segments[0].clone()).unwrap();
            assert!(!outcome.is_complete());
        }
        assert_eq!(store.session(SENDER).unwrap().received_count(), 1);
    }

    #[test]
    fn test_resent_index_last_write_wins() {
        let store = ReassemblyStore::default();

        store
            .ingest(SENDER, Segment::new(1, 2, "ELINK::old").unwrap())
            .unwrap();
        store
            .ingest(SENDER, Segment::new(1, 2, "ELINK::new").unwrap())
            .unwrap();
        let outcome = store
            .ingest(SENDER, Segment::new(2, 2, "Tail").unwrap())
            .unwrap();

        assert_eq!(
            outcome,
            IngestOutcome::Complete("ELINK::newTail".to_string().into())
        );
    }

    #[test]
    fn test_total_mismatch_discards_old_session() {
        let store = ReassemblyStore::default();

        store
            .ingest(SENDER, Segment::new(1, 3, "ELINK::aaa").unwrap())
            .unwrap();
        let outcome = store
            .ingest(SENDER, Segment::new(2, 2, "bb").unwrap())
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Pending { received: 1, total: 2 });

        let outcome = store
            .ingest(SENDER, Segment::new(1, 2, "ELINK::").unwrap())
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Complete("ELINK::bb".to_string().into()));
    }

    #[test]
    fn test_senders_are_isolated() {
        let store = ReassemblyStore::default();

        store
            .ingest("+1", Segment::new(1, 2, "ELINK::a").unwrap())
            .unwrap();
        store
            .ingest("+2", Segment::new(1, 2, "ELINK::b").unwrap())
            .unwrap();
        assert_eq!(store.len(), 2);

        let outcome = store
            .ingest("+1", Segment::new(2, 2, "A").unwrap())
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Complete("ELINK::aA".to_string().into()));
        assert!(store.session("+2").is_some());
    }

    #[test]
    fn test_single_part_tag_completes_immediately() {
        let store = ReassemblyStore::default();
        let outcome = store
            .ingest(SENDER, Segment::new(1, 1, "ELINK::x").unwrap())
            .unwrap();

        assert!(outcome.is_complete());
        assert!(store.is_empty());
    }

    #[test]
    fn test_eviction_and_fresh_restart() {
        let idle = Duration::from_secs(60);
        let store = ReassemblyStore::new(idle, DEFAULT_MAX_SEGMENTS);
        let start = Instant::now();

        store
            .ingest_at(SENDER, Segment::new(1, 2, "ELINK::stale").unwrap(), start)
            .unwrap();

        let later = start + idle + Duration::from_secs(1);
        assert!(store.session_at(SENDER, later).is_none());
        assert_eq!(store.evict_stale(later), 1);
        assert!(store.is_empty());

        // The late tail must not complete against stale data
        let outcome = store
            .ingest_at(SENDER, Segment::new(2, 2, "tail").unwrap(), later)
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Pending { received: 1, total: 2 });
        assert_eq!(store.session_at(SENDER, later).unwrap().missing(), vec![1]);
    }

    #[test]
    fn test_stale_session_replaced_on_ingest() {
        let idle = Duration::from_secs(60);
        let store = ReassemblyStore::new(idle, DEFAULT_MAX_SEGMENTS);
        let start = Instant::now();

        store
            .ingest_at(SENDER, Segment::new(1, 2, "ELINK::stale").unwrap(), start)
            .unwrap();
        let outcome = store
            .ingest_at(
                SENDER,
                Segment::new(2, 2, "tail").unwrap(),
                start + Duration::from_secs(61),
            )
            .unwrap();

        assert!(!outcome.is_complete());
    }

    #[test]
    fn test_active_session_survives_sweep() {
        let idle = Duration::from_secs(60);
        let store = ReassemblyStore::new(idle, DEFAULT_MAX_SEGMENTS);
        let start = Instant::now();

        store
            .ingest_at(SENDER, Segment::new(1, 2, "ELINK::a").unwrap(), start)
            .unwrap();

        assert_eq!(store.evict_stale(start + Duration::from_secs(30)), 0);
        assert!(store.session_at(SENDER, start + Duration::from_secs(30)).is_some());
    }

    #[test]
    fn test_rejects_oversized_total() {
        let store = ReassemblyStore::new(DEFAULT_IDLE_TIMEOUT, 4);
        let result = store.ingest(SENDER, Segment::new(1, 5, "x").unwrap());

        assert_eq!(
            result,
            Err(SessionError::TooManySegments { total: 5, max: 4 })
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_rejects_hand_built_segment_outside_range() {
        let store = ReassemblyStore::default();

        for index in [0, 4] {
            let segment = Segment {
                index,
                total: 3,
                content: "ELINK::x".into(),
            };
            let result = store.ingest(SENDER, segment);
            assert!(matches!(
                result,
                Err(SessionError::Segment(SegmentError::MalformedSegmentTag(_)))
            ));
        }

        let zero_total = Segment {
            index: 1,
            total: 0,
            content: "x".into(),
        };
        assert!(store.ingest(SENDER, zero_total).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_segments_from_one_sender() {
        let store = Arc::new(ReassemblyStore::default());
        let payload = payload_of(16 * 20);
        let segments = split(&payload, 20).unwrap();
        assert_eq!(segments.len(), 16);

        let outcomes: Vec<IngestOutcome> = std::thread::scope(|scope| {
            let handles: Vec<_> = segments
                .iter()
                .cloned()
                .map(|segment| {
                    let store = Arc::clone(&store);
                    scope.spawn(move || store.ingest(SENDER, segment).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let completed: Vec<_> = outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                IngestOutcome::Complete(joined) => Some(joined),
                IngestOutcome::Pending { .. } => None,
            })
            .collect();

        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].as_str(), payload);
        assert!(store.is_empty());
    }
}
