//! Relay workflow
//!
//! Takes inbound SMS bodies through reassembly, decoding, replay checks,
//! submission and confirmation polling, and reports back to the sender.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::codec::{EncodedPayload, TxCodec};
use crate::ledger::{LedgerClient, TxHandle};
use crate::metrics::{recorder, ConfirmationTimer};
use crate::relay::poller::{ConfirmationPoller, PollStatus};
use crate::relay::types::{replies, RejectReason, RelayOutcome, RelayStats};
use crate::replay::{ReplayGuard, TxId};
use crate::segment::{is_multipart, Segment};
use crate::session::{IngestOutcome, ReassemblyStore, SessionError};
use crate::sms::{InboundSms, ReplySink};

/// Longest body prefix written to logs
const LOG_BODY_CHARS: usize = 24;

/// Reply behaviour knobs
#[derive(Debug, Clone, Default)]
pub struct WorkflowSettings {
    /// Send a generic reply when a payload cannot be decoded
    pub reply_on_malformed: bool,
    /// Explorer link for timeout replies; `{hash}` is substituted
    pub explorer_url: Option<String>,
}

/// The SMS-to-ledger bridge
pub struct RelayWorkflow {
    codec: TxCodec,
    sessions: ReassemblyStore,
    replay: ReplayGuard,
    ledger: Arc<dyn LedgerClient>,
    replies: Arc<dyn ReplySink>,
    poller: ConfirmationPoller,
    settings: WorkflowSettings,
    stats: Arc<RelayStatsInner>,
    shutdown: watch::Sender<bool>,
    in_flight: Arc<InFlight>,
}

#[derive(Default)]
struct RelayStatsInner {
    messages_received: AtomicU64,
    segments_buffered: AtomicU64,
    payloads_reassembled: AtomicU64,
    sessions_evicted: AtomicU64,
    malformed: AtomicU64,
    duplicates: AtomicU64,
    submitted: AtomicU64,
    confirmed: AtomicU64,
    timed_out: AtomicU64,
    rejected: AtomicU64,
    replies_failed: AtomicU64,
}

impl RelayStatsInner {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Send a status reply; failures are counted and otherwise ignored
async fn deliver(sink: &dyn ReplySink, stats: &RelayStatsInner, to: &str, body: &str) {
    if let Err(e) = sink.send(to, body).await {
        RelayStatsInner::bump(&stats.replies_failed);
        recorder::record_reply_failed();
        tracing::warn!(to, error = %e, "reply not delivered");
    }
}

/// Count of spawned handlers still running
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        let now = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        recorder::set_in_flight(now);
        InFlightGuard(Arc::clone(self))
    }

    fn current(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let left = self.0.count.fetch_sub(1, Ordering::SeqCst) - 1;
        recorder::set_in_flight(left);
        if left == 0 {
            self.0.idle.notify_waiters();
        }
    }
}

impl RelayWorkflow {
    /// Process one inbound message to its terminal outcome
    ///
    /// Returns `None` while a multipart payload is still incomplete.
    pub async fn handle_inbound(&self, sms: InboundSms) -> Option<RelayOutcome> {
        let from = sms.from.as_str();
        let body = sms.body.trim();

        RelayStatsInner::bump(&self.stats.messages_received);
        recorder::record_message_received();
        tracing::debug!(
            from,
            body = replies::truncate_chars(body, LOG_BODY_CHARS),
            "inbound message"
        );

        let payload = if is_multipart(body) {
            self.accept_segment(from, body)?
        } else {
            EncodedPayload::new(body)
        };

        let outcome = match self.relay_payload(from, payload).await {
            Ok(outcome) | Err(outcome) => outcome,
        };
        self.finish(&outcome);
        Some(outcome)
    }

    /// Spawn [`RelayWorkflow::handle_inbound`] as a tracked task
    ///
    /// The task is counted as in flight from the moment this returns, so
    /// [`RelayWorkflow::wait_idle`] sees it even before it is first polled.
    pub fn spawn_inbound(self: &Arc<Self>, sms: InboundSms) -> JoinHandle<Option<RelayOutcome>> {
        let guard = self.in_flight.enter();
        let relay = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            relay.handle_inbound(sms).await
        })
    }

    /// Route a segment to the reassembly store
    ///
    /// `None` covers both a still-pending session and a dropped segment; a
    /// dropped one is counted and logged here.
    fn accept_segment(&self, from: &str, body: &str) -> Option<EncodedPayload> {
        let ingested = Segment::parse(body)
            .map_err(SessionError::from)
            .and_then(|segment| {
                let total = segment.total;
                self.sessions.ingest(from, segment).map(|outcome| (outcome, total))
            });

        match ingested {
            Ok((IngestOutcome::Pending { received, total }, _)) => {
                RelayStatsInner::bump(&self.stats.segments_buffered);
                recorder::record_segment_buffered(received, total);
                recorder::set_active_sessions(self.sessions.len());
                tracing::info!(from, received, total, "segment buffered");
                None
            }
            Ok((IngestOutcome::Complete(payload), total)) => {
                RelayStatsInner::bump(&self.stats.payloads_reassembled);
                recorder::record_payload_reassembled(total);
                recorder::set_active_sessions(self.sessions.len());
                tracing::info!(from, chars = payload.char_len(), "multipart payload reassembled");
                Some(payload)
            }
            Err(e) => {
                let outcome = RelayOutcome::Rejected(RejectReason::MalformedSegment(e.to_string()));
                RelayStatsInner::bump(&self.stats.malformed);
                tracing::warn!(from, error = %e, "dropping malformed segment");
                self.finish(&outcome);
                None
            }
        }
    }

    /// Decode, replay-check, submit and poll one complete payload
    ///
    /// `Err` carries an early terminal outcome.
    async fn relay_payload(
        &self,
        from: &str,
        payload: EncodedPayload,
    ) -> Result<RelayOutcome, RelayOutcome> {
        let raw_tx = match self.codec.decode_bytes(payload.as_str()) {
            Ok(raw) => raw,
            Err(e) => {
                RelayStatsInner::bump(&self.stats.malformed);
                tracing::warn!(from, error = %e, "payload rejected");
                if self.settings.reply_on_malformed {
                    self.reply(from, &replies::malformed()).await;
                }
                return Err(RelayOutcome::Rejected(RejectReason::InvalidFormat(
                    e.to_string(),
                )));
            }
        };
        recorder::record_payload_size(raw_tx.len());

        let tx_id = TxId::from_raw(&raw_tx);
        if self.replay.check_and_record(tx_id.clone()) {
            RelayStatsInner::bump(&self.stats.duplicates);
            tracing::info!(from, tx_id = tx_id.short(), "duplicate transaction ignored");
            self.reply(from, &replies::duplicate()).await;
            return Err(RelayOutcome::DuplicateIgnored { tx_id });
        }
        recorder::set_replay_entries(self.replay.len());

        let started = Instant::now();
        let handle = match self.ledger.submit(&raw_tx).await {
            Ok(handle) => handle,
            Err(e) => {
                let message = e.reason();
                tracing::error!(from, tx_id = tx_id.short(), error = %e, "submission failed");
                self.reply(from, &replies::submission_failed(&message)).await;
                return Err(RelayOutcome::Rejected(RejectReason::Network(message)));
            }
        };
        recorder::record_submit_duration(started.elapsed());

        RelayStatsInner::bump(&self.stats.submitted);
        tracing::info!(from, tx_id = tx_id.short(), tx = %handle, "transaction submitted");

        // Polling starts now; a slow gateway must not shift its schedule
        let submitted_reply = self.spawn_reply(from, replies::submitted(&handle));

        if self.poller.max_attempts() == 0 {
            let _ = submitted_reply.await;
            return Ok(RelayOutcome::Submitted { tx_id, handle });
        }

        Ok(self
            .await_confirmation(from, tx_id, handle, submitted_reply)
            .await)
    }

    /// Poll for inclusion, then send the final reply after `submitted_reply`
    async fn await_confirmation(
        &self,
        from: &str,
        tx_id: TxId,
        handle: TxHandle,
        submitted_reply: JoinHandle<()>,
    ) -> RelayOutcome {
        let timer = ConfirmationTimer::start();
        let status = self
            .poller
            .poll(&*self.ledger, &handle, self.shutdown.subscribe())
            .await;

        // Keep the sender's replies in order
        let _ = submitted_reply.await;

        match status {
            PollStatus::Confirmed { receipt, .. } => {
                // Included receipts always carry a block number
                let block_number = receipt.block_number.unwrap_or_default();
                self.reply(from, &replies::confirmed(&receipt, block_number))
                    .await;
                timer.stop("confirmed");
                RelayOutcome::Confirmed {
                    tx_id,
                    handle,
                    block_number,
                }
            }
            PollStatus::TimedOut { .. } | PollStatus::Cancelled { .. } => {
                self.reply(
                    from,
                    &replies::timed_out(&handle, self.settings.explorer_url.as_deref()),
                )
                .await;
                timer.stop("timed_out");
                RelayOutcome::TimedOut { tx_id, handle }
            }
        }
    }

    /// Count a terminal outcome
    fn finish(&self, outcome: &RelayOutcome) {
        let counter = match outcome {
            RelayOutcome::Confirmed { .. } => Some(&self.stats.confirmed),
            RelayOutcome::TimedOut { .. } => Some(&self.stats.timed_out),
            RelayOutcome::Rejected(_) => Some(&self.stats.rejected),
            RelayOutcome::Submitted { .. } | RelayOutcome::DuplicateIgnored { .. } => None,
        };
        if let Some(counter) = counter {
            RelayStatsInner::bump(counter);
        }
        recorder::record_outcome(outcome.label());
    }

    async fn reply(&self, to: &str, body: &str) {
        deliver(&*self.replies, &self.stats, to, body).await;
    }

    /// Send a reply in the background, tracked as in flight
    fn spawn_reply(&self, to: &str, body: String) -> JoinHandle<()> {
        let guard = self.in_flight.enter();
        let sink = Arc::clone(&self.replies);
        let stats = Arc::clone(&self.stats);
        let to = to.to_string();

        tokio::spawn(async move {
            let _guard = guard;
            deliver(&*sink, &stats, &to, &body).await;
        })
    }

    /// Evict idle sessions and expired replay entries
    pub fn maintenance_cycle(&self) {
        self.maintenance_cycle_at(Instant::now());
    }

    /// [`RelayWorkflow::maintenance_cycle`] with an explicit clock
    pub fn maintenance_cycle_at(&self, now: Instant) {
        let evicted = self.sessions.evict_stale(now);
        let expired = self.replay.sweep(now);

        if evicted > 0 {
            self.stats
                .sessions_evicted
                .fetch_add(evicted as u64, Ordering::Relaxed);
            recorder::record_sessions_evicted(evicted);
        }
        recorder::set_active_sessions(self.sessions.len());
        recorder::set_replay_entries(self.replay.len());

        if evicted > 0 || expired > 0 {
            tracing::debug!(evicted, expired, "maintenance cycle");
        }
    }

    /// Run [`RelayWorkflow::maintenance_cycle`] every `interval` until shutdown
    pub fn spawn_maintenance(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let relay = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => relay.maintenance_cycle(),
                    _ = shutdown.wait_for(|stop| *stop) => break,
                }
            }
            tracing::debug!("maintenance task stopped");
        })
    }

    /// Signal shutdown: pending polls end early and maintenance stops
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Number of spawned handlers still running
    pub fn in_flight(&self) -> usize {
        self.in_flight.current()
    }

    /// Wait until every spawned handler has finished
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight.current() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Current counters
    pub fn stats(&self) -> RelayStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        RelayStats {
            messages_received: load(&self.stats.messages_received),
            segments_buffered: load(&self.stats.segments_buffered),
            payloads_reassembled: load(&self.stats.payloads_reassembled),
            sessions_evicted: load(&self.stats.sessions_evicted),
            malformed: load(&self.stats.malformed),
            duplicates: load(&self.stats.duplicates),
            submitted: load(&self.stats.submitted),
            confirmed: load(&self.stats.confirmed),
            timed_out: load(&self.stats.timed_out),
            rejected: load(&self.stats.rejected),
            replies_failed: load(&self.stats.replies_failed),
            active_sessions: self.sessions.len() as u64,
            replay_entries: self.replay.len() as u64,
        }
    }

    pub fn sessions(&self) -> &ReassemblyStore {
        &self.sessions
    }

    pub fn replay_guard(&self) -> &ReplayGuard {
        &self.replay
    }

    pub fn codec(&self) -> &TxCodec {
        &self.codec
    }
}

/// Builder for relay workflows
pub struct RelayWorkflowBuilder {
    ledger: Arc<dyn LedgerClient>,
    replies: Arc<dyn ReplySink>,
    codec: TxCodec,
    sessions: ReassemblyStore,
    replay: ReplayGuard,
    poller: ConfirmationPoller,
    settings: WorkflowSettings,
}

impl RelayWorkflowBuilder {
    pub fn new(ledger: Arc<dyn LedgerClient>, replies: Arc<dyn ReplySink>) -> Self {
        Self {
            ledger,
            replies,
            codec: TxCodec::default(),
            sessions: ReassemblyStore::default(),
            replay: ReplayGuard::default(),
            poller: ConfirmationPoller::default(),
            settings: WorkflowSettings::default(),
        }
    }

    pub fn codec(mut self, codec: TxCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn sessions(mut self, sessions: ReassemblyStore) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn replay_guard(mut self, replay: ReplayGuard) -> Self {
        self.replay = replay;
        self
    }

    pub fn poller(mut self, poller: ConfirmationPoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn reply_on_malformed(mut self, enabled: bool) -> Self {
        self.settings.reply_on_malformed = enabled;
        self
    }

    pub fn explorer_url(mut self, template: impl Into<String>) -> Self {
        self.settings.explorer_url = Some(template.into());
        self
    }

    pub fn build(self) -> RelayWorkflow {
        let (shutdown, _) = watch::channel(false);

        RelayWorkflow {
            codec: self.codec,
            sessions: self.sessions,
            replay: self.replay,
            ledger: self.ledger,
            replies: self.replies,
            poller: self.poller,
            settings: self.settings,
            stats: Arc::new(RelayStatsInner::default()),
            shutdown,
            in_flight: Arc::new(InFlight::default()),
        }
    }
}
