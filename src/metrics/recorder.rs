//! Metrics recorder for relay operations
//!
//! Thin wrappers over the `metrics` facade. Without an installed recorder
//! every call is a no-op, so tests and the encode CLI pay nothing.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    describe_counter!(
        "echolink_messages_received_total",
        "Inbound SMS messages accepted by the webhook"
    );
    describe_counter!(
        "echolink_segments_buffered_total",
        "Segments stored while waiting for the rest of a multipart payload"
    );
    describe_counter!(
        "echolink_payloads_reassembled_total",
        "Multipart payloads completed"
    );
    describe_counter!(
        "echolink_sessions_evicted_total",
        "Reassembly sessions dropped after the idle timeout"
    );
    describe_counter!(
        "echolink_outcomes_total",
        "Terminal relay outcomes, labelled by outcome"
    );
    describe_counter!(
        "echolink_replies_failed_total",
        "Status replies the SMS gateway did not accept"
    );

    describe_gauge!(
        "echolink_active_sessions",
        "Reassembly sessions currently buffered"
    );
    describe_gauge!(
        "echolink_replay_entries",
        "Transaction ids inside the replay window"
    );
    describe_gauge!(
        "echolink_in_flight",
        "Payloads currently being submitted or polled"
    );

    describe_histogram!(
        "echolink_submit_duration_seconds",
        "Time for the node to answer a submission"
    );
    describe_histogram!(
        "echolink_confirmation_duration_seconds",
        "Time from submission to a terminal poll result"
    );
    describe_histogram!(
        "echolink_payload_bytes",
        "Size of decoded raw transactions"
    );
}

// ============== Inbound ==============

pub fn record_message_received() {
    counter!("echolink_messages_received_total").increment(1);
}

pub fn record_segment_buffered(received: u32, total: u32) {
    counter!("echolink_segments_buffered_total").increment(1);
    tracing::trace!(received, total, "segment buffered");
}

pub fn record_payload_reassembled(segments: u32) {
    counter!("echolink_payloads_reassembled_total", "segments" => segments.to_string())
        .increment(1);
}

pub fn record_sessions_evicted(count: usize) {
    counter!("echolink_sessions_evicted_total").increment(count as u64);
}

pub fn record_payload_size(bytes: usize) {
    histogram!("echolink_payload_bytes").record(bytes as f64);
}

// ============== Outcomes ==============

/// Record a terminal outcome by its label
pub fn record_outcome(label: &'static str) {
    counter!("echolink_outcomes_total", "outcome" => label).increment(1);
}

pub fn record_reply_failed() {
    counter!("echolink_replies_failed_total").increment(1);
}

pub fn record_submit_duration(duration: Duration) {
    histogram!("echolink_submit_duration_seconds").record(duration.as_secs_f64());
}

// ============== Gauges ==============

pub fn set_active_sessions(count: usize) {
    gauge!("echolink_active_sessions").set(count as f64);
}

pub fn set_replay_entries(count: usize) {
    gauge!("echolink_replay_entries").set(count as f64);
}

pub fn set_in_flight(count: usize) {
    gauge!("echolink_in_flight").set(count as f64);
}

/// Times one submission from node acceptance to a terminal poll result
pub struct ConfirmationTimer {
    start_time: Instant,
}

impl ConfirmationTimer {
    pub fn start() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Stop timing and record under the outcome label
    pub fn stop(self, outcome: &'static str) {
        histogram!("echolink_confirmation_duration_seconds", "outcome" => outcome)
            .record(self.start_time.elapsed().as_secs_f64());
    }
}
