//! Relay outcomes, statistics and reply texts

use serde::{Deserialize, Serialize};

use crate::ledger::{Receipt, TxHandle};
use crate::replay::TxId;

/// Why a message was dropped without reaching the network, or failed there
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Payload failed codec decoding
    InvalidFormat(String),
    /// Segment tag could not be parsed or declared too many parts
    MalformedSegment(String),
    /// Node refused the transaction or could not be reached
    Network(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::InvalidFormat(e) => write!(f, "invalid format: {e}"),
            RejectReason::MalformedSegment(e) => write!(f, "malformed segment: {e}"),
            RejectReason::Network(e) => write!(f, "network error: {e}"),
        }
    }
}

/// Terminal result for one inbound payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayOutcome {
    /// Accepted by the node; confirmation polling disabled
    Submitted { tx_id: TxId, handle: TxHandle },
    Confirmed {
        tx_id: TxId,
        handle: TxHandle,
        block_number: u64,
    },
    TimedOut { tx_id: TxId, handle: TxHandle },
    Rejected(RejectReason),
    DuplicateIgnored { tx_id: TxId },
}

impl RelayOutcome {
    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            RelayOutcome::Submitted { .. } => "submitted",
            RelayOutcome::Confirmed { .. } => "confirmed",
            RelayOutcome::TimedOut { .. } => "timed_out",
            RelayOutcome::Rejected(_) => "rejected",
            RelayOutcome::DuplicateIgnored { .. } => "duplicate",
        }
    }
}

/// Counters exposed on the stats endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayStats {
    pub messages_received: u64,
    pub segments_buffered: u64,
    pub payloads_reassembled: u64,
    pub sessions_evicted: u64,
    pub malformed: u64,
    pub duplicates: u64,
    pub submitted: u64,
    pub confirmed: u64,
    pub timed_out: u64,
    pub rejected: u64,
    pub replies_failed: u64,
    pub active_sessions: u64,
    pub replay_entries: u64,
}

impl RelayStats {
    /// Share of submitted transactions seen in a block
    pub fn confirmation_rate(&self) -> f64 {
        if self.submitted == 0 {
            return 0.0;
        }
        self.confirmed as f64 / self.submitted as f64 * 100.0
    }
}

impl std::fmt::Display for RelayStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Relay: {} sms, {} submitted, {} confirmed ({:.1}%), {} timed out, {} rejected, {} dup",
            self.messages_received,
            self.submitted,
            self.confirmed,
            self.confirmation_rate(),
            self.timed_out,
            self.rejected,
            self.duplicates
        )
    }
}

/// SMS reply texts. Plain ASCII keeps each reply in a single GSM-7 message.
pub mod replies {
    use super::*;

    const BRAND: &str = "EchoLink";
    const ERROR_SNIPPET_CHARS: usize = 20;
    const HASH_PREVIEW_CHARS: usize = 10;

    pub fn duplicate() -> String {
        format!("{BRAND}: Duplicate Tx ignored.")
    }

    pub fn malformed() -> String {
        format!("{BRAND}: Message could not be decoded. Please resend.")
    }

    pub fn submitted(handle: &TxHandle) -> String {
        format!(
            "{BRAND}: Tx sent! Hash: {}...",
            handle.abbreviated(HASH_PREVIEW_CHARS)
        )
    }

    pub fn confirmed(receipt: &Receipt, block_number: u64) -> String {
        match receipt.success {
            Some(false) => format!("{BRAND}: Included in block {block_number} but reverted."),
            _ => format!("{BRAND}: Confirmed! Mined in block {block_number}."),
        }
    }

    /// `explorer_url` may contain a `{hash}` placeholder
    pub fn timed_out(handle: &TxHandle, explorer_url: Option<&str>) -> String {
        match explorer_url {
            Some(template) => format!(
                "{BRAND}: Timeout. Check explorer: {}",
                template.replace("{hash}", handle.as_str())
            ),
            None => format!("{BRAND}: Timeout. Check explorer for {handle}"),
        }
    }

    pub fn submission_failed(error: &str) -> String {
        format!("{BRAND}: Error: {}", truncate_chars(error, ERROR_SNIPPET_CHARS))
    }

    pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
        match text.char_indices().nth(max_chars) {
            Some((offset, _)) => &text[..offset],
            None => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> TxHandle {
        TxHandle("0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204".into())
    }

    #[test]
    fn test_submission_error_is_truncated() {
        let reply = replies::submission_failed("insufficient funds for gas * price + value");
        assert_eq!(reply, "EchoLink: Error: insufficient funds f");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(replies::truncate_chars("ééé", 2), "éé");
        assert_eq!(replies::truncate_chars("ab", 5), "ab");
    }

    #[test]
    fn test_submitted_reply_shows_hash_prefix() {
        assert_eq!(
            replies::submitted(&handle()),
            "EchoLink: Tx sent! Hash: 0x5c504ed4..."
        );
    }

    #[test]
    fn test_timeout_reply_uses_explorer_template() {
        let reply = replies::timed_out(&handle(), Some("https://sepolia.etherscan.io/tx/{hash}"));
        assert!(reply.ends_with("https://sepolia.etherscan.io/tx/0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204"));
        assert!(replies::timed_out(&handle(), None).contains("Check explorer"));
    }

    #[test]
    fn test_confirmed_reply_mentions_revert() {
        let mut receipt = Receipt {
            tx_hash: handle().0,
            block_number: Some(42),
            success: Some(true),
        };
        assert!(replies::confirmed(&receipt, 42).contains("block 42"));

        receipt.success = Some(false);
        assert!(replies::confirmed(&receipt, 42).contains("reverted"));
    }

    #[test]
    fn test_relay_stats_rate() {
        let stats = RelayStats {
            submitted: 4,
            confirmed: 3,
            ..Default::default()
        };
        assert!((stats.confirmation_rate() - 75.0).abs() < 0.1);
        assert_eq!(RelayStats::default().confirmation_rate(), 0.0);
    }

    #[test]
    fn test_outcome_labels() {
        let outcome = RelayOutcome::Rejected(RejectReason::InvalidFormat("x".into()));
        assert_eq!(outcome.label(), "rejected");
    }
}
