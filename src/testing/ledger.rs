use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::ledger::{LedgerClient, LedgerError, LedgerResult, Receipt, TxHandle};

/// Scriptable in-memory ledger
///
/// Receipts stay `None` until [`MockLedger::confirm_after`] is configured.
#[derive(Default)]
pub struct MockLedger {
    submissions: Mutex<Vec<Vec<u8>>>,
    receipt_queries: AtomicU32,
    failing_queries: AtomicU32,
    confirm_after: Mutex<Option<(u32, u64)>>,
    submit_error: Mutex<Option<String>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report inclusion in `block` from the `attempt`-th receipt query onward
    pub fn confirm_after(&self, attempt: u32, block: u64) {
        *self.confirm_after.lock() = Some((attempt, block));
    }

    /// Make the first `count` receipt queries fail
    pub fn fail_receipt_queries(&self, count: u32) {
        self.failing_queries.store(count, Ordering::SeqCst);
    }

    /// Make every submission fail with `message`
    pub fn reject_submissions(&self, message: impl Into<String>) {
        *self.submit_error.lock() = Some(message.into());
    }

    /// Raw transactions submitted so far (including rejected ones)
    pub fn submissions(&self) -> Vec<Vec<u8>> {
        self.submissions.lock().clone()
    }

    pub fn receipt_queries(&self) -> u32 {
        self.receipt_queries.load(Ordering::SeqCst)
    }

    /// Handle the mock assigns to a raw transaction
    pub fn handle_for(raw_tx: &[u8]) -> TxHandle {
        TxHandle(format!("0x{}", blake3::hash(raw_tx).to_hex()))
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn submit(&self, raw_tx: &[u8]) -> LedgerResult<TxHandle> {
        self.submissions.lock().push(raw_tx.to_vec());

        if let Some(message) = self.submit_error.lock().clone() {
            return Err(LedgerError::Rpc {
                code: -32000,
                message,
            });
        }

        Ok(Self::handle_for(raw_tx))
    }

    async fn get_receipt(&self, handle: &TxHandle) -> LedgerResult<Option<Receipt>> {
        let query = self.receipt_queries.fetch_add(1, Ordering::SeqCst) + 1;

        if query <= self.failing_queries.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("scripted receipt failure".into()));
        }

        let confirm_after = *self.confirm_after.lock();
        Ok(match confirm_after {
            Some((attempt, block)) if query >= attempt => Some(Receipt {
                tx_hash: handle.0.clone(),
                block_number: Some(block),
                success: Some(true),
            }),
            _ => None,
        })
    }
}
