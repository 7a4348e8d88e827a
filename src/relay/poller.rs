//! Confirmation polling for submitted transactions

use std::time::Duration;

use tokio::sync::watch;

use crate::ledger::{LedgerClient, Receipt, TxHandle};

pub const DEFAULT_POLL_ATTEMPTS: u32 = 5;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// How a confirmation poll ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Confirmed { receipt: Receipt, attempts: u32 },
    TimedOut { attempts: u32 },
    /// Relay shutdown interrupted the wait between attempts
    Cancelled { attempts: u32 },
}

/// Fixed-interval receipt poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPoller {
    max_attempts: u32,
    interval: Duration,
}

impl Default for ConfirmationPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL)
    }
}

impl ConfirmationPoller {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Query for a receipt up to `max_attempts` times, sleeping `interval`
    /// between attempts (not after the last). Query errors count as a
    /// failed attempt.
    pub async fn poll(
        &self,
        ledger: &dyn LedgerClient,
        handle: &TxHandle,
        mut shutdown: watch::Receiver<bool>,
    ) -> PollStatus {
        tracing::info!(tx = %handle, attempts = self.max_attempts, "watching for confirmation");

        for attempt in 1..=self.max_attempts {
            match ledger.get_receipt(handle).await {
                Ok(Some(receipt)) if receipt.is_included() => {
                    tracing::info!(
                        tx = %handle,
                        block = receipt.block_number,
                        attempt,
                        "transaction confirmed"
                    );
                    return PollStatus::Confirmed {
                        receipt,
                        attempts: attempt,
                    };
                }
                Ok(_) => {
                    tracing::debug!(tx = %handle, attempt, "no receipt yet");
                }
                Err(e) => {
                    tracing::warn!(tx = %handle, attempt, error = %e, "receipt query failed");
                }
            }

            if attempt < self.max_attempts {
                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {}
                    _ = shutdown_requested(&mut shutdown) => {
                        tracing::info!(tx = %handle, attempt, "confirmation poll cancelled");
                        return PollStatus::Cancelled { attempts: attempt };
                    }
                }
            }
        }

        tracing::info!(tx = %handle, "confirmation poll timed out");
        PollStatus::TimedOut {
            attempts: self.max_attempts,
        }
    }
}

/// Resolves once shutdown is signalled; never resolves if the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
