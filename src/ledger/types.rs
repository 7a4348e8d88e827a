use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    /// Error text for the sender: the node's own message when it gave one
    pub fn reason(&self) -> String {
        match self {
            LedgerError::Rpc { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Network-assigned handle of a submitted transaction (its hash)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle(pub String);

impl TxHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `n` characters, for SMS-sized replies
    pub fn abbreviated(&self, n: usize) -> &str {
        match self.0.char_indices().nth(n) {
            Some((offset, _)) => &self.0[..offset],
            None => &self.0,
        }
    }
}

impl std::fmt::Display for TxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusion receipt for a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: String,
    /// Set once the transaction is in a block
    pub block_number: Option<u64>,
    /// Execution status, when the node reports one
    pub success: Option<bool>,
}

impl Receipt {
    pub fn is_included(&self) -> bool {
        self.block_number.is_some()
    }
}

/// Submission and receipt lookup against the blockchain network
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn submit(&self, raw_tx: &[u8]) -> LedgerResult<TxHandle>;

    async fn get_receipt(&self, handle: &TxHandle) -> LedgerResult<Option<Receipt>>;
}
