//! Blockchain network access
//!
//! The relay only needs two calls: submit a raw signed transaction and look
//! up its receipt. [`LedgerClient`] is the seam; [`JsonRpcLedger`] talks to an
//! Ethereum-compatible node.

pub mod rpc;
pub mod types;

pub use rpc::{JsonRpcLedger, DEFAULT_RPC_URL};
pub use types::{LedgerClient, LedgerError, LedgerResult, Receipt, TxHandle};
