//! Replay protection for relayed transactions

pub mod guard;

pub use guard::{ReplayGuard, TxId, DEFAULT_RETENTION};
