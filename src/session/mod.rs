//! Per-sender reassembly of multipart SMS payloads

pub mod error;
pub mod store;
pub mod types;

pub use error::{SessionError, SessionResult};
pub use store::{ReassemblyStore, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_SEGMENTS};
pub use types::{IngestOutcome, ReassemblySession};
