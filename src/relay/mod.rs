//! SMS-to-ledger relay
//!
//! The orchestration layer of the bridge:
//! - multipart reassembly per sender
//! - payload decoding and replay rejection
//! - submission with confirmation polling
//! - status replies to the sender

pub mod poller;
pub mod types;
pub mod workflow;

pub use poller::{ConfirmationPoller, PollStatus, DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL};
pub use types::{replies, RejectReason, RelayOutcome, RelayStats};
pub use workflow::{RelayWorkflow, RelayWorkflowBuilder, WorkflowSettings};
