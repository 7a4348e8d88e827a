//! In-memory doubles for the relay's external seams
//!
//! ```ignore
//! let ledger = Arc::new(MockLedger::new());
//! let sink = Arc::new(RecordingSink::new());
//! let relay = RelayWorkflowBuilder::new(ledger.clone(), sink.clone()).build();
//! ```

pub mod ledger;
pub mod sink;

pub use ledger::MockLedger;
pub use sink::RecordingSink;
