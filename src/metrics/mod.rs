//! Metrics and observability
//!
//! Prometheus-compatible metrics for the relay:
//! - inbound messages, buffered segments and reassembled payloads
//! - terminal outcomes (confirmed, timed out, rejected, duplicate)
//! - reassembly sessions and replay window size
//! - submission and confirmation latency

pub mod exporter;
pub mod recorder;

pub use exporter::{metrics_route, render_metrics, start_metrics_server, MetricsConfig, MetricsError};
pub use recorder::{init_metrics, ConfirmationTimer};
