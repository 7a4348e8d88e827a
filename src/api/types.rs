use crate::relay::RelayStats;
use serde::{Deserialize, Serialize};

/// Body of every webhook acknowledgement
pub const WEBHOOK_ACK: &str = "Received";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: RelayStats,
    pub confirmation_rate: f64,
    pub in_flight: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}
