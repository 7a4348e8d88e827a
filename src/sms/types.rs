use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type SmsResult<T> = Result<T, SmsError>;

#[derive(Debug, Error)]
pub enum SmsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Inbound SMS as delivered by the gateway webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundSms {
    /// Origin address of the sender
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
}

impl InboundSms {
    pub fn new(from: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            body: body.into(),
        }
    }
}

/// Outbound SMS channel used for status replies
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> SmsResult<()>;
}

/// Sink that only logs, used when no gateway credentials are configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl ReplySink for LogSink {
    async fn send(&self, to: &str, body: &str) -> SmsResult<()> {
        tracing::info!(to, body, "reply (mock sink, not sent)");
        Ok(())
    }
}
