//! Configuration for the relay node.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $ECHOLINK_CONFIG (explicit override)
//!   2. ./echolink.toml

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::codec::{CompressionMode, HexPrefix, TxCodec};
use crate::ledger::DEFAULT_RPC_URL;
use crate::metrics::MetricsConfig;
use crate::relay::{ConfirmationPoller, RelayWorkflowBuilder};
use crate::replay::ReplayGuard;
use crate::segment::DEFAULT_MAX_SEGMENT_SIZE;
use crate::session::ReassemblyStore;
use crate::sms::TwilioCredentials;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub protocol: ProtocolConfig,
    pub session: SessionConfig,
    pub replay: ReplayConfig,
    pub poller: PollerConfig,
    pub ledger: LedgerConfig,
    pub sms: SmsConfig,
    pub replies: RepliesConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// How long shutdown waits for in-flight messages.
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Characters per SMS segment, used by `echolink-encode`.
    pub max_segment_size: usize,
    pub hex_prefix: HexPrefix,
    pub compression: CompressionMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Drop a multipart session after this long without a new segment.
    pub idle_timeout_secs: u64,
    /// Largest segment count a sender may declare.
    pub max_segments: u32,
    /// Period of the eviction/sweep maintenance task.
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub retention_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Receipt queries per transaction. 0 = reply once submitted, no polling.
    pub attempts: u32,
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub rpc_url: String,
    /// Block explorer link for timeout replies, `{hash}` is substituted.
    pub explorer_url: Option<String>,
}

/// Twilio account. All three must be set, otherwise replies are only logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RepliesConfig {
    /// Tell senders when their payload could not be decoded.
    pub reply_on_malformed: bool,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            shutdown_grace_secs: 10,
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            hex_prefix: HexPrefix::Required,
            compression: CompressionMode::Lz4,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 5 * 60,
            max_segments: 64,
            sweep_interval_secs: 30,
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            retention_secs: 10 * 60,
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval_secs: 15,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            explorer_url: None,
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl RelayConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            RelayConfig::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("ECHOLINK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("echolink.toml"))
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// `PORT` keeps the configured host; `ECHOLINK_LISTEN_ADDR` replaces both
    /// and wins when both are set.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PORT") {
            let port = v
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PORT", v.clone()))?;
            self.server.listen_addr.set_port(port);
        }
        if let Some(v) = lookup("ECHOLINK_LISTEN_ADDR") {
            self.server.listen_addr = v
                .parse()
                .map_err(|_| ConfigError::InvalidValue("ECHOLINK_LISTEN_ADDR", v.clone()))?;
        }
        if let Some(v) = lookup("ECHOLINK_RPC_URL") {
            self.ledger.rpc_url = v;
        }
        if let Some(v) = lookup("ECHOLINK_METRICS_ADDR") {
            self.metrics.listen_addr = v
                .parse()
                .map_err(|_| ConfigError::InvalidValue("ECHOLINK_METRICS_ADDR", v.clone()))?;
        }
        if let Some(v) = lookup("TWILIO_ACCOUNT_SID") {
            self.sms.account_sid = Some(v);
        }
        if let Some(v) = lookup("TWILIO_AUTH_TOKEN") {
            self.sms.auth_token = Some(v);
        }
        if let Some(v) = lookup("TWILIO_PHONE_NUMBER") {
            self.sms.from_number = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol.max_segment_size == 0 {
            return Err(ConfigError::InvalidValue(
                "protocol.max_segment_size",
                "must be at least 1".into(),
            ));
        }
        if self.session.max_segments == 0 {
            return Err(ConfigError::InvalidValue(
                "session.max_segments",
                "must be at least 1".into(),
            ));
        }
        if self.session.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "session.sweep_interval_secs",
                "must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn codec(&self) -> TxCodec {
        TxCodec::new(self.protocol.compression, self.protocol.hex_prefix)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session.sweep_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_grace_secs)
    }

    /// Apply the relay-side settings to a workflow builder.
    pub fn configure(&self, builder: RelayWorkflowBuilder) -> RelayWorkflowBuilder {
        let builder = builder
            .codec(self.codec())
            .sessions(ReassemblyStore::new(
                Duration::from_secs(self.session.idle_timeout_secs),
                self.session.max_segments,
            ))
            .replay_guard(ReplayGuard::new(Duration::from_secs(
                self.replay.retention_secs,
            )))
            .poller(ConfirmationPoller::new(
                self.poller.attempts,
                Duration::from_secs(self.poller.interval_secs),
            ))
            .reply_on_malformed(self.replies.reply_on_malformed);

        match &self.ledger.explorer_url {
            Some(url) => builder.explorer_url(url.clone()),
            None => builder,
        }
    }
}

impl SmsConfig {
    /// Gateway credentials, if every field is present and non-empty.
    pub fn credentials(&self) -> Option<TwilioCredentials> {
        let field = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());

        Some(TwilioCredentials {
            account_sid: field(&self.account_sid)?,
            auth_token: field(&self.auth_token)?,
            from_number: field(&self.from_number)?,
        })
    }
}
