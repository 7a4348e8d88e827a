//! echolink-relay: SMS webhook relay node.

use std::sync::Arc;

use anyhow::{Context, Result};

use echolink_relay::api::create_api_server;
use echolink_relay::config::RelayConfig;
use echolink_relay::ledger::{JsonRpcLedger, LedgerClient};
use echolink_relay::metrics::start_metrics_server;
use echolink_relay::relay::RelayWorkflowBuilder;
use echolink_relay::sms::{LogSink, ReplySink, TwilioSink};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = RelayConfig::load().context("failed to load configuration")?;
    tracing::info!(
        listen = %config.server.listen_addr,
        rpc = %config.ledger.rpc_url,
        segment_size = config.protocol.max_segment_size,
        "echolink relay starting"
    );

    let replies: Arc<dyn ReplySink> = match config.sms.credentials() {
        Some(credentials) => {
            tracing::info!(from = %credentials.from_number, "replies via Twilio");
            Arc::new(TwilioSink::new(credentials).context("failed to build SMS client")?)
        }
        None => {
            tracing::warn!("no Twilio credentials configured, replies are only logged");
            Arc::new(LogSink)
        }
    };

    let ledger: Arc<dyn LedgerClient> = Arc::new(
        JsonRpcLedger::new(config.ledger.rpc_url.clone())
            .context("failed to build ledger client")?,
    );

    if config.metrics.enabled {
        match start_metrics_server(&config.metrics) {
            Ok(_) => tracing::info!(addr = %config.metrics.listen_addr, "metrics exporter listening"),
            Err(e) => tracing::warn!(error = %e, "metrics exporter disabled"),
        }
    }

    let relay = Arc::new(config.configure(RelayWorkflowBuilder::new(ledger, replies)).build());
    let maintenance = relay.spawn_maintenance(config.sweep_interval());

    let listener = tokio::net::TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen_addr))?;
    tracing::info!(addr = %listener.local_addr()?, "listening on POST /sms-incoming");

    axum::serve(listener, create_api_server(relay.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!(in_flight = relay.in_flight(), "shutting down");
    relay.shutdown();

    if tokio::time::timeout(config.shutdown_grace(), relay.wait_idle())
        .await
        .is_err()
    {
        tracing::warn!(
            in_flight = relay.in_flight(),
            "grace period elapsed with messages still in flight"
        );
    }
    let _ = maintenance.await;

    tracing::info!(stats = %relay.stats(), "relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
