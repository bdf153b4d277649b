//! chathubd - real-time chat hub daemon.
//!
//! Accepts token-authenticated WebSocket clients and routes chat messages,
//! group fan-out and call signaling between them.

use chathub::config::{self, Config};
use chathub::db::Database;
use chathub::network::Gateway;
use chathub::security::TokenAuthority;
use chathub::state::{Hub, HubSettings};
use chathub::{http, metrics};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {config_path}", errors.len());
    }

    info!(
        server = %config.server.name,
        listen = %config.listen.address,
        "Starting chathubd"
    );

    let db = Database::new(&config.database.path).await?;

    // Prometheus metrics are optional.
    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    let metrics_port = config.server.metrics_port;
    if metrics_port == 0 {
        info!("Metrics disabled");
    } else {
        metrics::init();
        tokio::spawn(http::run_http_server(metrics_port));
        info!(port = metrics_port, "Prometheus HTTP server started");
    }

    let (hub, router) = Hub::start(HubSettings::from(&config), Arc::new(db));
    let auth = Arc::new(TokenAuthority::new(&config.auth.token_secret));

    let gateway = Gateway::bind(config.listen.clone(), hub.clone(), auth).await?;

    tokio::select! {
        result = gateway.run() => {
            if let Err(e) = result {
                error!(error = %e, "Gateway stopped");
            }
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown requested");
        }
    }

    hub.shutdown();
    if let Err(e) = router.await {
        warn!(error = %e, "Router task failed");
    }
    info!("chathubd stopped");

    Ok(())
}
