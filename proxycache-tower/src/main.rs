//! The runnable caching reverse proxy: loads configuration, builds every
//! cache tier eagerly, and serves requests until told to stop.

use std::path::PathBuf;

use proxycache_tower::{build_resolver, metrics as metrics_endpoint, router, ProxyConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_path =
        args.iter().position(|arg| arg == "--config").and_then(|i| args.get(i + 1)).map(PathBuf::from);

    let config = ProxyConfig::load(config_path.as_deref())
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;

    info!(targets = ?config.targets, listen_addr = %config.listen_addr, "starting proxycache");

    let (resolver, metrics) = build_resolver(&config).await?;
    let app = router(resolver);

    if let Some(metrics_addr) = config.metrics_addr {
        let metrics_app = metrics_endpoint::router(metrics);
        tokio::spawn(async move {
            match tokio::net::TcpListener::bind(metrics_addr).await {
                Ok(listener) => {
                    info!(%metrics_addr, "metrics endpoint listening");
                    if let Err(e) = axum::serve(listener, metrics_app).await {
                        warn!(error = %e, "metrics endpoint exited");
                    }
                }
                Err(e) => warn!(%metrics_addr, error = %e, "failed to bind metrics endpoint"),
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
