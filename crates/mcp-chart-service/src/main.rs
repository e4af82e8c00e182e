//! mcp-chart-service - chart rendering over a remote MCP chart server.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use mcp_chart_service::{Args, ChartService, ServiceConfig};

const CRATE_TARGETS: [&str; 2] = ["mcp_chart", "mcp_chart_service"];

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Console (human-readable) + optional rotating JSON file.
    // Kept alive so buffered file output is flushed on exit.
    let _guard = init_tracing(&args);

    let config = ServiceConfig::from_args(&args).context("failed to load configuration")?;
    tracing::info!(
        port = config.port,
        server = %config.client.server,
        endpoint = %config.client.endpoint,
        prefix = %config.path_prefix,
        "starting chart service"
    );

    ChartService::new(config)
        .run(shutdown_signal())
        .await
        .context("chart service failed")?;

    Ok(())
}

fn init_tracing(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let level = if args.verbose { "debug" } else { "info" };
    let console_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| directives(level, "warn"));

    let (file_layer, guard) = match &args.log_dir {
        Some(log_dir) => {
            let appender = tracing_appender::rolling::daily(log_dir, "mcp-chart-service.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(directives("trace", "info")));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(EnvFilter::new(console_filter)),
        )
        .with(file_layer)
        .init();

    guard
}

fn directives(crate_level: &str, default_level: &str) -> String {
    let mut parts: Vec<String> = CRATE_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, crate_level))
        .collect();
    parts.push(format!("tower_http={}", crate_level));
    parts.push(default_level.to_string());
    parts.join(",")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
