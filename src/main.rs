use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use subway_ingest::config::{self, Config};
use subway_ingest::sink::SupabaseSink;
use subway_ingest::source::{HttpTransport, RealtimePositionClient};
use subway_ingest::{Pipeline, Scheduler};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let transport = HttpTransport::new(config.fetch_timeout()).context("building upstream client")?;
    let source = RealtimePositionClient::new(Arc::new(transport), config.api_key.clone())
        .with_base_url(config.api_base_url.clone())
        .with_page_size(config.page_size);
    let sink = SupabaseSink::new(
        &config.supabase_url,
        &config.supabase_key,
        &config.table,
        config.write_timeout(),
    )
    .context("building storage client")?;

    let (stop, shutdown) = watch::channel(false);
    let pipeline = Pipeline::new(Arc::new(source), Arc::new(sink), config.source_lines())
        .with_failure_threshold(config.failure_threshold)
        .with_shutdown(shutdown.clone());

    tracing::info!(lines = ?pipeline.lines(), table = %config.table, "starting subway position ingest");

    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("stop signal received");
        stop.send_replace(true);
    });

    Scheduler::new(pipeline, shutdown)
        .with_interval(config.interval())
        .with_backoff(config.backoff())
        .with_run_timeout(config.run_timeout())
        .run()
        .await;

    Ok(())
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C elsewhere.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => {}
                    _ = sigterm.recv() => {}
                }
            }
            _ => {
                tracing::warn!("failed to register signal handlers, falling back to ctrl_c");
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "failed to listen for ctrl_c");
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl_c");
            std::future::pending::<()>().await;
        }
    }
}
