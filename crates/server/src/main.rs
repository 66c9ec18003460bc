mod bootstrap;
mod health;
mod webhook;

use std::future::IntoFuture;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use orderly_core::config::{AppConfig, LoadOptions, LogFormat};

fn init_logging(config: &AppConfig) {
    // RUST_LOG wins over the configured level so a single run can be
    // re-traced without touching the config file.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    spawn_idle_sweeper(&app);

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        "orderly-server started"
    );

    serve_until_shutdown(
        listener,
        webhook::router(app.agent.clone()),
        Duration::from_secs(app.config.server.graceful_shutdown_secs),
    )
    .await?;

    tracing::info!(event_name = "system.server.stopping", "orderly-server stopping");
    Ok(())
}

/// Runs the webhook listener until ctrl-c, then gives in-flight requests a
/// bounded drain window before the process exits.
async fn serve_until_shutdown(
    listener: tokio::net::TcpListener,
    router: axum::Router,
    grace: Duration,
) -> Result<()> {
    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel();
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            let _ = drain_tx.send(());
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        served = &mut server => served?,
        _ = drain_rx => match tokio::time::timeout(grace, &mut server).await {
            Ok(served) => served?,
            Err(_) => {
                tracing::warn!(
                    event_name = "system.server.drain_timeout",
                    grace_secs = grace.as_secs(),
                    "in-flight requests did not drain in time, exiting anyway"
                );
            }
        },
    }

    Ok(())
}

fn spawn_idle_sweeper(app: &bootstrap::Application) {
    let agent = app.agent.clone();
    let max_idle = chrono::Duration::seconds(
        i64::try_from(app.config.session.idle_timeout_secs).unwrap_or(i64::MAX),
    );
    let interval = Duration::from_secs(app.config.session.sweep_interval_secs);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so a fresh boot does not
        // sweep an empty store.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(sweep_error) = agent.evict_idle_sessions(max_idle).await {
                tracing::warn!(
                    event_name = "system.sweeper.error",
                    error = %sweep_error,
                    "idle session sweep failed"
                );
            }
        }
    });
}
