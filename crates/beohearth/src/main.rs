use std::path::PathBuf;
use std::sync::Arc;

use beohearth::Config;
use beohearth::Engine;
use beohearth::LogLevel;
use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Bang & Olufsen speaker bridge
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the configuration file
    #[arg(default_value = "beohearth.toml")]
    config: PathBuf,

    /// Override the log level from the configuration file
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

fn init_tracing(config: &Config, cli_level: Option<LogLevel>) {
    let level = cli_level.unwrap_or(config.logging.level);

    let filter = config
        .logging
        .overrides
        .iter()
        .fold(Targets::new().with_default(LevelFilter::from(level)), |targets, (target, level)| {
            targets.with_target(target.clone(), LevelFilter::from(*level))
        });

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)?;

    init_tracing(&config, args.log_level);

    tracing::info!("beohearth starting");
    tracing::info!("Loaded config from: {}", args.config.display());

    let mut engine = Engine::new();
    engine.register_integrations_from_config(&config);
    let engine = Arc::new(engine);

    let runner = engine.clone();
    let engine_task = tokio::spawn(async move {
        if let Err(e) = runner.run().await {
            tracing::error!("Engine stopped with error: {}", e);
        }
    });

    let api = config.api.clone().map(|api| {
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let engine = engine.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = beohearth::api::serve(api.listen, api.port, engine, shutdown_rx).await {
                tracing::error!("HTTP API server failed: {}", e);
            }
        });
        (shutdown_tx, handle)
    });

    tracing::info!("Press Ctrl+C to exit");

    // Wait for Ctrl+C
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received shutdown signal");
        }
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    if let Some((shutdown_tx, handle)) = api {
        let _ = shutdown_tx.send(());
        if let Err(e) = handle.await {
            tracing::warn!("HTTP API task ended abnormally: {}", e);
        }
    }

    tracing::info!("Shutting down integrations...");
    engine.shutdown().await;
    engine_task.abort();

    tracing::info!("beohearth shutdown complete");

    Ok(())
}
