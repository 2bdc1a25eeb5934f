use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use crawler::config::Config;
use crawler::coordinator::Coordinator;
use crawler::frontier::Frontier;
use crawler::{logging, seeds};
use store::JsonlPageStore;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Crawl the web to JSONL, respecting robots.txt and per-host politeness")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, default_value = "config.toml")]
    config: String,
    /// Overrides crawler.seeds_file from the config
    #[arg(long)]
    seeds: Option<String>,
    /// Output JSONL file path
    #[arg(long, default_value = "crawl.jsonl")]
    output: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config: {err}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.logging);

    let frontier = Arc::new(Frontier::new());
    let seeds_file = cli.seeds.as_deref().unwrap_or(&config.crawler.seeds_file);
    if let Err(err) = seeds::load_seeds(seeds_file, &frontier) {
        tracing::error!(error = %err, "failed to load seeds");
        return ExitCode::FAILURE;
    }

    let store = match JsonlPageStore::open(&cli.output).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(error = %err, "failed to open output store");
            return ExitCode::FAILURE;
        }
    };

    let coordinator = match Coordinator::new(&config, frontier, store) {
        Ok(coordinator) => coordinator,
        Err(err) => {
            tracing::error!(error = %err, "failed to build coordinator");
            return ExitCode::FAILURE;
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(wait_for_shutdown(shutdown_tx));

    let stats = coordinator.run(shutdown_rx).await;
    tracing::info!(
        processed = stats.pages_processed,
        errored = stats.pages_errored,
        skipped = stats.pages_skipped,
        "crawl finished"
    );

    ExitCode::SUCCESS
}

/// Waits for Ctrl-C or, on unix, SIGQUIT, then flips the shutdown
/// watch so the coordinator's in-flight work can drain.
async fn wait_for_shutdown(shutdown_tx: watch::Sender<bool>) {
    #[cfg(unix)]
    {
        let mut quit = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::quit()) {
            Ok(signal) => signal,
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGQUIT handler");
                let _ = tokio::signal::ctrl_c().await;
                let _ = shutdown_tx.send(true);
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = quit.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("shutdown signal received, draining in-flight work");
    let _ = shutdown_tx.send(true);
}
