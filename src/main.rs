//! `relay` binary: serve a single resource with range support, or fetch one
//! using any of the transfer strategies.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use range_relay::{AppState, Concurrency, Fetcher, Strategy, create_router};

#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve one resource with full, partial, and conditional responses.
    Serve {
        /// Address to listen on.
        #[arg(short, long, env = "RELAY_LISTEN", default_value = "0.0.0.0:8085")]
        listen: SocketAddr,

        /// Path of the resource served at /resource.
        #[arg(short, long, env = "RELAY_RESOURCE")]
        resource: PathBuf,
    },
    /// Fetch a resource and report (or write out) the reassembled bytes.
    Fetch {
        /// Resource URL, e.g. http://localhost:8085/resource
        url: String,

        /// Transfer strategy.
        #[arg(short, long, value_enum, default_value_t = Strategy::ParallelChunks)]
        strategy: Strategy,

        /// Maximum chunk size in bytes for the chunked strategies.
        #[arg(short, long, default_value_t = 1_000_000)]
        max_chunk_size: u64,

        /// Cap on concurrent chunk requests; unlimited when omitted.
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Write the reassembled bytes here instead of just reporting.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,range_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match Cli::parse().command {
        Command::Serve { listen, resource } => serve(listen, resource).await,
        Command::Fetch { url, strategy, max_chunk_size, concurrency, output } => {
            fetch(url, strategy, max_chunk_size, concurrency, output).await
        }
    }
}

async fn serve(listen: SocketAddr, resource: PathBuf) -> Result<()> {
    anyhow::ensure!(resource.is_file(), "resource {} is not a readable file", resource.display());

    let state = Arc::new(AppState::new(resource));
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;
    tracing::info!(%listen, "range-relay server running");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shut down cleanly");
    Ok(())
}

async fn fetch(
    url: String,
    strategy: Strategy,
    max_chunk_size: u64,
    concurrency: Option<usize>,
    output: Option<PathBuf>,
) -> Result<()> {
    let fetcher = Fetcher::new().concurrency(match concurrency {
        Some(n) => Concurrency::Limit(n),
        None => Concurrency::Unlimited,
    });

    let content = fetcher
        .fetch(&url, strategy, max_chunk_size)
        .await
        .with_context(|| format!("failed to fetch {url}"))?;

    tracing::info!(
        bytes = content.len(),
        content_type = %content.content_type,
        ?strategy,
        "fetch complete"
    );

    if let Some(path) = output {
        tokio::fs::write(&path, &content.bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote reassembled resource");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    } else {
        tracing::info!("caught interrupt signal, shutting down");
    }
}
