//! pprofweb - upload a profile, explore it in the browser.
//!
//! Serves an upload form at `/`. Each upload replaces the profile on disk,
//! is rendered by the built-in engine, and its web UI is mounted under
//! `/pprofweb/`. Only one profile is live at a time.

use clap::Parser as ClapParser;
use pprofweb::{
    api,
    config::{self, ServerConfig},
    engine::PprofEngine,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// pprofweb - upload a profile, explore it in the browser
#[derive(ClapParser, Debug)]
#[command(name = "pprofweb", version, about, long_about = None)]
struct Cli {
    /// Port to listen on (all interfaces)
    #[arg(long, env = config::PORT_ENV)]
    port: Option<u16>,

    /// Where the most recent upload is written (defaults to the temp dir)
    #[arg(long)]
    profile_path: Option<PathBuf>,

    /// Largest accepted upload body, in bytes
    #[arg(long, default_value_t = config::MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), ServeError> {
    let cli = Cli::parse();
    init_tracing();
    run_server(cli).await
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "pprofweb=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_server(cli: Cli) -> Result<(), ServeError> {
    let port = config::resolve_port(cli.port);
    let server_config = ServerConfig {
        profile_path: cli.profile_path.unwrap_or_else(config::default_profile_path),
        max_upload_bytes: cli.max_upload_bytes,
    };
    tracing::info!(
        profile_path = %server_config.profile_path.display(),
        max_upload_bytes = server_config.max_upload_bytes,
        "pprofweb starting"
    );

    let state = api::AppState::new(Arc::new(PprofEngine), server_config);
    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    tracing::info!(%addr, "listening on http://localhost:{}/", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(?e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            tracing::info!("received Ctrl+C");
        })
        .await?;

    tracing::info!("pprofweb exiting");
    Ok(())
}
