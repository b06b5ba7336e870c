// ============================
// apishield-backend-bin/src/main.rs
// ============================
//! Tokio / Axum entry-point for the user service.

use anyhow::Context;
use apishield_backend_lib::{config::Settings, router::create_router, AppState};
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "apishield", version, about = "User directory with cookie sessions")]
struct Args {
    /// Settings file; defaults to ./apishield.toml when present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `bind_addr` from the settings
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("failed to load settings")?;
    if let Some(bind) = args.bind {
        settings.bind_addr = bind;
    }

    // Initialize tracing; RUST_LOG wins over `log_level`
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    tracing::debug!(?settings, "settings loaded");

    let addr = settings.bind_addr;
    let state = AppState::with_flat_file(settings).context("failed to initialise state")?;
    if let Some(admin) = state.bootstrap_admin().await? {
        tracing::info!(user_id = admin.id, "seeded bootstrap admin");
    }

    let app = create_router(Arc::new(state));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install ctrl-c handler");
    }
    tracing::info!("shutting down");
}
