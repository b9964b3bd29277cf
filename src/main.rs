use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use drive_manager::auth::{GoogleOAuth, SessionStore};
use drive_manager::config::Settings;
use drive_manager::google_drive::GoogleDrive;
use drive_manager::prelude::*;
use drive_manager::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let settings = Settings::parse();
    info!("starting with {}", settings);

    let oauth = GoogleOAuth::from_settings(&settings);
    if oauth.is_none() {
        warn!("GOOGLE_CLIENT_ID / GOOGLE_CLIENT_SECRET not set, sign-in is disabled");
    }
    if settings.uses_default_secret() {
        warn!("SESSION_SECRET not set, using the development default");
    }

    let drive = GoogleDrive::new();
    info!("drive backend: {}", drive);
    let sessions = SessionStore::new(settings.session_secret.as_bytes(), settings.session_ttl());
    let state = AppState::new(Arc::new(drive), sessions, oauth);

    let listener = tokio::net::TcpListener::bind(settings.bind_address)
        .await
        .with_context(|| format!("could not bind {}", settings.bind_address))?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("drive_manager=info,tower_http=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("got signal to end program");
}
