//! Glass Bead Game server.
//!
//! Environment:
//! - `OPENROUTER_API_KEY` - model credential (turns fail with 500 without it)
//! - `OPENROUTER_MODEL`, `SITE_URL` - model and attribution overrides
//! - `BEAD_SERVER_BIND`, `BEAD_SERVER_PORT` - listen address (`0.0.0.0:8300`)
//! - `BEAD_DATA_DIR` - gallery storage root (`.bead`)
//!
//! Build and run: `cargo run --bin bead-server`

use std::sync::Arc;

use anyhow::Context;
use bead_core::oracle::OpenRouterOracle;
use bead_core::turn::TurnService;
use bead_server::api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    bead_server::init_tracing();

    let bind = std::env::var("BEAD_SERVER_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("BEAD_SERVER_PORT").unwrap_or_else(|_| "8300".to_string());
    let addr = format!("{bind}:{port}");

    let turns = match OpenRouterOracle::from_env() {
        Ok(oracle) => {
            tracing::info!(model = ?oracle.config().model, "model configured");
            Some(TurnService::new(oracle))
        }
        Err(e) => {
            tracing::warn!("no model credential, /api/chat will fail: {e}");
            None
        }
    };

    let gallery_dir = bead_server::data_dir().join("games");
    let state = Arc::new(AppState::new(turns, gallery_dir));
    let app = router(state);

    tracing::info!("bead server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
