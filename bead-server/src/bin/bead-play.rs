//! Play the Glass Bead Game in a terminal.
//!
//! Turns go to the model directly (`OPENROUTER_API_KEY`) or, with
//! `--server`, through a running `bead-server`. The game is saved after
//! every change and resumed on the next start.

use std::path::PathBuf;

use anyhow::Context;
use bead_core::gallery::JsonDirGallery;
use bead_core::oracle::OpenRouterOracle;
use bead_core::persist::FileSlotStore;
use bead_core::session::{GameSession, SessionConfig, DEFAULT_MAX_RETRIES, DEFAULT_SLOT_KEY};
use bead_core::turn::{HttpTurnClient, TurnService};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "bead-play", about = "Play the Glass Bead Game in a terminal")]
struct Args {
    /// Base URL of a bead-server; play in-process when absent
    #[arg(long)]
    server: Option<String>,

    /// Where the session and published games are kept (default: $BEAD_DATA_DIR or .bead)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Saved session slot name
    #[arg(long, default_value = DEFAULT_SLOT_KEY)]
    slot: String,

    /// Retries after a failed turn attempt
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    retries: usize,

    /// Start a new game instead of resuming the saved one
    #[arg(long)]
    fresh: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    bead_server::init_tracing();

    let args = Args::parse();
    let data_dir = args.data_dir.unwrap_or_else(bead_server::data_dir);
    let store = FileSlotStore::new(data_dir.join("sessions"));
    let gallery = JsonDirGallery::connect(data_dir.join("games"))
        .await
        .context("failed to open the gallery")?;
    let config = SessionConfig::default()
        .with_slot_key(args.slot)
        .with_max_retries(args.retries);

    match args.server {
        Some(url) => {
            let mut session = start(HttpTurnClient::new(&url), store, config, args.fresh).await;
            bead_server::play::run(&mut session, &gallery).await
        }
        None => {
            let oracle = OpenRouterOracle::from_env()
                .context("OPENROUTER_API_KEY is not set (or pass --server <url>)")?;
            let mut session = start(TurnService::new(oracle), store, config, args.fresh).await;
            bead_server::play::run(&mut session, &gallery).await
        }
    }
}

async fn start<C>(
    client: C,
    store: FileSlotStore,
    config: SessionConfig,
    fresh: bool,
) -> GameSession<C, FileSlotStore>
where
    C: bead_core::turn::TurnClient,
{
    let mut session = GameSession::restore(client, store, config).await;
    if fresh {
        session.reset_game().await;
    }
    session
}
