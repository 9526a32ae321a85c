//! Glass Bead Game engine.
//!
//! This crate provides:
//! - The trajectory notation: concepts, typed connectors, commentary
//! - Interpretation of raw model output into a turn payload, with salvage
//!   when the model ignores the JSON format
//! - A turn service over OpenRouter and the `TurnClient` seam sessions use
//! - `GameSession`, which reconciles turns into persisted session state
//! - Display segmentation and the gallery of published games
//!
//! # Quick Start
//!
//! ```ignore
//! use bead_core::{FileSlotStore, GameSession, OpenRouterOracle, SessionConfig, TurnService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = TurnService::new(OpenRouterOracle::from_env()?);
//!     let store = FileSlotStore::new(".bead");
//!     let mut session = GameSession::restore(client, store, SessionConfig::default()).await;
//!
//!     session.send_turn("Let's explore time and memory").await?;
//!     for line in &session.trajectory_state().trajectory {
//!         println!("{}", line.text);
//!     }
//!     Ok(())
//! }
//! ```

pub mod display;
pub mod extract;
pub mod fallback;
pub mod gallery;
pub mod grammar;
pub mod interpret;
pub mod oracle;
pub mod persist;
pub mod session;
pub mod testing;
pub mod trajectory;
pub mod turn;
pub mod validate;

// Primary public API
pub use display::{format_line, render_html, Segment, TrajectoryGraph};
pub use gallery::{
    GalleryError, GalleryPage, GalleryQuery, GalleryStore, JsonDirGallery, NewGame, PublishedGame,
    SharedConnection,
};
pub use interpret::{interpret, interpret_strict, Interpretation, Source};
pub use oracle::{OpenRouterOracle, Oracle, OracleConfig, OracleError};
pub use persist::{FileSlotStore, MemorySlotStore, PersistError, SavedSession, SlotStore};
pub use session::{GameSession, SessionConfig, SessionError, TurnOutcome};
pub use trajectory::{AiResponse, Commentary, Message, Role, TrajectoryLine, TrajectoryState};
pub use turn::{HttpTurnClient, TurnClient, TurnError, TurnFailure, TurnRequest, TurnService};
pub use validate::MalformedAiResponse;
