//! Glass Bead Game front ends: the HTTP API and terminal play.

pub mod api;
pub mod play;

/// Install the `tracing` subscriber, honouring `RUST_LOG` (default `info`).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Directory for saved sessions and published games.
pub fn data_dir() -> std::path::PathBuf {
    std::env::var("BEAD_DATA_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from(".bead"))
}
