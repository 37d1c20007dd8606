//! Scenarium - training-scenario content management core.
//!
//! Command-line host for the import and thumbnail pipelines, running the
//! job dispatcher against local storage.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if scenarium::cli::is_verbose() {
        "scenarium=info"
    } else {
        "scenarium=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    scenarium::cli::run().await
}
