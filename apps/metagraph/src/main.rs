//! # Metagraph
//!
//! The command-line binary for the metagraph object-graph engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 apps/metagraph (THE BINARY)              │
//! │                                                          │
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────┐   │
//! │  │    CLI      │   │   Config     │   │  Workspace   │   │
//! │  │   (clap)    │   │   (toml)     │   │ (json/toml)  │   │
//! │  └──────┬──────┘   └──────┬───────┘   └──────┬───────┘   │
//! │         └─────────────────┼──────────────────┘           │
//! │                           ▼                              │
//! │                  ┌─────────────────┐                     │
//! │                  │ metagraph-core  │                     │
//! │                  │  (THE ENGINE)   │                     │
//! │                  └─────────────────┘                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! metagraph --schema schema.json --model model.json check
//! metagraph -s schema.json -m model.json query "MATCH (n:Namespace) RETURN n.name"
//! metagraph --mount lib=library.json shell
//! ```

use clap::Parser;
use metagraph::cli::{self, Cli};
use metagraph::config::{Config, LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = Cli::parse();

    // The config file also carries the logging settings, so it is read first.
    let config = Config::load(cli.config.as_deref());
    let logging = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    init_tracing(&logging, cli.verbose);

    if let Err(e) = config.and_then(|config| cli::execute(cli, config)) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Install the subscriber. Logs go to stderr so query output stays clean.
///
/// `METAGRAPH_LOG_FORMAT=json` enables machine-parseable output and wins
/// over the config file. `RUST_LOG` wins over the configured filter.
fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let format = std::env::var("METAGRAPH_LOG_FORMAT")
        .ok()
        .and_then(|v| LogFormat::from_env_value(&v))
        .unwrap_or(logging.format);

    let fallback = match (&logging.filter, verbose) {
        (_, true) => "metagraph=debug,metagraph_core=debug".to_string(),
        (Some(filter), false) => filter.clone(),
        (None, false) => "metagraph=info".to_string(),
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| fallback.into());

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
