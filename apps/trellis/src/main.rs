//! # Trellis - Graph Attribute CLI
//!
//! Reads and writes node, edge and group attributes of a JSON graph document
//! through the trellis-core facade.
//!
//! ## Usage
//!
//! ```bash
//! trellis init
//! trellis status
//! trellis get node '[1,2]' age
//! trellis set node : ward a --dry-run
//! trellis query node --where 'age>=30' --values age --reduce max
//! ```

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use trellis::cli::{self, Cli};
use trellis::config::{ConfigFile, LOG_FORMAT_ENV, LogFormat, Settings};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = Cli::parse();

    let file = match ConfigFile::discover(cli.config.as_deref()) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };
    let env_log_format = std::env::var(LOG_FORMAT_ENV).ok();
    let settings = Settings::resolve(&cli, file, env_log_format.as_deref());

    init_tracing(settings.log_format, cli.verbose, cli.quiet);

    if let Err(e) = cli::execute(cli.command, &settings) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing on stderr. `TRELLIS_LOG` wins over `RUST_LOG`.
fn init_tracing(format: LogFormat, verbose: bool, quiet: bool) {
    let default_filter = if quiet {
        "error"
    } else if verbose {
        "trellis=debug,trellis_core=debug"
    } else {
        "trellis=info,trellis_core=info"
    };
    let filter = EnvFilter::try_from_env("TRELLIS_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| default_filter.into());

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
