//! # isagraph
//!
//! Command-line driver for the isagraph table <-> graph transform.
//!
//! ## Usage
//!
//! ```bash
//! # Check every table of a submission against the grammar
//! isagraph --grammar grammar.toml --manifest manifest.toml validate
//!
//! # Map and write a graph snapshot
//! isagraph map --consolidate --snapshot study.isag
//!
//! # Re-render one assay file
//! isagraph export --file a_proteome --output a_proteome.txt
//! ```

use clap::Parser;
use isagraph::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // ISAGRAPH_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("ISAGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "isagraph=info,isagraph_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet {
        eprintln!("isagraph v{}", env!("CARGO_PKG_VERSION"));
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
