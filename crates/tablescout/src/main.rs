//! # Table Scout CLI (`scout`)
//!
//! ## Usage
//!
//! ```bash
//! scout --config ./config/scout.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scout discover <doc>` | Plan, search, and validate tables for a requirement document |
//! | `scout plan <doc>` | Show the search plan without searching |
//! | `scout serve` | Start the HTTP tool server |
//!
//! ## Examples
//!
//! ```bash
//! # Fields taken from the document's markdown field table
//! scout discover ./requirements/nfl_review.md
//!
//! # Fields from a JSON file, machine-readable output
//! scout discover ./requirements/nfl_review.md --fields ./fields.json --json
//!
//! # Debug logging for the engine
//! SCOUT_LOG=tablescout_core=debug scout plan ./requirements/nfl_review.md
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tablescout::{config, discover, logging, server};

/// Table Scout: answer requirement documents with validated tables, one
/// conceptual group at a time.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/scout.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "scout",
    about = "Table Scout: strategy-driven table discovery for requirement documents",
    version,
    long_about = "Table Scout splits a requirement document into conceptual search groups, \
    searches a table metadata index once per group, and keeps only the tables whose schema \
    can supply that group's fields."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/scout.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover tables for a requirement document.
    ///
    /// Press Ctrl-C to stop after the current step; results gathered so far
    /// are printed.
    Discover {
        /// Path to the requirement document (markdown or plain text).
        document: PathBuf,

        /// JSON file with target fields. Defaults to the document's field table.
        #[arg(long)]
        fields: Option<PathBuf>,

        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the search plan for a requirement document.
    Plan {
        /// Path to the requirement document.
        document: PathBuf,

        /// JSON file with target fields. Defaults to the document's field table.
        #[arg(long)]
        fields: Option<PathBuf>,

        /// Print the plan as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP tool server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Discover {
            document,
            fields,
            json,
        } => {
            discover::run_discover(&cfg, &document, fields.as_deref(), json).await?;
        }
        Commands::Plan {
            document,
            fields,
            json,
        } => {
            discover::run_plan(&cfg, &document, fields.as_deref(), json).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
