//! # Self-Healing CLI (`heal`)
//!
//! ## Usage
//!
//! ```bash
//! heal --config ./config/heal.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `heal init` | Create the database schema and an empty similarity index |
//! | `heal serve` | Start the HTTP server |
//! | `heal classify "<message>"` | Print the classification of an error message |
//! | `heal explain "<message>"` | Classify and explain an error message |
//! | `heal errors` | List recently logged errors |
//! | `heal index rebuild` | Re-create the similarity index from the error log |
//! | `heal index search "<query>"` | Show what retrieval returns for a query |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use self_healing::{config, diagnose, index_cmd, server};

/// Self-Healing CLI: a records service that classifies, explains, and
/// announces its own database errors.
#[derive(Parser)]
#[command(
    name = "heal",
    about = "Self-Healing: a records service that diagnoses its own database errors",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/heal.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema and an empty similarity index.
    ///
    /// Idempotent: existing tables and index entries are kept.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Classify an error message and print the result as JSON.
    ///
    /// Runs without a config file.
    Classify {
        message: String,
    },

    /// Classify, retrieve similar past errors, and explain a message.
    ///
    /// Nothing is logged, indexed, or posted.
    Explain {
        message: String,
    },

    /// List recently logged errors, newest first.
    Errors {
        #[arg(long, default_value = "20")]
        limit: i64,
    },

    /// Similarity index maintenance.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Re-create the index from every row of `error_logs`.
    Rebuild,

    /// Print the passages retrieved for a query.
    Search {
        query: String,

        /// Number of passages (defaults to `[index].top_k`).
        #[arg(long)]
        k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Classify { message } => {
            return diagnose::run_classify(message);
        }
        Commands::Explain { message } => {
            // Without a config file, explain with defaults (keyword retrieval, no model).
            let cfg = if cli.config.exists() {
                config::load_config(&cli.config)?
            } else {
                config::Config::minimal()
            };
            return diagnose::run_explain(&cfg, message).await;
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            index_cmd::run_init(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Errors { limit } => {
            if limit <= 0 {
                anyhow::bail!("--limit must be > 0");
            }
            diagnose::run_errors(&cfg, limit).await?;
        }
        Commands::Index { action } => match action {
            IndexAction::Rebuild => {
                index_cmd::run_index_rebuild(&cfg).await?;
            }
            IndexAction::Search { query, k } => {
                index_cmd::run_index_search(&cfg, &query, k).await?;
            }
        },
        Commands::Classify { .. } | Commands::Explain { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
