//! Similarity index maintenance commands.
//!
//! - `heal index rebuild` re-creates the index from every row of `error_logs`,
//!   re-embedding all messages with the configured provider.
//! - `heal index search` prints what the pipeline would retrieve for a query.

use anyhow::Result;

use self_healing_core::store::KnowledgeStore;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::error_log::SqliteErrorLog;
use crate::knowledge::FileKnowledgeStore;
use crate::migrate;

pub fn open_index(config: &Config) -> Result<FileKnowledgeStore> {
    let provider = create_provider(&config.embedding)?;
    FileKnowledgeStore::open(&config.index, provider)
}

/// Create the database schema and an empty index file.
pub async fn run_init(config: &Config) -> Result<()> {
    migrate::run_migrations(config).await?;
    println!("Database initialized at {}", config.db.path.display());
    println!("Error log at {}", config.db.error_log_path().display());

    let index = open_index(config)?;
    if index.create_if_missing().await? {
        println!("Created empty index at {}", index.path().display());
    } else {
        let entries = index.len().await;
        println!(
            "Index already present at {} ({} entries)",
            index.path().display(),
            entries
        );
    }
    Ok(())
}

pub async fn run_index_rebuild(config: &Config) -> Result<()> {
    let log = SqliteErrorLog::open(&config.db).await?;
    let items = log.all_messages().await?;
    log.close().await;

    let index = open_index(config)?;
    tracing::info!(rows = items.len(), "rebuilding index from error_logs");
    let count = index.rebuild(items).await?;

    println!(
        "Rebuilt index at {} with {} entries.",
        index.path().display(),
        count
    );
    Ok(())
}

pub async fn run_index_search(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        anyhow::bail!("query must not be empty");
    }

    let index = open_index(config)?;
    let passages = index
        .retrieve(query, k.unwrap_or(config.index.top_k))
        .await?;

    if passages.is_empty() {
        println!("No matches.");
        return Ok(());
    }

    for (i, p) in passages.iter().enumerate() {
        println!("{}. [{:.3}] (source {}) {}", i + 1, p.score, p.source_id, p.text);
    }
    Ok(())
}
