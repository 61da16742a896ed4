//! Diagnostic commands: `classify`, `explain`, and `errors`.

use anyhow::Result;

use self_healing_core::classify::classify;
use self_healing_core::explain::Explainer;
use self_healing_core::prompt::build_prompt;
use self_healing_core::store::{ErrorLog, KnowledgeStore};

use crate::config::Config;
use crate::error_log::SqliteErrorLog;
use crate::index_cmd::open_index;
use crate::llm::create_model;

/// Print the classification of `message` as JSON.
pub fn run_classify(message: &str) -> Result<()> {
    let classification = classify(message);
    println!("{}", serde_json::to_string_pretty(&classification)?);
    Ok(())
}

/// Classify, retrieve, and explain `message` without logging, indexing, or
/// notifying.
pub async fn run_explain(config: &Config, message: &str) -> Result<()> {
    let classification = classify(message);
    let index = open_index(config)?;
    let passages = index.retrieve(message, config.index.top_k).await?;

    let explainer = Explainer::new(create_model(&config.llm)?);
    let prompt = build_prompt(classification.category, message);
    let body = explainer.explain(&prompt, &passages).await;

    println!(
        "Category: {} | Severity: {} | Auto-fixable: {}",
        classification.category,
        classification.severity,
        if classification.auto_fixable { "yes" } else { "no" }
    );
    println!("Similar past errors: {}", passages.len());
    println!();
    println!("{}", body);
    Ok(())
}

pub async fn run_errors(config: &Config, limit: i64) -> Result<()> {
    let log = SqliteErrorLog::open(&config.db).await?;
    let rows = log.recent(Some(limit)).await?;
    log.close().await;

    if rows.is_empty() {
        println!("No errors logged.");
        return Ok(());
    }

    for row in rows {
        println!(
            "#{} {} [{}] {}: {}",
            row.id, row.created_at, row.error_code, row.source, row.error_message
        );
    }
    Ok(())
}
