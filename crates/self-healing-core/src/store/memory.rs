//! In-memory [`ErrorLog`] and [`KnowledgeStore`] implementations for tests.
//!
//! Uses `Vec` behind `std::sync::RwLock`. Retrieval is keyword-only.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{EntryMetadata, ErrorEvent, KnowledgeEntry, LoggedError, Passage};
use crate::search::rank;

use super::{ErrorLog, KnowledgeStore};

/// In-memory error log.
#[derive(Default)]
pub struct InMemoryErrorLog {
    rows: RwLock<Vec<LoggedError>>,
}

impl InMemoryErrorLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ErrorLog for InMemoryErrorLog {
    async fn append(&self, event: &ErrorEvent) -> Result<i64> {
        let mut rows = self.rows.write().unwrap();
        let id = rows.len() as i64 + 1;
        rows.push(LoggedError {
            id,
            error_code: event.code.as_str().to_string(),
            error_message: event.raw_message.clone(),
            source: event.source.clone(),
            created_at: event.timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        });
        Ok(id)
    }

    async fn recent(&self, limit: Option<i64>) -> Result<Vec<LoggedError>> {
        let rows = self.rows.read().unwrap();
        let take = limit.map(|l| l.max(0) as usize).unwrap_or(rows.len());
        Ok(rows.iter().rev().take(take).cloned().collect())
    }

    async fn counts_by_code(&self) -> Result<Vec<(String, i64)>> {
        let rows = self.rows.read().unwrap();
        let mut counts: HashMap<String, i64> = HashMap::new();
        for r in rows.iter() {
            *counts.entry(r.error_code.clone()).or_insert(0) += 1;
        }
        let mut counts: Vec<(String, i64)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(counts)
    }
}

/// In-memory, keyword-only similarity index.
#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    entries: RwLock<Vec<KnowledgeEntry>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored entry in insertion order.
    pub fn entries(&self) -> Vec<KnowledgeEntry> {
        self.entries.read().unwrap().clone()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn record(&self, text: &str, source_id: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        let id = format!("mem-{}", entries.len());
        entries.push(KnowledgeEntry {
            id,
            text: text.to_string(),
            metadata: EntryMetadata {
                source_id: source_id.to_string(),
            },
            vector: None,
        });
        Ok(())
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        let entries = self.entries.read().unwrap();
        Ok(rank(&entries, query, None, 0.0, k))
    }

    async fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }
}
