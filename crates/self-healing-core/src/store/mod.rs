//! Storage abstractions for the error pipeline.
//!
//! - [`ErrorLog`] is the append-only log of failed mutations.
//! - [`KnowledgeStore`] is the append-only similarity index over past error
//!   messages.
//!
//! Implementations must be `Send + Sync` so one handle can be shared by every
//! request.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ErrorEvent, LoggedError, Passage};

/// Append-only log of caught mutation failures.
#[async_trait]
pub trait ErrorLog: Send + Sync {
    /// Durably append an event, returning its row id.
    async fn append(&self, event: &ErrorEvent) -> Result<i64>;

    /// Most recent entries first. `None` returns every entry.
    async fn recent(&self, limit: Option<i64>) -> Result<Vec<LoggedError>>;

    /// Number of logged errors per error code, most frequent first.
    async fn counts_by_code(&self) -> Result<Vec<(String, i64)>>;
}

/// Append-only similarity index over past error messages.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`record`](KnowledgeStore::record) | Append a message tagged with its source id |
/// | [`retrieve`](KnowledgeStore::retrieve) | Top-k most similar stored passages |
/// | [`flush`](KnowledgeStore::flush) | Persist any pending appends |
/// | [`len`](KnowledgeStore::len) | Number of stored entries |
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Append `text` to the index.
    async fn record(&self, text: &str, source_id: &str) -> Result<()>;

    /// Return up to `k` stored passages most similar to `query`, best first.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>>;

    /// Persist any appends the flush policy has not yet written.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
