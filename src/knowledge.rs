//! File-backed similarity index over past error messages.
//!
//! Entries live in memory behind an async mutex and are persisted as one JSON
//! document. Saves write a sibling temp file and rename it over the index, so
//! a crash mid-save leaves the previous index intact. `index.flush_every`
//! controls how many appends may accumulate before a save; pending appends
//! are written by [`KnowledgeStore::flush`] at shutdown.
//!
//! The document records the embedding model that produced its vectors. When
//! the configured model differs, stored vectors are discarded on load and
//! those entries take part in keyword retrieval only.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use self_healing_core::embedding::{embed_one, EmbeddingProvider};
use self_healing_core::models::{EntryMetadata, KnowledgeEntry, Passage};
use self_healing_core::search::rank;
use self_healing_core::store::KnowledgeStore;

use crate::config::IndexConfig;

#[derive(Debug, Default, Deserialize)]
struct IndexFile {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    entries: Vec<KnowledgeEntry>,
}

struct IndexState {
    entries: Vec<KnowledgeEntry>,
    pending: usize,
}

pub struct FileKnowledgeStore {
    path: PathBuf,
    flush_every: usize,
    alpha: f64,
    provider: Arc<dyn EmbeddingProvider>,
    state: Mutex<IndexState>,
}

impl FileKnowledgeStore {
    /// Load the index at `config.path`, or start empty if it does not exist.
    pub fn open(config: &IndexConfig, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let entries = match std::fs::read_to_string(&config.path) {
            Ok(content) => {
                let file: IndexFile = serde_json::from_str(&content).with_context(|| {
                    format!("Failed to parse index file: {}", config.path.display())
                })?;
                let current_model = provider.is_enabled().then(|| provider.model_name());
                if file.model.as_deref() != current_model {
                    tracing::warn!(
                        stored = ?file.model,
                        configured = ?current_model,
                        "embedding model changed; stored vectors ignored"
                    );
                    strip_vectors(file.entries)
                } else {
                    file.entries
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read index file: {}", config.path.display())
                })
            }
        };

        tracing::debug!(path = %config.path.display(), entries = entries.len(), "index loaded");

        Ok(Self {
            path: config.path.clone(),
            flush_every: config.flush_every.max(1),
            alpha: config.hybrid_alpha,
            provider,
            state: Mutex::new(IndexState {
                entries,
                pending: 0,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace every entry with `items` (text, source id) and save.
    ///
    /// Texts are embedded in one batch when a provider is enabled.
    pub async fn rebuild(&self, items: Vec<(String, String)>) -> Result<usize> {
        let vectors = if self.provider.is_enabled() && !items.is_empty() {
            let texts: Vec<String> = items.iter().map(|(t, _)| t.clone()).collect();
            Some(self.provider.embed(&texts).await?)
        } else {
            None
        };

        let mut vectors = vectors.map(|v| v.into_iter());
        let entries: Vec<KnowledgeEntry> = items
            .into_iter()
            .map(|(text, source_id)| KnowledgeEntry {
                id: uuid::Uuid::new_v4().to_string(),
                text,
                metadata: EntryMetadata { source_id },
                vector: vectors.as_mut().and_then(|it| it.next()),
            })
            .collect();
        let count = entries.len();

        let mut state = self.state.lock().await;
        state.entries = entries;
        self.save(&state.entries).await?;
        state.pending = 0;

        Ok(count)
    }

    /// Write an empty index file if none exists. Returns whether one was created.
    pub async fn create_if_missing(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        let state = self.state.lock().await;
        self.save(&state.entries).await?;
        Ok(true)
    }

    /// Snapshot of every stored entry in insertion order.
    pub async fn entries(&self) -> Vec<KnowledgeEntry> {
        self.state.lock().await.entries.clone()
    }

    /// Serialize `entries` and replace the index file.
    ///
    /// Callers hold the state lock, so saves never interleave; the file I/O
    /// goes through `tokio::fs` and does not stall the runtime worker.
    async fn save(&self, entries: &[KnowledgeEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file = IndexFileRef {
            model: self
                .provider
                .is_enabled()
                .then(|| self.provider.model_name()),
            dims: self.provider.is_enabled().then(|| self.provider.dims()),
            entries,
        };
        let json = serde_json::to_vec(&file)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write index file: {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace index file: {}", self.path.display()))?;

        tracing::debug!(path = %self.path.display(), entries = entries.len(), "index saved");
        Ok(())
    }
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    model: Option<&'a str>,
    dims: Option<usize>,
    entries: &'a [KnowledgeEntry],
}

fn strip_vectors(entries: Vec<KnowledgeEntry>) -> Vec<KnowledgeEntry> {
    entries
        .into_iter()
        .map(|mut e| {
            e.vector = None;
            e
        })
        .collect()
}

#[async_trait]
impl KnowledgeStore for FileKnowledgeStore {
    async fn record(&self, text: &str, source_id: &str) -> Result<()> {
        // Embed before taking the lock so a slow provider does not block readers.
        let vector = if self.provider.is_enabled() {
            match embed_one(self.provider.as_ref(), text).await {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(error = %e, "embedding failed; entry stored without vector");
                    None
                }
            }
        } else {
            None
        };

        let mut state = self.state.lock().await;
        state.entries.push(KnowledgeEntry {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.to_string(),
            metadata: EntryMetadata {
                source_id: source_id.to_string(),
            },
            vector,
        });
        state.pending += 1;

        if state.pending >= self.flush_every {
            self.save(&state.entries).await?;
            state.pending = 0;
        }
        Ok(())
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        let query_vec = if self.provider.is_enabled() {
            match embed_one(self.provider.as_ref(), query).await {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(error = %e, "query embedding failed; keyword retrieval only");
                    None
                }
            }
        } else {
            None
        };

        let state = self.state.lock().await;
        Ok(rank(
            &state.entries,
            query,
            query_vec.as_deref(),
            self.alpha,
            k,
        ))
    }

    async fn flush(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.pending > 0 {
            self.save(&state.entries).await?;
            state.pending = 0;
        }
        Ok(())
    }

    async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }
}
