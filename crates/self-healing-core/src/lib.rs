//! # Self-Healing Core
//!
//! Shared logic for the self-healing records service: data models, the error
//! classifier, category prompt templates, passage ranking, the storage and
//! collaborator traits, and the error pipeline that ties them together.
//!
//! This crate contains no tokio, sqlx, axum, or HTTP client dependencies.
//! Concrete backends (SQLite error log, file-backed similarity index, OpenAI
//! completion client, chat webhook) live in the `self-healing` app crate.
//!
//! ```text
//!  mutation failure
//!        │
//!        ▼
//!  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐
//!  │ ErrorLog │─▶│Knowledge │─▶│ classify │─▶│Explainer │─▶│ Notifier │
//!  │  append  │  │  record  │  │          │  │ (+ RAG)  │  │   post   │
//!  └──────────┘  └──────────┘  └──────────┘  └──────────┘  └──────────┘
//! ```

pub mod classify;
pub mod completion;
pub mod embedding;
pub mod explain;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod prompt;
pub mod search;
pub mod store;
