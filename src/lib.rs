//! # Self-Healing
//!
//! A small records service that diagnoses its own database failures.
//!
//! Every failed write is logged, added to a similarity index of past errors,
//! classified by pattern, explained by a hosted language model with similar
//! past errors as context, and announced to a chat webhook. The caller still
//! gets a prompt HTTP error carrying the category and severity.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  fail  ┌──────────────────────────────────────────────┐
//! │ POST /add-…  │───────▶│ log → index → classify → explain → notify     │
//! └──────────────┘        └──────┬─────────┬──────────────┬──────────┬───┘
//!                                ▼         ▼              ▼          ▼
//!                           error_logs  index.json    OpenAI     webhook
//! ```
//!
//! The pipeline itself, the classifier, the prompts, and ranking live in the
//! `self-healing-core` crate. This crate supplies the SQLite, HTTP, and
//! file-backed implementations.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`employees`] | Employee table access |
//! | [`error`] | Mutation failure mapping |
//! | [`error_log`] | SQLite error log |
//! | [`query`] | Read-only query guard and execution |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Completion model client |
//! | [`knowledge`] | File-backed similarity index |
//! | [`notify`] | Webhook notifier |
//! | [`chat`] | Debugging assistant |
//! | [`server`] | HTTP server |

pub mod chat;
pub mod config;
pub mod db;
pub mod diagnose;
pub mod embedding;
pub mod employees;
pub mod error;
pub mod error_log;
pub mod index_cmd;
pub mod knowledge;
pub mod llm;
pub mod migrate;
pub mod notify;
pub mod query;
pub mod retry;
pub mod server;
