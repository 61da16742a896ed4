//! The error pipeline: log → index → classify → explain → notify.
//!
//! [`ErrorPipeline::handle`] runs every stage in order for one
//! [`ErrorEvent`]. Stages are best-effort and never retried. A failing stage
//! is logged and recorded in the [`PipelineReport`] but does not roll back
//! earlier stages or skip later ones, so the caller always gets a
//! classification to put in its response.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::classify::classify;
use crate::explain::{degraded_explanation, Explainer};
use crate::models::{Classification, ErrorEvent, Explanation};
use crate::notify::{format_alert, Notifier};
use crate::prompt::build_prompt;
use crate::store::{ErrorLog, KnowledgeStore};

/// Default number of passages retrieved for an explanation.
pub const DEFAULT_TOP_K: usize = 4;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Logged,
    Indexed,
    Classified,
    Explained,
    Notified,
}

/// A best-effort stage that failed during one pipeline run.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error("error log append failed: {0}")]
    Log(String),
    #[error("knowledge store update failed: {0}")]
    Index(String),
    #[error("passage retrieval failed: {0}")]
    Retrieve(String),
    #[error("explanation failed: {0}")]
    Explanation(String),
    #[error("notification failed: {0}")]
    Notification(String),
}

impl StageFailure {
    pub fn stage(&self) -> Stage {
        match self {
            StageFailure::Log(_) => Stage::Logged,
            StageFailure::Index(_) => Stage::Indexed,
            StageFailure::Retrieve(_) | StageFailure::Explanation(_) => Stage::Explained,
            StageFailure::Notification(_) => Stage::Notified,
        }
    }
}

/// Outcome of one pipeline run.
#[derive(Debug)]
pub struct PipelineReport {
    pub event: ErrorEvent,
    /// Error log row id, when the log append succeeded.
    pub log_id: Option<i64>,
    pub classification: Classification,
    pub explanation: Explanation,
    /// The alert text handed to the notifier.
    pub alert: String,
    pub failures: Vec<StageFailure>,
}

impl PipelineReport {
    pub fn failed(&self, stage: Stage) -> bool {
        self.failures.iter().any(|f| f.stage() == stage)
    }
}

/// Orchestrates the error pipeline over injected collaborators.
pub struct ErrorPipeline {
    log: Arc<dyn ErrorLog>,
    knowledge: Arc<dyn KnowledgeStore>,
    explainer: Explainer,
    notifier: Arc<dyn Notifier>,
    chatbot_url: Option<String>,
    top_k: usize,
}

impl ErrorPipeline {
    pub fn new(
        log: Arc<dyn ErrorLog>,
        knowledge: Arc<dyn KnowledgeStore>,
        explainer: Explainer,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            log,
            knowledge,
            explainer,
            notifier,
            chatbot_url: None,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Link appended to every alert.
    pub fn with_chatbot_url(mut self, url: Option<String>) -> Self {
        self.chatbot_url = url;
        self
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    /// Run every stage for `event`.
    pub async fn handle(&self, event: ErrorEvent) -> PipelineReport {
        let mut failures = Vec::new();

        info!(
            code = %event.code,
            source = %event.source,
            message = %event.raw_message,
            "mutation failed; running error pipeline"
        );

        let log_id = match self.log.append(&event).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "could not append to error log");
                failures.push(StageFailure::Log(e.to_string()));
                None
            }
        };

        let source_id = log_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| event.source.clone());
        if let Err(e) = self.knowledge.record(&event.raw_message, &source_id).await {
            warn!(error = %e, "could not record error in knowledge store");
            failures.push(StageFailure::Index(e.to_string()));
        }

        let classification = classify(&event.raw_message);
        info!(
            category = %classification.category,
            severity = %classification.severity,
            auto_fixable = classification.auto_fixable,
            "error classified"
        );

        let passages = match self.knowledge.retrieve(&event.raw_message, self.top_k).await {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "could not retrieve similar errors");
                failures.push(StageFailure::Retrieve(e.to_string()));
                Vec::new()
            }
        };
        let prompt = build_prompt(classification.category, &event.raw_message);
        let body = match self.explainer.try_explain(&prompt, &passages).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "explanation failed; using degraded text");
                failures.push(StageFailure::Explanation(e.to_string()));
                degraded_explanation(&e)
            }
        };
        let explanation = Explanation {
            category: classification.category,
            severity: classification.severity,
            body,
        };

        let alert = format_alert(
            &event,
            &classification,
            &explanation.body,
            self.chatbot_url.as_deref(),
        );
        match self.notifier.notify(&alert).await {
            Ok(()) => info!("alert posted"),
            Err(e) => {
                warn!(error = %e, "alert post failed");
                failures.push(StageFailure::Notification(e.to_string()));
            }
        }

        PipelineReport {
            event,
            log_id,
            classification,
            explanation,
            alert,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{ChatMessage, CompletionModel};
    use crate::explain::DEGRADED_PREFIX;
    use crate::models::{ErrorCategory, ErrorCode, LoggedError, Passage, Severity};
    use crate::store::memory::{InMemoryErrorLog, InMemoryKnowledgeStore};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedModel(&'static str);

    #[async_trait]
    impl CompletionModel for CannedModel {
        fn model_name(&self) -> &str {
            "canned"
        }
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct BrokenModel;

    #[async_trait]
    impl CompletionModel for BrokenModel {
        fn model_name(&self) -> &str {
            "broken"
        }
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            anyhow::bail!("connection reset by peer")
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        posts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, text: &str) -> Result<()> {
            self.posts.lock().unwrap().push(text.to_string());
            if self.fail {
                anyhow::bail!("webhook returned 500");
            }
            Ok(())
        }
    }

    struct BrokenLog;

    #[async_trait]
    impl ErrorLog for BrokenLog {
        async fn append(&self, _event: &ErrorEvent) -> Result<i64> {
            anyhow::bail!("disk I/O error")
        }
        async fn recent(&self, _limit: Option<i64>) -> Result<Vec<LoggedError>> {
            Ok(Vec::new())
        }
        async fn counts_by_code(&self) -> Result<Vec<(String, i64)>> {
            Ok(Vec::new())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl KnowledgeStore for BrokenStore {
        async fn record(&self, _text: &str, _source_id: &str) -> Result<()> {
            anyhow::bail!("index file not writable")
        }
        async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<Passage>> {
            anyhow::bail!("index not loaded")
        }
        async fn len(&self) -> usize {
            0
        }
    }

    fn duplicate_event() -> ErrorEvent {
        ErrorEvent::new(
            "error returned from database: UNIQUE constraint failed: employee.email",
            ErrorCode::DuplicateKey,
            "add_employee",
        )
    }

    #[tokio::test]
    async fn test_happy_path_runs_every_stage() {
        let log = Arc::new(InMemoryErrorLog::new());
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = ErrorPipeline::new(
            log.clone(),
            store.clone(),
            Explainer::new(Arc::new(CannedModel("Use a unique email."))),
            notifier.clone(),
        )
        .with_chatbot_url(Some("http://chat".to_string()));

        let report = pipeline.handle(duplicate_event()).await;

        assert!(report.failures.is_empty());
        assert_eq!(report.log_id, Some(1));
        assert_eq!(report.classification.category, ErrorCategory::DuplicateData);
        assert_eq!(report.explanation.severity, Severity::Low);
        assert_eq!(report.explanation.body, "Use a unique email.");

        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].metadata.source_id, "1");

        assert_eq!(log.recent(None).await.unwrap().len(), 1);

        let posts = notifier.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].contains("Use a unique email."));
        assert!(posts[0].contains("<http://chat|"));
    }

    #[tokio::test]
    async fn test_explainer_failure_is_non_fatal() {
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = ErrorPipeline::new(
            Arc::new(InMemoryErrorLog::new()),
            Arc::new(InMemoryKnowledgeStore::new()),
            Explainer::new(Arc::new(BrokenModel)),
            notifier.clone(),
        );

        let report = pipeline.handle(duplicate_event()).await;

        assert!(report.failed(Stage::Explained));
        assert!(!report.failed(Stage::Notified));
        assert!(report.explanation.body.starts_with(DEGRADED_PREFIX));
        assert_eq!(report.classification.category, ErrorCategory::DuplicateData);
        assert_eq!(notifier.posts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_every_collaborator_failing_still_classifies_and_notifies_once() {
        let notifier = Arc::new(RecordingNotifier {
            posts: Mutex::new(Vec::new()),
            fail: true,
        });
        let pipeline = ErrorPipeline::new(
            Arc::new(BrokenLog),
            Arc::new(BrokenStore),
            Explainer::new(Arc::new(BrokenModel)),
            notifier.clone(),
        );

        let report = pipeline
            .handle(ErrorEvent::new(
                "Table lock detected: database is locked",
                ErrorCode::LockNotAvailable,
                "add_employee",
            ))
            .await;

        assert_eq!(report.log_id, None);
        assert_eq!(report.classification.category, ErrorCategory::LockContention);
        for stage in [Stage::Logged, Stage::Indexed, Stage::Explained, Stage::Notified] {
            assert!(report.failed(stage), "expected {:?} to fail", stage);
        }
        assert!(!report.failed(Stage::Classified));
        assert_eq!(notifier.posts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_log_failure_tags_entry_with_source() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        let pipeline = ErrorPipeline::new(
            Arc::new(BrokenLog),
            store.clone(),
            Explainer::new(Arc::new(CannedModel("ok"))),
            Arc::new(RecordingNotifier::default()),
        );

        pipeline.handle(duplicate_event()).await;

        assert_eq!(store.entries()[0].metadata.source_id, "add_employee");
    }

    #[tokio::test]
    async fn test_passages_include_prior_errors() {
        let store = Arc::new(InMemoryKnowledgeStore::new());
        store
            .record("UNIQUE constraint failed: employee.email", "past")
            .await
            .unwrap();
        let pipeline = ErrorPipeline::new(
            Arc::new(InMemoryErrorLog::new()),
            store.clone(),
            Explainer::new(Arc::new(CannedModel("ok"))),
            Arc::new(RecordingNotifier::default()),
        )
        .with_top_k(2);

        let report = pipeline.handle(duplicate_event()).await;
        assert!(report.failures.is_empty());
        assert_eq!(store.len().await, 2);

        let passages = store
            .retrieve(&report.event.raw_message, 2)
            .await
            .unwrap();
        assert_eq!(passages[0].source_id, "1");
    }
}
