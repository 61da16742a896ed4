//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/employees` | List employees |
//! | `POST` | `/add-employee` | Insert an employee; failures run the error pipeline |
//! | `POST` | `/query` | Run a read-only `SELECT` |
//! | `POST` | `/chat` | Ask the debugging assistant |
//! | `GET`  | `/errors` | Recent error log rows, newest first |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Every error response is a flat JSON object:
//!
//! ```json
//! { "error": "Duplicate email. Logged in error_logs.", "category": "DUPLICATE_DATA", "severity": "LOW" }
//! ```
//!
//! `category` and `severity` are present only on failed mutations.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use self_healing_core::completion::CompletionModel;
use self_healing_core::explain::Explainer;
use self_healing_core::models::{Classification, ErrorCategory, LoggedError, Severity};
use self_healing_core::notify::Notifier;
use self_healing_core::pipeline::ErrorPipeline;
use self_healing_core::store::{ErrorLog, KnowledgeStore};

use crate::chat::{Assistant, ChatRequest};
use crate::config::Config;
use crate::embedding::create_provider;
use crate::employees::{self, Employee, NewEmployee};
use crate::error::MutationError;
use crate::error_log::SqliteErrorLog;
use crate::knowledge::FileKnowledgeStore;
use crate::llm::create_model;
use crate::notify::create_notifier;
use crate::query::{run_read_only, validate_read_only};
use crate::{db, migrate};

const DEFAULT_ERRORS_LIMIT: i64 = 50;

/// The collaborators the pipeline and the assistant are built from.
pub struct Services {
    pub log: Arc<dyn ErrorLog>,
    pub knowledge: Arc<dyn KnowledgeStore>,
    pub model: Arc<dyn CompletionModel>,
    pub notifier: Arc<dyn Notifier>,
}

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    log: Arc<dyn ErrorLog>,
    pipeline: Arc<ErrorPipeline>,
    assistant: Arc<Assistant>,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        services: Services,
        chatbot_url: Option<String>,
        top_k: usize,
    ) -> Self {
        let pipeline = ErrorPipeline::new(
            services.log.clone(),
            services.knowledge.clone(),
            Explainer::new(services.model.clone()),
            services.notifier,
        )
        .with_chatbot_url(chatbot_url)
        .with_top_k(top_k);

        let assistant = Assistant::new(
            pool.clone(),
            services.log.clone(),
            services.knowledge,
            services.model,
            top_k,
        );

        Self {
            pool,
            log: services.log,
            pipeline: Arc::new(pipeline),
            assistant: Arc::new(assistant),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/employees", get(handle_list_employees))
        .route("/add-employee", post(handle_add_employee))
        .route("/query", post(handle_query))
        .route("/chat", post(handle_chat))
        .route("/errors", get(handle_errors))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`.
///
/// Runs until Ctrl+C or SIGTERM, then flushes the similarity index and closes
/// both database pools.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(&config.db).await?;
    migrate::apply_data(&pool).await?;
    let log = Arc::new(SqliteErrorLog::open(&config.db).await?);

    let provider = create_provider(&config.embedding)?;
    let knowledge = Arc::new(FileKnowledgeStore::open(&config.index, provider)?);
    let services = Services {
        log: log.clone(),
        knowledge: knowledge.clone(),
        model: create_model(&config.llm)?,
        notifier: create_notifier(&config.notify)?,
    };
    let state = AppState::new(
        pool.clone(),
        services,
        config.notify.chatbot_url.clone(),
        config.index.top_k,
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    let entries = knowledge.len().await;
    info!(
        bind = %config.server.bind,
        index = %knowledge.path().display(),
        entries,
        "server listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    knowledge.flush().await?;
    pool.close().await;
    log.close().await;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<ErrorCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    severity: Option<Severity>,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    classification: Option<Classification>,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            classification: None,
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            classification: None,
        }
    }

    fn mutation(err: &MutationError, classification: Classification) -> Self {
        Self {
            status: err.status(),
            message: err.public_message(),
            classification: Some(classification),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            category: self.classification.map(|c| c.category),
            severity: self.classification.map(|c| c.severity),
        };
        (self.status, Json(body)).into_response()
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Employees ============

async fn handle_list_employees(
    State(state): State<AppState>,
) -> Result<Json<Vec<Employee>>, AppError> {
    employees::list_employees(&state.pool)
        .await
        .map(Json)
        .map_err(|e| AppError::internal(e.to_string()))
}

/// Handler for `POST /add-employee`.
///
/// A missing field is a 400 and never reaches the database. A failed insert
/// runs the full error pipeline before the response is sent, so the returned
/// category and severity always match what was logged and announced.
async fn handle_add_employee(
    State(state): State<AppState>,
    payload: Result<Json<NewEmployee>, JsonRejection>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let Json(body) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;
    let employee = body.validate().map_err(AppError::bad_request)?;

    match employees::add_employee(&state.pool, &employee).await {
        Ok(id) => {
            info!(id, email = %employee.email, "employee added");
            Ok((
                StatusCode::CREATED,
                Json(serde_json::json!({ "message": "Employee added ✅", "id": id })),
            ))
        }
        Err(err) => {
            let report = state.pipeline.handle(err.to_event("add_employee")).await;
            Err(AppError::mutation(&err, report.classification))
        }
    }
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query: String,
}

async fn handle_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Json(body) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;
    let sql = validate_read_only(&body.query).map_err(|e| AppError::bad_request(e.to_string()))?;

    let rows = run_read_only(&state.pool, sql)
        .await
        .map_err(|e| AppError::internal(e.to_string()))?;

    Ok(Json(serde_json::json!({
        "row_count": rows.len(),
        "result": rows,
    })))
}

// ============ POST /chat ============

async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;
    if request.question.trim().is_empty() {
        return Err(AppError::bad_request("question must not be empty"));
    }

    let answer = state.assistant.ask(&request).await.map_err(|e| {
        error!(error = %e, "chat failed");
        AppError::internal(e.to_string())
    })?;

    Ok(Json(serde_json::json!({ "answer": answer })))
}

// ============ GET /errors ============

#[derive(Deserialize)]
struct ErrorsParams {
    limit: Option<i64>,
}

async fn handle_errors(
    State(state): State<AppState>,
    params: Result<Query<ErrorsParams>, QueryRejection>,
) -> Result<Json<Vec<LoggedError>>, AppError> {
    let Query(params) = params.map_err(|e| AppError::bad_request(e.body_text()))?;
    let limit = params.limit.unwrap_or(DEFAULT_ERRORS_LIMIT);
    if limit <= 0 {
        return Err(AppError::bad_request("limit must be > 0"));
    }

    state
        .log
        .recent(Some(limit))
        .await
        .map(Json)
        .map_err(|e| AppError::internal(e.to_string()))
}
