//! API Service - HTTP surface of the weekly ingestion pipeline
//!
//! Endpoints:
//! - GET /health - Health check
//! - POST /ingest - Upload a spreadsheet (multipart field `file`)
//! - POST /departments/weekly-reports - Bulk upsert weekly reports
//! - GET /weekly-reports - Query stored weekly reports
//! - GET /ingestion-logs - Latest ingestion log entries

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use ingestion::journal::recent_logs;
use ingestion::sink::upsert_weekly_reports;
use ingestion::{IngestionJournal, IngestionResult, IngestionService, ReportSink, WeeklyReportUpsert};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Largest accepted upload body
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

// ============================================================================
// State
// ============================================================================

pub struct AppState {
    pub pool: PgPool,
    pub service: IngestionService<Arc<dyn ReportSink>>,
    pub journal: Arc<dyn IngestionJournal>,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

#[derive(Serialize)]
struct IngestResponse {
    message: &'static str,
    details: IngestionResult,
}

#[derive(Serialize)]
struct UpsertResponse {
    count: usize,
}

#[derive(Serialize, sqlx::FromRow)]
struct WeeklyReportRow {
    id: i64,
    department_code: String,
    week_no: i32,
    avg_attendance: f64,
    avg_test_pass: f64,
    units_covered: f64,
    total_units: f64,
    risk_level: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Query params
// ============================================================================

#[derive(Deserialize)]
struct WeeklyReportsQuery {
    week_no: Option<i32>,
    department_code: Option<String>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct LogsQuery {
    limit: Option<i64>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

struct Upload {
    file_name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

async fn ingest_handler(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut upload = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
        };

        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        match field.bytes().await {
            Ok(bytes) => {
                upload = Some(Upload {
                    file_name,
                    mime_type,
                    bytes: bytes.to_vec(),
                });
                break;
            }
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
        }
    }

    let Some(upload) = upload else {
        return error_response(StatusCode::BAD_REQUEST, "No file uploaded");
    };

    info!(
        file = %upload.file_name,
        mime = %upload.mime_type,
        bytes = upload.bytes.len(),
        "Received upload"
    );

    let result = state
        .service
        .process_file_logged(
            state.journal.as_ref(),
            &upload.bytes,
            &upload.file_name,
            &upload.mime_type,
        )
        .await;

    match result {
        Ok(details) => Json(IngestResponse {
            message: "File processing completed",
            details,
        })
        .into_response(),
        Err(e) => {
            warn!(file = %upload.file_name, error = %e, "Ingestion failed");
            let status = if e.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            error_response(status, e.to_string())
        }
    }
}

async fn upsert_weekly_reports_handler(
    State(state): State<Arc<AppState>>,
    Json(reports): Json<Vec<WeeklyReportUpsert>>,
) -> Response {
    match upsert_weekly_reports(&state.pool, &reports).await {
        Ok(count) => Json(UpsertResponse { count }).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn weekly_reports_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WeeklyReportsQuery>,
) -> Response {
    let limit = params.limit.unwrap_or(100).clamp(1, 1000);

    // Build dynamic query
    let mut query = String::from(
        r#"
        SELECT id, department_code, week_no, avg_attendance, avg_test_pass,
               units_covered, total_units, risk_level, created_at, updated_at
        FROM weekly_reports
        WHERE 1=1
        "#,
    );

    let mut idx = 1;

    if params.week_no.is_some() {
        query.push_str(&format!(" AND week_no = ${}", idx));
        idx += 1;
    }
    if params.department_code.is_some() {
        query.push_str(&format!(" AND department_code = ${}", idx));
        idx += 1;
    }

    query.push_str(&format!(
        " ORDER BY week_no DESC, department_code LIMIT ${}",
        idx
    ));

    let mut q = sqlx::query_as::<_, WeeklyReportRow>(&query);

    if let Some(week_no) = params.week_no {
        q = q.bind(week_no);
    }
    if let Some(code) = params.department_code {
        q = q.bind(code.trim().to_uppercase());
    }
    q = q.bind(limit);

    match q.fetch_all(&state.pool).await {
        Ok(rows) => Json(serde_json::json!({ "weekly_reports": rows })).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn ingestion_logs_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogsQuery>,
) -> Response {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);

    match recent_logs(&state.pool, limit).await {
        Ok(logs) => Json(serde_json::json!({ "ingestion_logs": logs })).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn build_router(state: Arc<AppState>) -> Router {
    // CORS for the upload frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ingest", post(ingest_handler))
        .route(
            "/departments/weekly-reports",
            post(upsert_weekly_reports_handler),
        )
        .route("/weekly-reports", get(weekly_reports_handler))
        .route("/ingestion-logs", get(ingestion_logs_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
