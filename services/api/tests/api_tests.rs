//! Route tests for the API service
//!
//! The pool is lazy and never connected: every route exercised here stops
//! before touching the database.

use api::{build_router, AppState};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use ingestion::{IngestionService, NoopJournal, ReportSink, SinkError, WeeklyReportUpsert};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt; // for `oneshot`

const BOUNDARY: &str = "weekly-report-boundary";

const WEEK_ONE_CSV: &str = "\
Branch,Week,Sessions,Avg Attendance,Pass %,Covered Topics,Total Topics
CSE,1,5,85%,75%,5,50
ECE,1,4,60%,40%,4,50
MECH,1,3,105%,20%,2,40
";

#[derive(Default)]
struct RecordingSink {
    published: Mutex<Vec<WeeklyReportUpsert>>,
}

#[async_trait]
impl ReportSink for RecordingSink {
    async fn publish(&self, reports: &[WeeklyReportUpsert]) -> Result<(), SinkError> {
        self.published.lock().unwrap().extend_from_slice(reports);
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl ReportSink for FailingSink {
    async fn publish(&self, _reports: &[WeeklyReportUpsert]) -> Result<(), SinkError> {
        Err(SinkError::Rejected("502 Bad Gateway".to_string()))
    }
}

/// Test helper: app around the given sink with a journal that records nothing
fn setup_app(sink: Arc<dyn ReportSink>) -> axum::Router {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/weekly_reports_test")
        .unwrap();

    build_router(Arc::new(AppState {
        pool,
        service: IngestionService::new(sink),
        journal: Arc::new(NoopJournal),
    }))
}

/// Test helper: multipart request with one field
fn multipart_request(field: &str, file_name: &str, mime: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", mime).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/ingest")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = setup_app(Arc::new(RecordingSink::default()));

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["ok"], true);
    assert!(body["version"].is_string());
}

// =============================================================================
// Upload
// =============================================================================

#[tokio::test]
async fn test_ingest_csv_upload() {
    let sink = Arc::new(RecordingSink::default());
    let app = setup_app(sink.clone());

    let request = multipart_request("file", "week1.csv", "text/csv", WEEK_ONE_CSV.as_bytes());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["message"], "File processing completed");
    assert_eq!(body["details"]["success"], 2);
    assert_eq!(body["details"]["fails"], 1);
    assert_eq!(body["details"]["anomalies"][0]["row_index"], 3);
    assert_eq!(body["details"]["anomalies"][0]["severity"], "CRITICAL");
    assert_eq!(
        body["details"]["anomalies"][0]["issue"],
        "Impossible Attendance %: 105"
    );

    let published = sink.published.lock().unwrap();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].department_code, "CSE");
}

#[tokio::test]
async fn test_ingest_without_file_field() {
    let app = setup_app(Arc::new(RecordingSink::default()));

    let request = multipart_request("attachment", "week1.csv", "text/csv", WEEK_ONE_CSV.as_bytes());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "No file uploaded");
}

#[tokio::test]
async fn test_ingest_unsupported_type() {
    let app = setup_app(Arc::new(RecordingSink::default()));

    let request = multipart_request("file", "notes.txt", "text/plain", b"hello");
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Unsupported file type: text/plain");
}

#[tokio::test]
async fn test_ingest_corrupt_workbook() {
    let app = setup_app(Arc::new(RecordingSink::default()));

    let request = multipart_request(
        "file",
        "week1.xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        b"not really a workbook",
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_ingest_backend_failure() {
    let app = setup_app(Arc::new(FailingSink));

    let request = multipart_request("file", "week1.csv", "text/csv", WEEK_ONE_CSV.as_bytes());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Backend sync failed");
}

// =============================================================================
// Bulk upsert
// =============================================================================

#[tokio::test]
async fn test_bulk_upsert_rejects_malformed_json() {
    let app = setup_app(Arc::new(RecordingSink::default()));

    let request = Request::builder()
        .method("POST")
        .uri("/departments/weekly-reports")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("[{\"departmentCode\": \"CSE\""))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
}
