use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::pipeline::ingest::IngestError;
use crate::pipeline::metrics::engine::{self, CandidateQuery, QueryFilters, Timeframe};
use crate::pipeline::metrics::views::{
    CandidatePage, DashboardStats, DrilldownRow, ExecutiveBrief, IntelligenceReport, JobRollup,
    MetaView,
};
use crate::pipeline::service::{PipelineService, ScrubOutcome};
use crate::pipeline::store::StoreError;

/// Router builder exposing the ingestion, analytics, admin, and security
/// endpoints.
pub fn pipeline_router(service: Arc<PipelineService>) -> Router {
    Router::new()
        .route("/api/v1/pipeline/uploads", post(upload_handler).get(uploads_handler))
        .route(
            "/api/v1/pipeline/uploads/:batch_id/revert",
            post(revert_handler),
        )
        .route("/api/v1/pipeline/meta", get(meta_handler))
        .route("/api/v1/pipeline/stats", get(stats_handler))
        .route("/api/v1/pipeline/candidates", get(candidates_handler))
        .route("/api/v1/pipeline/jobs", get(jobs_handler))
        .route("/api/v1/pipeline/executive-brief", get(brief_handler))
        .route("/api/v1/pipeline/intelligence", get(intelligence_handler))
        .route("/api/v1/pipeline/drilldown", get(drilldown_handler))
        .route("/api/v1/admin/health", get(admin_health_handler))
        .route("/api/v1/security/scrub", post(scrub_handler))
        .route("/api/v1/security/status", get(scrubber_status_handler))
        .route("/api/v1/security/toggle", post(scrubber_toggle_handler))
        .route("/api/v1/security/audit-logs", get(audit_logs_handler))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadRequest {
    pub(crate) filename: String,
    pub(crate) csv: String,
}

/// Dashboard slicers as they arrive on the query string; "all" means no
/// filter, matching what the frontend sends for an untouched dropdown.
#[derive(Debug, Deserialize)]
pub(crate) struct SlicerQuery {
    #[serde(default = "all_literal")]
    pub(crate) timeframe: String,
    #[serde(default = "all_literal")]
    pub(crate) department: String,
    #[serde(default = "all_literal")]
    pub(crate) recruiter: String,
}

fn all_literal() -> String {
    "all".to_string()
}

impl SlicerQuery {
    fn filters(&self) -> QueryFilters {
        let unless_all = |value: &str| {
            if value == "all" {
                None
            } else {
                Some(value.to_string())
            }
        };
        QueryFilters {
            timeframe: Timeframe::parse(&self.timeframe),
            department: unless_all(&self.department),
            recruiter: unless_all(&self.recruiter),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidatesQuery {
    #[serde(default = "default_page")]
    pub(crate) page: usize,
    #[serde(default = "default_limit")]
    pub(crate) limit: usize,
    #[serde(default)]
    pub(crate) search: Option<String>,
    #[serde(default = "default_sort_by")]
    pub(crate) sort_by: String,
    #[serde(default = "default_sort_dir")]
    pub(crate) sort_dir: String,
    #[serde(default = "all_literal")]
    pub(crate) timeframe: String,
    #[serde(default = "all_literal")]
    pub(crate) department: String,
    #[serde(default = "all_literal")]
    pub(crate) recruiter: String,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    50
}

fn default_sort_by() -> String {
    "days_in_process".to_string()
}

fn default_sort_dir() -> String {
    "desc".to_string()
}

#[derive(Debug, Deserialize)]
pub(crate) struct DrilldownQuery {
    pub(crate) month_name: String,
    #[serde(default = "all_literal")]
    pub(crate) timeframe: String,
    #[serde(default = "all_literal")]
    pub(crate) department: String,
    #[serde(default = "all_literal")]
    pub(crate) recruiter: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuditQuery {
    #[serde(default = "default_limit")]
    pub(crate) limit: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToggleRequest {
    pub(crate) enable: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScrubRequest {
    pub(crate) text: String,
}

pub(crate) async fn upload_handler(
    State(service): State<Arc<PipelineService>>,
    Json(payload): Json<UploadRequest>,
) -> Response {
    match service.ingest_csv(&payload.filename, &payload.csv, Local::now().naive_local()) {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(err @ (IngestError::Validation(_) | IngestError::Csv(_))) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn uploads_handler(
    State(service): State<Arc<PipelineService>>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let history = service.batch_history(query.limit)?;
    Ok(Json(json!({ "uploads": history })))
}

pub(crate) async fn revert_handler(
    State(service): State<Arc<PipelineService>>,
    Path(batch_id): Path<String>,
) -> Response {
    match service.revert_batch(&batch_id, Local::now().naive_local()) {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(err @ StoreError::BatchNotFound(_)) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn meta_handler(
    State(service): State<Arc<PipelineService>>,
) -> Result<Json<MetaView>, AppError> {
    Ok(Json(engine::meta(&service.rows()?)))
}

pub(crate) async fn stats_handler(
    State(service): State<Arc<PipelineService>>,
    Query(query): Query<SlicerQuery>,
) -> Result<Json<DashboardStats>, AppError> {
    let today = Local::now().date_naive();
    Ok(Json(engine::dashboard_stats(
        &service.rows()?,
        &query.filters(),
        today,
    )))
}

pub(crate) async fn candidates_handler(
    State(service): State<Arc<PipelineService>>,
    Query(query): Query<CandidatesQuery>,
) -> Result<Json<CandidatePage>, AppError> {
    let today = Local::now().date_naive();
    let filters = SlicerQuery {
        timeframe: query.timeframe,
        department: query.department,
        recruiter: query.recruiter,
    }
    .filters();
    let query = CandidateQuery {
        page: query.page,
        limit: query.limit,
        search: query.search,
        sort_by: query.sort_by,
        sort_dir: query.sort_dir,
    };
    Ok(Json(engine::candidate_page(
        &service.rows()?,
        &filters,
        &query,
        today,
    )))
}

pub(crate) async fn jobs_handler(
    State(service): State<Arc<PipelineService>>,
    Query(query): Query<SlicerQuery>,
) -> Result<Json<Vec<JobRollup>>, AppError> {
    let today = Local::now().date_naive();
    Ok(Json(engine::job_rollups(
        &service.rows()?,
        &query.filters(),
        today,
    )))
}

pub(crate) async fn brief_handler(
    State(service): State<Arc<PipelineService>>,
    Query(query): Query<SlicerQuery>,
) -> Result<Json<ExecutiveBrief>, AppError> {
    let today = Local::now().date_naive();
    Ok(Json(engine::executive_brief(
        &service.rows()?,
        &query.filters(),
        today,
    )))
}

pub(crate) async fn intelligence_handler(
    State(service): State<Arc<PipelineService>>,
    Query(query): Query<SlicerQuery>,
) -> Result<Json<IntelligenceReport>, AppError> {
    let today = Local::now().date_naive();
    Ok(Json(engine::intelligence(
        &service.rows()?,
        &query.filters(),
        today,
    )))
}

pub(crate) async fn drilldown_handler(
    State(service): State<Arc<PipelineService>>,
    Query(query): Query<DrilldownQuery>,
) -> Result<Json<Vec<DrilldownRow>>, AppError> {
    let today = Local::now().date_naive();
    let filters = SlicerQuery {
        timeframe: query.timeframe,
        department: query.department,
        recruiter: query.recruiter,
    }
    .filters();
    Ok(Json(engine::month_drilldown(
        &service.rows()?,
        &filters,
        &query.month_name,
        today,
    )))
}

pub(crate) async fn admin_health_handler(
    State(service): State<Arc<PipelineService>>,
) -> Result<Json<crate::pipeline::store::DataHealth>, AppError> {
    Ok(Json(service.data_health()?))
}

pub(crate) async fn scrub_handler(
    State(service): State<Arc<PipelineService>>,
    Json(payload): Json<ScrubRequest>,
) -> Response {
    match service.scrub(&payload.text, Local::now().naive_local()) {
        Ok(ScrubOutcome::Disabled) => {
            let payload = json!({ "status": "disabled" });
            (StatusCode::FORBIDDEN, Json(payload)).into_response()
        }
        Ok(ScrubOutcome::Scrubbed(report)) => {
            let payload = json!({
                "status": "ok",
                "scrubbed_text": report.text,
                "redactions": {
                    "emails": report.counts.emails,
                    "phones": report.counts.phones,
                    "id_numbers": report.counts.id_numbers,
                    "total": report.counts.total(),
                },
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn scrubber_status_handler(
    State(service): State<Arc<PipelineService>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let enabled = service.scrubber_status()?;
    Ok(Json(json!({ "enabled": enabled })))
}

pub(crate) async fn scrubber_toggle_handler(
    State(service): State<Arc<PipelineService>>,
    Json(payload): Json<ToggleRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let enabled = service.set_scrubber(payload.enable, Local::now().naive_local())?;
    Ok(Json(json!({ "enabled": enabled })))
}

pub(crate) async fn audit_logs_handler(
    State(service): State<Arc<PipelineService>>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let logs = service.audit_trail(query.limit)?;
    Ok(Json(json!({ "logs": logs })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::store::SqliteStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_router(scrubber_default: bool) -> Router {
        let dir = tempfile::tempdir().expect("tempdir");
        // Leak the tempdir so the database outlives the router under test.
        let path = Box::leak(Box::new(dir)).path().join("pipeline.db");
        let store = SqliteStore::open(path).expect("store opens");
        pipeline_router(Arc::new(PipelineService::new(store, scrubber_default)))
    }

    #[tokio::test]
    async fn upload_then_stats_round_trip() {
        let router = test_router(true);

        let upload = Request::builder()
            .method("POST")
            .uri("/api/v1/pipeline/uploads")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "filename": "weekly.csv",
                    "csv": "שם מועמד,שם המשרה,מצב שיוך למשרה\nדנה לוי,מפתח Backend,חדש\n",
                })
                .to_string(),
            ))
            .expect("request");
        let response = router.clone().oneshot(upload).await.expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);

        let stats = Request::builder()
            .uri("/api/v1/pipeline/stats")
            .body(Body::empty())
            .expect("request");
        let response = router.oneshot(stats).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_upload_is_rejected_with_bad_request() {
        let router = test_router(true);
        let upload = Request::builder()
            .method("POST")
            .uri("/api/v1/pipeline/uploads")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "filename": "broken.csv",
                    "csv": "שם מועמד,סטטוס\nדנה,חדש\n",
                })
                .to_string(),
            ))
            .expect("request");
        let response = router.oneshot(upload).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn jobs_endpoint_applies_the_department_slicer() {
        let router = test_router(true);

        let upload = Request::builder()
            .method("POST")
            .uri("/api/v1/pipeline/uploads")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "filename": "weekly.csv",
                    "csv": "שם מועמד,שם המשרה,רמה 2\n\
                            דנה לוי,מפתח Backend,פיתוח\n\
                            נעם כהן,נציג שירות,שירות\n",
                })
                .to_string(),
            ))
            .expect("request");
        let response = router.clone().oneshot(upload).await.expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);

        let jobs = Request::builder()
            .uri("/api/v1/pipeline/jobs?department=R%26D")
            .body(Body::empty())
            .expect("request");
        let response = router.oneshot(jobs).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let rollups: serde_json::Value = serde_json::from_slice(&body).expect("json");
        let rollups = rollups.as_array().expect("array");
        assert_eq!(rollups.len(), 1);
        assert_eq!(rollups[0]["job_title"], "מפתח Backend");
    }

    #[tokio::test]
    async fn unknown_batch_revert_is_not_found() {
        let router = test_router(true);
        let revert = Request::builder()
            .method("POST")
            .uri("/api/v1/pipeline/uploads/deadbeef/revert")
            .body(Body::empty())
            .expect("request");
        let response = router.oneshot(revert).await.expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn scrub_is_refused_while_disabled() {
        let router = test_router(false);
        let scrub = Request::builder()
            .method("POST")
            .uri("/api/v1/security/scrub")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "text": "ת.ז 305123456" }).to_string(),
            ))
            .expect("request");
        let response = router.oneshot(scrub).await.expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
