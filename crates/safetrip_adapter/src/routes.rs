#![forbid(unsafe_code)]

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::middleware::map_response;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use safetrip_kernel_contracts::alert::{AlertCreateRequest, AlertListParams, AlertPage, AlertRecord};
use safetrip_kernel_contracts::dashboard::{AnalyticsReport, DashboardSummary};
use safetrip_kernel_contracts::issuance::{
    IssuanceRecord, IssuanceVerification, IssueReceipt, IssueRequest,
};
use safetrip_kernel_contracts::location::{GpsPing, GpsPingInput};
use safetrip_kernel_contracts::user::{LoginRequest, SignupRequest};
use safetrip_os::auth::AuthSession;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::error::{envelope_method_not_allowed, ApiEnvelope, ApiError, ApiJson, ApiQuery, Caller};
use crate::AppRuntime;

pub type SharedRuntime = Arc<AppRuntime>;

type ApiResult<T> = Result<(StatusCode, Json<ApiEnvelope<T>>), ApiError>;

const ALERT_CREATED_MESSAGE: &str = "Alert created and emergency services notified";

fn respond<T>(status: StatusCode, data: T) -> ApiResult<T> {
    Ok((status, Json(ApiEnvelope::ok(data))))
}

pub fn build_router(runtime: SharedRuntime) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/alerts", post(create_alert).get(list_alerts))
        .route("/api/alerts/:id/acknowledge", put(acknowledge_alert))
        .route("/api/blockchain/issue", post(issue_identity))
        .route("/api/blockchain/verify/:blockchain_id", get(verify_identity))
        .route("/api/blockchain/issuances", get(list_issuances))
        .route("/api/dashboard", get(dashboard_summary))
        .route("/api/dashboard/analytics", get(dashboard_analytics))
        .route("/gps", post(record_gps))
        .route("/data", get(gps_data))
        .fallback(route_not_found)
        .layer(map_response(envelope_method_not_allowed))
        .layer(cors)
        .with_state(runtime)
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: String,
    /// Seconds since the runtime was wired.
    pub uptime: f64,
}

async fn health(State(runtime): State<SharedRuntime>) -> ApiResult<HealthReport> {
    respond(
        StatusCode::OK,
        HealthReport {
            status: "OK",
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            uptime: runtime.uptime().as_secs_f64(),
        },
    )
}

async fn signup(
    State(runtime): State<SharedRuntime>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> ApiResult<AuthSession> {
    respond(StatusCode::CREATED, runtime.auth.signup(req, Utc::now())?)
}

async fn login(
    State(runtime): State<SharedRuntime>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<AuthSession> {
    respond(StatusCode::OK, runtime.auth.login(req, Utc::now())?)
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertCreated {
    pub alert: AlertRecord,
    pub message: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertAcknowledged {
    pub alert: AlertRecord,
}

async fn create_alert(
    State(runtime): State<SharedRuntime>,
    Caller(caller): Caller,
    ApiJson(req): ApiJson<AlertCreateRequest>,
) -> ApiResult<AlertCreated> {
    let alert = runtime.alerts.create(&caller.user_id, req, Utc::now())?;
    respond(
        StatusCode::CREATED,
        AlertCreated {
            alert,
            message: ALERT_CREATED_MESSAGE,
        },
    )
}

async fn list_alerts(
    State(runtime): State<SharedRuntime>,
    Caller(caller): Caller,
    ApiQuery(params): ApiQuery<AlertListParams>,
) -> ApiResult<AlertPage> {
    let page = runtime.alerts.list(&caller.user_id, &params.to_query())?;
    respond(StatusCode::OK, page)
}

async fn acknowledge_alert(
    State(runtime): State<SharedRuntime>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> ApiResult<AlertAcknowledged> {
    let alert = runtime
        .alerts
        .acknowledge(&id, &caller.user_id, Utc::now())?;
    respond(StatusCode::OK, AlertAcknowledged { alert })
}

async fn issue_identity(
    State(runtime): State<SharedRuntime>,
    Caller(caller): Caller,
    ApiJson(req): ApiJson<IssueRequest>,
) -> ApiResult<IssueReceipt> {
    let record = runtime.issuance.issue(&caller.user_id, req, Utc::now())?;
    respond(StatusCode::CREATED, record.receipt())
}

async fn verify_identity(
    State(runtime): State<SharedRuntime>,
    Path(blockchain_id): Path<String>,
) -> ApiResult<IssuanceVerification> {
    respond(StatusCode::OK, runtime.issuance.verify(&blockchain_id)?)
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuanceList {
    pub issuances: Vec<IssuanceRecord>,
}

async fn list_issuances(
    State(runtime): State<SharedRuntime>,
    Caller(caller): Caller,
) -> ApiResult<IssuanceList> {
    let issuances = runtime.issuance.list_for_user(&caller.user_id)?;
    respond(StatusCode::OK, IssuanceList { issuances })
}

async fn dashboard_summary(
    State(runtime): State<SharedRuntime>,
    Caller(caller): Caller,
) -> ApiResult<DashboardSummary> {
    respond(
        StatusCode::OK,
        runtime.dashboard.summary(&caller.user_id, Utc::now())?,
    )
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalyticsParams {
    pub period: Option<String>,
}

async fn dashboard_analytics(
    State(runtime): State<SharedRuntime>,
    Caller(caller): Caller,
    ApiQuery(params): ApiQuery<AnalyticsParams>,
) -> ApiResult<AnalyticsReport> {
    let report = runtime
        .dashboard
        .analytics(&caller.user_id, params.period.as_deref())?;
    respond(StatusCode::OK, report)
}

#[derive(Debug, Clone, Serialize)]
pub struct GpsAccepted {
    pub status: &'static str,
    pub logs: Vec<GpsPing>,
}

/// Tracker hardware posts here without credentials. The reply is bare JSON.
async fn record_gps(
    State(runtime): State<SharedRuntime>,
    ApiJson(input): ApiJson<GpsPingInput>,
) -> Result<Json<GpsAccepted>, ApiError> {
    let logs = runtime.location.record(input, Utc::now())?;
    Ok(Json(GpsAccepted { status: "ok", logs }))
}

async fn gps_data(State(runtime): State<SharedRuntime>) -> Result<Json<Vec<GpsPing>>, ApiError> {
    Ok(Json(runtime.location.all()?))
}

async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}
