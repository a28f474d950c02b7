use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use leadroute_core::domain::lead::LeadRequest;
use leadroute_core::domain::rep::SalesRepSummary;
use leadroute_core::domain::routing_log::{MatchedCriteria, RoutingLogId, RoutingMethod};
use leadroute_core::errors::{ErrorCode, ErrorEnvelope, RoutingError};
use leadroute_core::routing::{RoutingEngine, RoutingStats, StatsWindow};
use leadroute_db::repositories::routing_log::DEFAULT_PAGE_SIZE;
use leadroute_db::{RoutingLogPage, SqlRoutingLogRepository};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<RoutingEngine>,
    pub routing_logs: Arc<SqlRoutingLogRepository>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResponse {
    pub sales_rep: SalesRepSummary,
    pub routing_method: RoutingMethod,
    pub matched_criteria: MatchedCriteria,
    pub log_entry_id: RoutingLogId,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub range: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorEnvelope>);

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/route", post(route_lead))
        .route("/api/v1/routing-logs", get(list_routing_logs))
        .route("/api/v1/routing-logs/stats", get(routing_stats))
        .with_state(state)
}

pub async fn route_lead(
    State(state): State<ApiState>,
    payload: Result<Json<LeadRequest>, JsonRejection>,
) -> Result<Json<RouteResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        invalid_request(format!("request body is not a valid lead: {}", rejection.body_text()))
    })?;

    let correlation_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("routing.request", correlation_id = %correlation_id);

    let outcome =
        state.engine.route(&request).instrument(span).await.map_err(|error| {
            routing_error_response(&correlation_id, error)
        })?;

    Ok(Json(RouteResponse {
        sales_rep: outcome.sales_rep.summary(),
        routing_method: outcome.method,
        matched_criteria: outcome.criteria,
        log_entry_id: outcome.log_entry_id,
    }))
}

pub async fn list_routing_logs(
    State(state): State<ApiState>,
    Query(query): Query<LogListQuery>,
) -> Result<Json<RoutingLogPage>, ApiError> {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);

    state.routing_logs.list_recent(page, page_size).await.map(Json).map_err(|error| {
        error!(
            event_name = "routing.logs.list_failed",
            error = %error,
            "failed to list routing logs"
        );
        store_unavailable()
    })
}

pub async fn routing_stats(
    State(state): State<ApiState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<RoutingStats>, ApiError> {
    let window = match query.range.as_deref() {
        None => StatsWindow::default(),
        Some(raw) => StatsWindow::parse(raw).ok_or_else(|| {
            invalid_request(format!("unsupported range `{raw}` (expected 24h|7d|1m|3m|6m)"))
        })?,
    };

    let now = Utc::now();
    let entries = state.routing_logs.list_since(window.start(now)).await.map_err(|error| {
        error!(
            event_name = "routing.stats.query_failed",
            error = %error,
            "failed to load routing logs for stats"
        );
        store_unavailable()
    })?;

    Ok(Json(RoutingStats::from_entries(window, now, &entries)))
}

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NoEligibleRepresentative => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::ConfigurationError => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn routing_error_response(correlation_id: &str, error: RoutingError) -> ApiError {
    let code = error.code();
    match &error {
        RoutingError::NoEligibleRepresentative => warn!(
            event_name = "routing.request.rejected",
            correlation_id,
            error_code = code.as_str(),
            error = %error,
            "lead could not be routed"
        ),
        RoutingError::Configuration(_) | RoutingError::Store(_) => error!(
            event_name = "routing.request.failed",
            correlation_id,
            error_code = code.as_str(),
            error = %error,
            "routing failed"
        ),
    }

    (status_for(code), Json(error.into_envelope()))
}

fn invalid_request(message: String) -> ApiError {
    info!(event_name = "routing.request.invalid", reason = %message, "rejected malformed request");
    (StatusCode::BAD_REQUEST, Json(ErrorEnvelope::new(ErrorCode::InvalidRequest, message)))
}

fn store_unavailable() -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorEnvelope::new(
            ErrorCode::StoreUnavailable,
            "Routing data is temporarily unavailable. Please retry shortly.",
        )),
    )
}
