use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use leadroute_core::routing::RoutingEngine;
use leadroute_db::{ping, DbPool};
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    engine: Arc<RoutingEngine>,
}

impl HealthState {
    pub fn new(db_pool: DbPool, engine: Arc<RoutingEngine>) -> Self {
        Self { db_pool, engine }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub audit_log: HealthCheck,
    pub audit_failures: u64,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

/// Reports 503 only when the database is unreachable. Audit write failures
/// degrade the `audit_log` check but routing keeps serving.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let audit_failures = state.engine.audit_failures();
    let ready = database.status == "ready";

    let audit_log = if audit_failures == 0 {
        HealthCheck { status: "ready", detail: "no audit write failures".to_string() }
    } else {
        HealthCheck {
            status: "degraded",
            detail: format!("{audit_failures} routing decision(s) were not recorded"),
        }
    };

    let payload = HealthResponse {
        status: if ready && audit_failures == 0 { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "leadroute-server runtime initialized".to_string(),
        },
        database,
        audit_log,
        audit_failures,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match ping(pool).await {
        Ok(()) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}
