use std::sync::Arc;

use leadroute_core::config::AppConfig;
use leadroute_core::lookup::LookupError;
use leadroute_core::routing::RoutingEngine;
use leadroute_db::{
    connect_with_config, migrations, DbPool, SqlRepRegistry, SqlRoutingLogRepository,
    SqlRuleStore,
};
use thiserror::Error;
use tracing::info;

use crate::health::HealthState;
use crate::lead_lookup::HttpLeadLookup;
use crate::routes::ApiState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub engine: Arc<RoutingEngine>,
    pub routing_logs: Arc<SqlRoutingLogRepository>,
}

impl Application {
    pub fn api_state(&self) -> ApiState {
        ApiState { engine: self.engine.clone(), routing_logs: self.routing_logs.clone() }
    }

    pub fn health_state(&self) -> HealthState {
        HealthState::new(self.db_pool.clone(), self.engine.clone())
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("lead lookup client could not be built: {0}")]
    LeadLookup(#[source] LookupError),
}

pub async fn bootstrap(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let settings = config.routing.settings();
    let routing_logs = Arc::new(SqlRoutingLogRepository::new(db_pool.clone()));
    let mut engine = RoutingEngine::new(
        Arc::new(SqlRepRegistry::new(db_pool.clone())),
        Arc::new(SqlRuleStore::new(db_pool.clone())),
        routing_logs.clone(),
    )
    .with_settings(settings.clone());

    match HttpLeadLookup::from_config(&config.lead_lookup, settings.lookup_timeout)
        .map_err(BootstrapError::LeadLookup)?
    {
        Some(lookup) => {
            info!(
                event_name = "system.bootstrap.lead_lookup_enabled",
                correlation_id = "bootstrap",
                timeout_ms = settings.lookup_timeout.as_millis() as u64,
                "CRM lead lookup enabled"
            );
            engine = engine.with_lead_lookup(Arc::new(lookup));
        }
        None => info!(
            event_name = "system.bootstrap.lead_lookup_disabled",
            correlation_id = "bootstrap",
            "CRM lead lookup disabled"
        ),
    }

    Ok(Application { config, db_pool, engine: Arc::new(engine), routing_logs })
}
