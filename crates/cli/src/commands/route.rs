use std::sync::Arc;

use clap::Args;
use leadroute_core::audit::{AuditLogger, InMemoryAuditLogger};
use leadroute_core::config::AppConfig;
use leadroute_core::domain::lead::LeadRequest;
use leadroute_core::errors::{RoutingError, StoreError};
use leadroute_core::routing::{RoutingEngine, RoutingOutcome, SeededDraw};
use leadroute_db::{
    connect_with_config, migrations, SqlRepRegistry, SqlRoutingLogRepository, SqlRuleStore,
};
use serde_json::json;

use crate::commands::{current_thread_runtime, load_config, CommandResult};

#[derive(Debug, Clone, Default, Args)]
pub struct RouteArgs {
    #[arg(long, help = "Lead city, matched case-insensitively")]
    pub city: Option<String>,
    #[arg(long, help = "Lead source, matched case-insensitively")]
    pub source: Option<String>,
    #[arg(long, help = "Lead status used to prefer status-specific rules")]
    pub status: Option<String>,
    #[arg(long, help = "Lead email, recorded in the routing log")]
    pub email: Option<String>,
    #[arg(long, help = "Seed the percentage draw for a reproducible pick")]
    pub seed: Option<u64>,
    #[arg(long, help = "Write the decision to the routing log instead of discarding it")]
    pub record: bool,
}

impl RouteArgs {
    fn lead(&self) -> LeadRequest {
        LeadRequest {
            email: self.email.clone(),
            city: self.city.clone(),
            lead_source: self.source.clone(),
            lead_status: self.status.clone(),
        }
    }
}

pub fn run(args: RouteArgs) -> CommandResult {
    let config = match load_config("route") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match current_thread_runtime("route") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(route(&config, &args))
}

async fn route(config: &AppConfig, args: &RouteArgs) -> CommandResult {
    let pool = match connect_with_config(&config.database).await {
        Ok(pool) => pool,
        Err(error) => {
            return CommandResult::failure("route", "db_connectivity", error.to_string(), 4);
        }
    };
    if let Err(error) = migrations::run_pending(&pool).await {
        pool.close().await;
        return CommandResult::failure("route", "migration", error.to_string(), 5);
    }

    let audit: Arc<dyn AuditLogger> = if args.record {
        Arc::new(SqlRoutingLogRepository::new(pool.clone()))
    } else {
        Arc::new(InMemoryAuditLogger::default())
    };
    let mut engine = RoutingEngine::new(
        Arc::new(SqlRepRegistry::new(pool.clone())),
        Arc::new(SqlRuleStore::new(pool.clone())),
        audit,
    )
    .with_settings(config.routing.settings());
    if let Some(seed) = args.seed {
        engine = engine.with_draw_source(Arc::new(SeededDraw::new(seed)));
    }

    let result = engine.route(&args.lead()).await;
    pool.close().await;

    match result {
        Ok(outcome) => {
            let message = format!(
                "routed to {} via {}",
                outcome.sales_rep.id,
                outcome.method.as_str()
            );
            let data = outcome_json(&outcome, args.record);
            CommandResult::success_with_data("route", message, Some(data))
        }
        Err(error) => failure_for(error),
    }
}

fn outcome_json(outcome: &RoutingOutcome, recorded: bool) -> serde_json::Value {
    let log_entry_id = (recorded && outcome.audit_recorded).then_some(&outcome.log_entry_id);
    json!({
        "salesRep": outcome.sales_rep.summary(),
        "routingMethod": outcome.method,
        "matchedCriteria": outcome.criteria,
        "lead": outcome.lead,
        "logEntryId": log_entry_id,
    })
}

fn failure_for(error: RoutingError) -> CommandResult {
    let exit_code = match error {
        RoutingError::NoEligibleRepresentative => 7,
        RoutingError::Configuration(_) | RoutingError::Store(StoreError::Decode(_)) => 9,
        RoutingError::Store(StoreError::Unavailable(_)) => 4,
    };
    CommandResult::failure("route", error.code().as_str(), error.to_string(), exit_code)
}
