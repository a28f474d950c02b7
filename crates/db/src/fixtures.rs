use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

struct SeedRep {
    id: &'static str,
    active: bool,
}

struct SeedRule {
    id: &'static str,
    scope: &'static str,
    match_value: &'static str,
    status: Option<&'static str>,
    sales_rep_id: &'static str,
}

struct SeedAllocation {
    id: &'static str,
    sales_rep_id: &'static str,
    percentage: f64,
}

/// Contract for the demo dataset. Must agree with the SQL fixture.
const SEED_REPS: &[SeedRep] = &[
    SeedRep { id: "rep-avery", active: true },
    SeedRep { id: "rep-jordan", active: true },
    SeedRep { id: "rep-morgan", active: true },
    SeedRep { id: "rep-riley", active: false },
];

const SEED_RULES: &[SeedRule] = &[
    SeedRule {
        id: "rule-source-referral-new",
        scope: "source",
        match_value: "referral",
        status: Some("new"),
        sales_rep_id: "rep-avery",
    },
    SeedRule {
        id: "rule-source-partner",
        scope: "source",
        match_value: "partner",
        status: None,
        sales_rep_id: "rep-jordan",
    },
    SeedRule {
        id: "rule-city-austin-new",
        scope: "city",
        match_value: "austin",
        status: Some("new"),
        sales_rep_id: "rep-morgan",
    },
    SeedRule {
        id: "rule-city-austin",
        scope: "city",
        match_value: "austin",
        status: None,
        sales_rep_id: "rep-jordan",
    },
    SeedRule {
        id: "rule-city-denver",
        scope: "city",
        match_value: "denver",
        status: None,
        sales_rep_id: "rep-riley",
    },
];

const SEED_ALLOCATIONS: &[SeedAllocation] = &[
    SeedAllocation { id: "alloc-avery", sales_rep_id: "rep-avery", percentage: 40.0 },
    SeedAllocation { id: "alloc-jordan", sales_rep_id: "rep-jordan", percentage: 35.0 },
    SeedAllocation { id: "alloc-morgan", sales_rep_id: "rep-morgan", percentage: 25.0 },
    SeedAllocation { id: "alloc-riley", sales_rep_id: "rep-riley", percentage: 10.0 },
];

pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Loads the demo reps, rules and allocations. Existing rows with the same ids are updated.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            reps_seeded: SEED_REPS.len(),
            rules_seeded: SEED_RULES.len(),
            allocations_seeded: SEED_ALLOCATIONS.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for rep in SEED_REPS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM sales_reps WHERE id = ?1 AND active = ?2)",
            )
            .bind(rep.id)
            .bind(rep.active)
            .fetch_one(pool)
            .await?;
            checks.push((rep.id, present == 1));
        }

        for rule in SEED_RULES {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM routing_rules
                 WHERE id = ?1 AND scope = ?2 AND match_value = ?3
                   AND status IS ?4 AND sales_rep_id = ?5 AND active = 1)",
            )
            .bind(rule.id)
            .bind(rule.scope)
            .bind(rule.match_value)
            .bind(rule.status)
            .bind(rule.sales_rep_id)
            .fetch_one(pool)
            .await?;
            checks.push((rule.id, present == 1));
        }

        for allocation in SEED_ALLOCATIONS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM percentage_allocations
                 WHERE id = ?1 AND sales_rep_id = ?2 AND percentage = ?3 AND active = 1)",
            )
            .bind(allocation.id)
            .bind(allocation.sales_rep_id)
            .bind(allocation.percentage)
            .fetch_one(pool)
            .await?;
            checks.push((allocation.id, present == 1));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes demo rows. Routing logs are left untouched.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        for allocation in SEED_ALLOCATIONS {
            sqlx::query("DELETE FROM percentage_allocations WHERE id = ?")
                .bind(allocation.id)
                .execute(&mut *tx)
                .await?;
        }
        for rule in SEED_RULES {
            sqlx::query("DELETE FROM routing_rules WHERE id = ?")
                .bind(rule.id)
                .execute(&mut *tx)
                .await?;
        }
        for rep in SEED_REPS {
            sqlx::query("DELETE FROM sales_reps WHERE id = ?")
                .bind(rep.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub reps_seeded: usize,
    pub rules_seeded: usize,
    pub allocations_seeded: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use leadroute_core::domain::lead::LeadRequest;
    use leadroute_core::domain::routing_log::RoutingMethod;
    use leadroute_core::routing::{FixedDraw, RoutingEngine};

    use super::DemoSeedDataset;
    use crate::repositories::test_support::setup_pool;
    use crate::{SqlRepRegistry, SqlRoutingLogRepository, SqlRuleStore};

    #[test]
    fn sql_fixture_mentions_every_contract_id() {
        for id in ["rep-riley", "rule-city-denver", "alloc-morgan"] {
            assert!(DemoSeedDataset::SQL.contains(id), "fixture is missing {id}");
        }
    }

    #[tokio::test]
    async fn seed_is_idempotent_and_verifiable() {
        let pool = setup_pool().await;

        let first = DemoSeedDataset::load(&pool).await.expect("first load");
        DemoSeedDataset::load(&pool).await.expect("second load");
        assert_eq!(first.rules_seeded, 5);

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "failed checks: {:?}", verification.checks);

        DemoSeedDataset::clean(&pool).await.expect("clean");
        let after_clean = DemoSeedDataset::verify(&pool).await.expect("verify after clean");
        assert!(!after_clean.all_present);
    }

    #[tokio::test]
    async fn seeded_database_routes_through_every_stage() {
        let pool = setup_pool().await;
        DemoSeedDataset::load(&pool).await.expect("load");

        let logs = Arc::new(SqlRoutingLogRepository::new(pool.clone()));
        let engine = RoutingEngine::new(
            Arc::new(SqlRepRegistry::new(pool.clone())),
            Arc::new(SqlRuleStore::new(pool.clone())),
            logs.clone(),
        )
        .with_draw_source(Arc::new(FixedDraw(50.0)));

        let source = engine
            .route(&LeadRequest {
                lead_source: Some("Referral".to_string()),
                lead_status: Some("New".to_string()),
                city: Some("Austin".to_string()),
                ..LeadRequest::default()
            })
            .await
            .expect("source route");
        assert_eq!(source.method, RoutingMethod::Source);
        assert_eq!(source.sales_rep.id.0, "rep-avery");

        let city = engine
            .route(&LeadRequest {
                city: Some("austin".to_string()),
                lead_status: Some("new".to_string()),
                ..LeadRequest::default()
            })
            .await
            .expect("city route");
        assert_eq!(city.method, RoutingMethod::City);
        assert_eq!(city.sales_rep.id.0, "rep-morgan");

        // Denver's rule targets inactive riley; a draw of 50 lands on jordan (40 < 50 <= 75).
        let percentage = engine
            .route(&LeadRequest { city: Some("denver".to_string()), ..LeadRequest::default() })
            .await
            .expect("percentage route");
        assert_eq!(percentage.method, RoutingMethod::Percentage);
        assert_eq!(percentage.sales_rep.id.0, "rep-jordan");

        let page = logs.list_recent(1, 10).await.expect("list logs");
        assert_eq!(page.total, 3);
    }
}
