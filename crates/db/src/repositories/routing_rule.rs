use async_trait::async_trait;
use leadroute_core::domain::normalize_key;
use leadroute_core::domain::rep::SalesRepId;
use leadroute_core::domain::rule::{
    AllocationId, PercentageAllocation, RoutingRule, RoutingRuleId, RuleScope,
};
use leadroute_core::errors::StoreError;
use leadroute_core::rules::RuleStore;
use sqlx::{sqlite::SqliteRow, Row};

use super::{parse_timestamp, RepositoryError};
use crate::DbPool;

const RULE_COLUMNS: &str = "id, scope, match_value, status, sales_rep_id, active, created_at";

/// Rule store over `routing_rules` and `percentage_allocations`.
///
/// Matching is done on trimmed, lowercased column values so rows written by
/// other tools with mixed case still match. A blank status is treated the same
/// as a missing one.
pub struct SqlRuleStore {
    pool: DbPool,
}

impl SqlRuleStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn query_rules(
        &self,
        scope: RuleScope,
        value: &str,
        status: Option<&str>,
    ) -> Result<Vec<RoutingRule>, RepositoryError> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {RULE_COLUMNS} FROM routing_rules
                     WHERE scope = ? AND active = 1
                       AND lower(trim(match_value)) = ?
                       AND lower(trim(status)) = ?
                     ORDER BY created_at ASC, id ASC"
                ))
                .bind(scope.as_str())
                .bind(normalize_key(value))
                .bind(normalize_key(status))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {RULE_COLUMNS} FROM routing_rules
                     WHERE scope = ? AND active = 1
                       AND lower(trim(match_value)) = ?
                       AND (status IS NULL OR trim(status) = '')
                     ORDER BY created_at ASC, id ASC"
                ))
                .bind(scope.as_str())
                .bind(normalize_key(value))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(routing_rule_from_row).collect()
    }

    async fn query_allocations(&self) -> Result<Vec<PercentageAllocation>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, sales_rep_id, percentage, active, created_at
             FROM percentage_allocations
             WHERE active = 1
             ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(allocation_from_row).collect()
    }
}

#[async_trait]
impl RuleStore for SqlRuleStore {
    async fn find_active_rules(
        &self,
        scope: RuleScope,
        value: &str,
        status: Option<&str>,
    ) -> Result<Vec<RoutingRule>, StoreError> {
        Ok(self.query_rules(scope, value, status).await?)
    }

    async fn list_active_percentage_allocations(
        &self,
    ) -> Result<Vec<PercentageAllocation>, StoreError> {
        Ok(self.query_allocations().await?)
    }
}

fn routing_rule_from_row(row: &SqliteRow) -> Result<RoutingRule, RepositoryError> {
    let id: String = row.try_get("id")?;
    let scope: String = row.try_get("scope")?;
    let match_value: String = row.try_get("match_value")?;
    let status: Option<String> = row.try_get("status")?;
    let sales_rep_id: String = row.try_get("sales_rep_id")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(RoutingRule {
        id: RoutingRuleId(id),
        scope: RuleScope::parse(&scope)
            .ok_or_else(|| RepositoryError::Decode(format!("invalid scope: {scope}")))?,
        match_value: normalize_key(&match_value),
        status: status.map(|status| normalize_key(&status)).filter(|status| !status.is_empty()),
        sales_rep_id: SalesRepId(sales_rep_id),
        active: row.try_get("active")?,
        created_at: parse_timestamp("created_at", created_at)?,
    })
}

fn allocation_from_row(row: &SqliteRow) -> Result<PercentageAllocation, RepositoryError> {
    let id: String = row.try_get("id")?;
    let sales_rep_id: String = row.try_get("sales_rep_id")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(PercentageAllocation {
        id: AllocationId(id),
        sales_rep_id: SalesRepId(sales_rep_id),
        percentage: row.try_get("percentage")?,
        active: row.try_get("active")?,
        created_at: parse_timestamp("created_at", created_at)?,
    })
}
