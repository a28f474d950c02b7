use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadroute_core::audit::{AuditLogger, LoggingFailure};
use leadroute_core::domain::lead::LeadAttributes;
use leadroute_core::domain::rep::SalesRepId;
use leadroute_core::domain::routing_log::{
    MatchedCriteria, RoutingLogEntry, RoutingLogId, RoutingMethod,
};
use serde::Serialize;
use sqlx::{sqlite::SqliteRow, Row};

use super::{format_timestamp, parse_timestamp, RepositoryError};
use crate::DbPool;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

const LOG_COLUMNS: &str = "id, lead_email, lead_city, lead_source, lead_status, sales_rep_id, \
                           routing_method, routing_criteria_json, created_at";

/// One page of routing log entries, newest first. `page` is 1-based.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingLogPage {
    pub entries: Vec<RoutingLogEntry>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
}

impl RoutingLogPage {
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.page_size.max(1)))
    }
}

/// Append-only routing log over the `routing_logs` table.
pub struct SqlRoutingLogRepository {
    pool: DbPool,
}

impl SqlRoutingLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &RoutingLogEntry) -> Result<(), RepositoryError> {
        let criteria_json = serde_json::to_string(&entry.criteria)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO routing_logs (
                id, lead_email, lead_city, lead_source, lead_status, sales_rep_id,
                routing_method, routing_criteria_json, random_value, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id.0)
        .bind(&entry.lead.email)
        .bind(&entry.lead.city)
        .bind(&entry.lead.lead_source)
        .bind(&entry.lead.lead_status)
        .bind(&entry.sales_rep_id.0)
        .bind(entry.method.as_str())
        .bind(criteria_json)
        .bind(entry.random_value())
        .bind(format_timestamp(&entry.recorded_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Page numbers below 1 are treated as 1; page size is clamped to `1..=MAX_PAGE_SIZE`.
    pub async fn list_recent(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<RoutingLogPage, RepositoryError> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let offset = i64::from(page - 1) * i64::from(page_size);

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM routing_logs").fetch_one(&self.pool).await?;

        let rows = sqlx::query(&format!(
            "SELECT {LOG_COLUMNS} FROM routing_logs
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?"
        ))
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let entries = rows.iter().map(routing_log_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(RoutingLogPage { entries, page, page_size, total: total.max(0) as u64 })
    }

    /// Entries recorded at or after `since`, oldest first.
    pub async fn list_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<RoutingLogEntry>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {LOG_COLUMNS} FROM routing_logs
             WHERE created_at >= ?
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(format_timestamp(&since))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(routing_log_from_row).collect()
    }

    pub async fn find_by_id(
        &self,
        id: &RoutingLogId,
    ) -> Result<Option<RoutingLogEntry>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {LOG_COLUMNS} FROM routing_logs WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| routing_log_from_row(&row)).transpose()
    }
}

#[async_trait]
impl AuditLogger for SqlRoutingLogRepository {
    async fn record(&self, entry: RoutingLogEntry) -> Result<(), LoggingFailure> {
        self.insert(&entry).await.map_err(|error| LoggingFailure(error.to_string()))
    }
}

fn routing_log_from_row(row: &SqliteRow) -> Result<RoutingLogEntry, RepositoryError> {
    let id: String = row.try_get("id")?;
    let sales_rep_id: String = row.try_get("sales_rep_id")?;
    let method: String = row.try_get("routing_method")?;
    let criteria_json: String = row.try_get("routing_criteria_json")?;
    let created_at: String = row.try_get("created_at")?;

    let criteria: MatchedCriteria = serde_json::from_str(&criteria_json).map_err(|error| {
        RepositoryError::Decode(format!("invalid routing_criteria_json for `{id}`: {error}"))
    })?;
    let method = RoutingMethod::parse(&method)
        .ok_or_else(|| RepositoryError::Decode(format!("invalid routing_method: {method}")))?;
    if criteria.method() != method {
        return Err(RepositoryError::Decode(format!(
            "routing log `{id}` stores method `{method}` but criteria for `{}`",
            criteria.method()
        )));
    }

    Ok(RoutingLogEntry {
        id: RoutingLogId(id),
        recorded_at: parse_timestamp("created_at", created_at)?,
        lead: LeadAttributes {
            email: row.try_get("lead_email")?,
            city: row.try_get("lead_city")?,
            lead_source: row.try_get("lead_source")?,
            lead_status: row.try_get("lead_status")?,
        },
        method,
        sales_rep_id: SalesRepId(sales_rep_id),
        criteria,
    })
}
