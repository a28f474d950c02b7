use async_trait::async_trait;
use leadroute_core::domain::rep::{SalesRepId, SalesRepresentative};
use leadroute_core::errors::StoreError;
use leadroute_core::registry::RepRegistry;
use sqlx::{sqlite::SqliteRow, Row};

use super::RepositoryError;
use crate::DbPool;

/// Representative registry backed by the `sales_reps` table.
pub struct SqlRepRegistry {
    pool: DbPool,
}

impl SqlRepRegistry {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list_reps(&self) -> Result<Vec<SalesRepresentative>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, email, active, calendar_id FROM sales_reps \
             ORDER BY name ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(sales_rep_from_row).collect()
    }

    async fn fetch_active_flag(&self, id: &SalesRepId) -> Result<Option<bool>, RepositoryError> {
        let active: Option<bool> = sqlx::query_scalar("SELECT active FROM sales_reps WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(active)
    }

    async fn fetch_rep(
        &self,
        id: &SalesRepId,
    ) -> Result<Option<SalesRepresentative>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, email, active, calendar_id FROM sales_reps WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| sales_rep_from_row(&row)).transpose()
    }
}

#[async_trait]
impl RepRegistry for SqlRepRegistry {
    async fn is_active(&self, id: &SalesRepId) -> Result<bool, StoreError> {
        Ok(self.fetch_active_flag(id).await?.unwrap_or(false))
    }

    async fn find_rep(&self, id: &SalesRepId) -> Result<Option<SalesRepresentative>, StoreError> {
        Ok(self.fetch_rep(id).await?)
    }
}

fn sales_rep_from_row(row: &SqliteRow) -> Result<SalesRepresentative, RepositoryError> {
    let id: String = row.try_get("id")?;

    Ok(SalesRepresentative {
        id: SalesRepId(id),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        active: row.try_get("active")?,
        calendar_id: row.try_get("calendar_id")?,
    })
}
