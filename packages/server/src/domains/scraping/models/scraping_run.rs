use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::ScrapingRunId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "scraping_run_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScrapingRunStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// ScrapingRun - a triggered multi-source scrape, polled by id
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ScrapingRun {
    pub id: ScrapingRunId,
    /// `None` means every registered source
    pub requested_sources: Option<Vec<String>>,
    pub status: ScrapingRunStatus,
    /// Per-source outcomes once the run has finished
    pub results: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScrapingRun {
    pub async fn create(sources: Option<&[String]>, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO scraping_runs (id, requested_sources)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(ScrapingRunId::new())
        .bind(sources.map(|s| s.to_vec()))
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_id(id: ScrapingRunId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM scraping_runs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn mark_running(id: ScrapingRunId, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scraping_runs
            SET status = 'running', started_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn mark_succeeded(
        id: ScrapingRunId,
        results: serde_json::Value,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scraping_runs
            SET status = 'succeeded', results = $2, finished_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(results)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn mark_failed(id: ScrapingRunId, error: &str, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scraping_runs
            SET status = 'failed', error = $2, finished_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Fail runs left pending or running by a previous process.
    pub async fn fail_abandoned(pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE scraping_runs
            SET status = 'failed', error = 'interrupted by restart', finished_at = NOW()
            WHERE status IN ('pending', 'running')
            "#,
        )
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Fail the given runs that are still pending or running.
    pub async fn fail_unfinished(ids: &[ScrapingRunId], error: &str, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE scraping_runs
            SET status = 'failed', error = $2, finished_at = NOW()
            WHERE id = ANY($1) AND status IN ('pending', 'running')
            "#,
        )
        .bind(ids)
        .bind(error)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
