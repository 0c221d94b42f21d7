use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::JobSourceId;
use crate::domains::scraping::parsing::SourceConfig;

pub const DEFAULT_RATE_LIMIT: i32 = 60;

/// JobSource - a registered job-listing site the scraper fetches from
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JobSource {
    pub id: JobSourceId,
    pub name: String,
    pub base_url: String,
    /// Requests per minute against this source
    pub rate_limit: i32,
    /// Serialized JSON, see `SourceConfig`
    pub config: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for `JobSource::create`
#[derive(Debug, Clone, PartialEq)]
pub struct NewJobSource {
    pub name: String,
    pub base_url: String,
    pub rate_limit: i32,
    pub config: Option<String>,
}

/// Counts of records hanging off a source, serialized as `_count`
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SourceCounts {
    pub scraping_jobs: i64,
    pub scraping_sessions: i64,
    pub scrape_queue: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobSourceWithCounts {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub source: JobSource,
    #[sqlx(flatten)]
    #[serde(rename = "_count")]
    pub counts: SourceCounts,
}

impl JobSource {
    pub async fn find_by_id(id: JobSourceId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM job_sources WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_name(name: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM job_sources WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_names(names: &[String], pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM job_sources WHERE name = ANY($1) ORDER BY name",
        )
        .bind(names)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_all(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM job_sources ORDER BY name")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_all_with_counts(pool: &PgPool) -> Result<Vec<JobSourceWithCounts>> {
        sqlx::query_as::<_, JobSourceWithCounts>(
            r#"
            SELECT s.*,
                   (SELECT COUNT(*) FROM scraping_jobs j WHERE j.source_id = s.id) AS scraping_jobs,
                   (SELECT COUNT(*) FROM scraping_sessions ss WHERE ss.source_id = s.id) AS scraping_sessions,
                   (SELECT COUNT(*) FROM scrape_queue q WHERE q.source_id = s.id) AS scrape_queue
            FROM job_sources s
            ORDER BY s.name
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Insert a source. Returns `None` when the name is already taken.
    pub async fn create(input: &NewJobSource, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO job_sources (id, name, base_url, rate_limit, config)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(JobSourceId::new())
        .bind(&input.name)
        .bind(&input.base_url)
        .bind(input.rate_limit)
        .bind(&input.config)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn count(pool: &PgPool) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM job_sources")
            .fetch_one(pool)
            .await
            .map_err(Into::into)
    }

    /// Selector configuration, falling back to defaults when none is stored.
    pub fn parsed_config(&self) -> Result<SourceConfig> {
        SourceConfig::from_stored(self.config.as_deref())
    }
}
