use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{JobSourceId, ScrapingJobId, ScrapingSessionId};
use crate::domains::scraping::parsing::JobPosting;

/// ScrapingJob - a job posting found on a source, unique per (source, url)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ScrapingJob {
    pub id: ScrapingJobId,
    pub source_id: JobSourceId,
    /// Session that last saw this posting
    pub session_id: ScrapingSessionId,
    pub external_url: String,
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    /// Markdown
    pub description: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl ScrapingJob {
    /// Insert or refresh a posting by URL. Returns `true` if the row is new.
    pub async fn upsert(
        source_id: JobSourceId,
        session_id: ScrapingSessionId,
        posting: &JobPosting,
        pool: &PgPool,
    ) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO scraping_jobs
                (id, source_id, session_id, external_url, title, company, location, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source_id, external_url) DO UPDATE
            SET session_id = EXCLUDED.session_id,
                title = EXCLUDED.title,
                company = COALESCE(EXCLUDED.company, scraping_jobs.company),
                location = COALESCE(EXCLUDED.location, scraping_jobs.location),
                description = COALESCE(EXCLUDED.description, scraping_jobs.description),
                last_seen_at = NOW()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(ScrapingJobId::new())
        .bind(source_id)
        .bind(session_id)
        .bind(&posting.url)
        .bind(&posting.title)
        .bind(&posting.company)
        .bind(&posting.location)
        .bind(&posting.description)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_source(source_id: JobSourceId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM scraping_jobs WHERE source_id = $1 ORDER BY first_seen_at, external_url",
        )
        .bind(source_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
