//! Request/response and report types for the scraping domain.

use serde::{Deserialize, Serialize};
use url::Url;

use super::models::{NewJobSource, DEFAULT_RATE_LIMIT};
use super::parsing::SourceConfig;
use crate::common::{ScrapingRunId, ScrapingSessionId};

pub const MAX_SOURCE_NAME_LEN: usize = 255;
pub const MIN_RATE_LIMIT: i64 = 1;
pub const MAX_RATE_LIMIT: i64 = 10_000;

// =============================================================================
// Reports
// =============================================================================

/// Outcome of one queue-draining pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueReport {
    pub claimed: usize,
    pub succeeded: usize,
    /// Ended `failed` after exhausting attempts
    pub failed: usize,
    /// Failed this time, back to `pending`
    pub requeued: usize,
    /// Stale claims failed before draining
    pub expired: usize,
    /// Finished after another drain had taken over the claim; left to it
    pub lost: usize,
}

/// Totals from scraping one source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: Option<ScrapingSessionId>,
    pub pages_fetched: i32,
    pub jobs_found: i32,
    pub jobs_saved: i32,
    pub new_jobs: i32,
}

/// Per-source result of a multi-source scrape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceOutcome {
    pub source: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SessionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceOutcome {
    pub fn succeeded(source: impl Into<String>, summary: SessionSummary) -> Self {
        Self {
            source: source.into(),
            success: true,
            summary: Some(summary),
            error: None,
        }
    }

    pub fn failed(source: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            success: false,
            summary: None,
            error: Some(error.into()),
        }
    }
}

// =============================================================================
// Job source registration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Body of `POST /api/scraping/sources`. Everything is optional at the
/// parsing stage so missing fields surface as validation details.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobSourceInput {
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub rate_limit: Option<i64>,
    pub config: Option<serde_json::Value>,
}

impl CreateJobSourceInput {
    pub fn validate(self) -> Result<NewJobSource, Vec<FieldError>> {
        let mut errors = Vec::new();

        let name = self.name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            errors.push(FieldError::new("name", "name is required"));
        } else if name.chars().count() > MAX_SOURCE_NAME_LEN {
            errors.push(FieldError::new(
                "name",
                format!("name must be at most {} characters", MAX_SOURCE_NAME_LEN),
            ));
        }

        let base_url = self.base_url.as_deref().map(str::trim).unwrap_or_default();
        if base_url.is_empty() {
            errors.push(FieldError::new("baseUrl", "baseUrl is required"));
        } else {
            match Url::parse(base_url) {
                Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
                _ => errors.push(FieldError::new(
                    "baseUrl",
                    "baseUrl must be an absolute http(s) URL",
                )),
            }
        }

        let rate_limit = self.rate_limit.unwrap_or(DEFAULT_RATE_LIMIT as i64);
        if !(MIN_RATE_LIMIT..=MAX_RATE_LIMIT).contains(&rate_limit) {
            errors.push(FieldError::new(
                "rateLimit",
                format!(
                    "rateLimit must be between {} and {}",
                    MIN_RATE_LIMIT, MAX_RATE_LIMIT
                ),
            ));
        }

        let config = match self.config {
            None | Some(serde_json::Value::Null) => None,
            Some(value @ serde_json::Value::Object(_)) => {
                let text = value.to_string();
                match SourceConfig::from_stored(Some(&text)).and_then(|c| c.validate()) {
                    Ok(()) => Some(text),
                    Err(e) => {
                        errors.push(FieldError::new("config", format!("{:#}", e)));
                        None
                    }
                }
            }
            Some(_) => {
                errors.push(FieldError::new("config", "config must be a JSON object"));
                None
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(NewJobSource {
            name: name.to_string(),
            base_url: base_url.to_string(),
            rate_limit: rate_limit as i32,
            config,
        })
    }
}

// =============================================================================
// Trigger / queue endpoints
// =============================================================================

/// Body of `POST /api/scraping/trigger`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerRequest {
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

impl TriggerRequest {
    /// Trimmed, de-duplicated names; `None` when the caller asked for all sources.
    pub fn source_names(self) -> Option<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for name in self.sources.unwrap_or_default() {
            let name = name.trim();
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        (!names.is_empty()).then_some(names)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub message: String,
    /// `"all"` or the list of requested names
    pub sources: serde_json::Value,
    pub status: String,
    pub run_id: ScrapingRunId,
}

impl TriggerResponse {
    pub fn running(run_id: ScrapingRunId, sources: Option<&[String]>) -> Self {
        let sources = match sources {
            Some(names) => serde_json::json!(names),
            None => serde_json::Value::String("all".to_string()),
        };
        Self {
            message: "Scraping started".to_string(),
            sources,
            status: "running".to_string(),
            run_id,
        }
    }
}

/// Body of `POST /api/scraping/queue`
#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueRequest {
    pub source: String,
}
