//! Search Console query data.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use quill_core::{
    config::SearchConsoleConfig, error::QuillError, model::SearchQuery, slug::slug_from_url,
    traits::SearchAnalytics,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::JsonCache;

/// Search Console reports lag by about three days.
const REPORTING_LAG_DAYS: i64 = 3;

/// Search Console `searchAnalytics/query` client.
pub struct SearchConsoleClient {
    client: reqwest::Client,
    endpoint: String,
    site_url: String,
    access_token: String,
    days: i64,
    row_limit: usize,
}

impl SearchConsoleClient {
    /// `None` when no access token is configured.
    pub fn from_config(config: &SearchConsoleConfig) -> Option<Self> {
        if config.access_token.trim().is_empty() {
            return None;
        }
        Some(Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            site_url: config.site_url.clone(),
            access_token: config.access_token.clone(),
            days: config.days,
            row_limit: config.row_limit,
        })
    }

    fn query_url(&self) -> Result<reqwest::Url, QuillError> {
        let mut url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| QuillError::Config(format!("invalid search_console.endpoint: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| QuillError::Config("search_console.endpoint cannot be a base".into()))?
            .pop_if_empty()
            .push("sites")
            .push(&self.site_url)
            .push("searchAnalytics")
            .push("query");
        Ok(url)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    start_date: String,
    end_date: String,
    dimensions: [&'static str; 1],
    dimension_filter_groups: [FilterGroup<'a>; 1],
    row_limit: usize,
}

#[derive(Serialize)]
struct FilterGroup<'a> {
    filters: [Filter<'a>; 1],
}

#[derive(Serialize)]
struct Filter<'a> {
    dimension: &'static str,
    operator: &'static str,
    expression: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    rows: Vec<Row>,
}

#[derive(Deserialize)]
struct Row {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    clicks: f64,
    #[serde(default)]
    impressions: f64,
    #[serde(default)]
    ctr: f64,
    #[serde(default)]
    position: f64,
}

/// Reporting window `(start, end)` ending `REPORTING_LAG_DAYS` before `today`.
fn date_window(today: NaiveDate, days: i64) -> (NaiveDate, NaiveDate) {
    let end = today - Duration::days(REPORTING_LAG_DAYS);
    (end - Duration::days(days), end)
}

fn into_queries(resp: QueryResponse, limit: usize) -> Vec<SearchQuery> {
    let mut rows: Vec<SearchQuery> = resp
        .rows
        .into_iter()
        .filter_map(|row| {
            let query = row.keys.into_iter().next()?;
            Some(SearchQuery {
                query,
                clicks: row.clicks.max(0.0) as u64,
                impressions: row.impressions.max(0.0) as u64,
                ctr: (row.ctr * 10_000.0).round() / 10_000.0,
                position: (row.position * 10.0).round() / 10.0,
            })
        })
        .collect();
    rows.sort_by(|a, b| b.impressions.cmp(&a.impressions));
    rows.truncate(limit);
    rows
}

#[async_trait]
impl SearchAnalytics for SearchConsoleClient {
    async fn top_queries(
        &self,
        page_url: &str,
        limit: usize,
    ) -> Result<Vec<SearchQuery>, QuillError> {
        let (start, end) = date_window(Utc::now().date_naive(), self.days);
        let body = QueryRequest {
            start_date: start.format("%Y-%m-%d").to_string(),
            end_date: end.format("%Y-%m-%d").to_string(),
            dimensions: ["query"],
            dimension_filter_groups: [FilterGroup {
                filters: [Filter {
                    dimension: "page",
                    operator: "equals",
                    expression: page_url,
                }],
            }],
            row_limit: self.row_limit,
        };

        let resp = self
            .client
            .post(self.query_url()?)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| QuillError::DataLoad(format!("search console request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(QuillError::DataLoad(format!(
                "search console returned {status}: {text}"
            )));
        }

        let parsed: QueryResponse = resp.json().await.map_err(|e| {
            QuillError::DataLoad(format!("search console: failed to parse response: {e}"))
        })?;
        Ok(into_queries(parsed, limit))
    }
}

/// Read-through loader: cache first, live pull on miss or refresh.
pub struct SearchConsoleLoader {
    cache: JsonCache,
    analytics: Option<Arc<dyn SearchAnalytics>>,
    limit: usize,
}

impl SearchConsoleLoader {
    pub fn new(cache: JsonCache, analytics: Option<Arc<dyn SearchAnalytics>>, limit: usize) -> Self {
        Self {
            cache,
            analytics,
            limit,
        }
    }

    /// Queries for a page. Live failures degrade to an empty list.
    pub async fn load(&self, page_url: &str, refresh: bool) -> Result<Vec<SearchQuery>, QuillError> {
        let slug = slug_from_url(page_url);
        if !refresh {
            if let Some(cached) = self.cache.read::<Vec<SearchQuery>>(&slug)? {
                return Ok(cached);
            }
        }
        let Some(analytics) = &self.analytics else {
            return Ok(Vec::new());
        };
        match analytics.top_queries(page_url, self.limit).await {
            Ok(rows) => {
                info!("search console: pulled {} queries for {slug}", rows.len());
                self.cache(&slug, &rows)?;
                Ok(rows)
            }
            Err(e) => {
                warn!("search console: {slug}: {e}");
                Ok(Vec::new())
            }
        }
    }

    pub fn cache(&self, slug: &str, rows: &[SearchQuery]) -> Result<(), QuillError> {
        self.cache.write(slug, &rows)
    }
}
