use std::time::Duration;

use anyhow::Result;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::FetchError;
use crate::http_client::http_client;
use crate::model::{RawGameRecord, RawTeamRecord};

const TEAMS_PATH: &str = "v1/mls/teams";
const GAMES_PATH: &str = "v1/mls/games";
const RETRY_BASE_MS: u64 = 500;
const ERROR_BODY_LIMIT: usize = 300;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiFilters {
    pub season: Option<String>,
    pub stage_name: Option<String>,
}

impl ApiFilters {
    pub fn season(season: impl Into<String>, stage_name: Option<&str>) -> Self {
        Self {
            season: Some(season.into()),
            stage_name: stage_name.map(|s| s.to_string()),
        }
    }

    fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::new();
        if let Some(season) = self.season.as_deref() {
            pairs.push(("season", season));
        }
        if let Some(stage) = self.stage_name.as_deref() {
            pairs.push(("stage_name", stage));
        }
        pairs
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    max_attempts: u32,
    backoff_base_ms: u64,
}

impl ApiClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_attempts: 1,
            backoff_base_ms: RETRY_BASE_MS,
        }
    }

    pub fn from_config(cfg: &PipelineConfig) -> Result<Self> {
        let client = http_client(cfg.http_timeout_secs)?.clone();
        Ok(Self::new(client, cfg.api_base_url.clone()).with_retries(cfg.fetch_retries))
    }

    pub fn with_retries(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff_ms(mut self, backoff_base_ms: u64) -> Self {
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    pub fn fetch_teams(&self, filters: &ApiFilters) -> Result<Vec<RawTeamRecord>, FetchError> {
        self.fetch_records(TEAMS_PATH, filters)
    }

    pub fn fetch_games(&self, filters: &ApiFilters) -> Result<Vec<RawGameRecord>, FetchError> {
        self.fetch_records(GAMES_PATH, filters)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn fetch_records(&self, path: &str, filters: &ApiFilters) -> Result<Vec<Value>, FetchError> {
        let url = self.endpoint(path);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.fetch_once(&url, filters) {
                Ok(records) => {
                    debug!(
                        "[EXTRACT] {} {:?} -> {} records",
                        url,
                        filters.season,
                        records.len()
                    );
                    return Ok(records);
                }
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        "[EXTRACT] attempt {}/{} failed: {}",
                        attempt, self.max_attempts, err
                    );
                    let sleep_ms = self.backoff_base_ms.saturating_mul(attempt as u64);
                    std::thread::sleep(Duration::from_millis(sleep_ms));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn fetch_once(&self, url: &str, filters: &ApiFilters) -> Result<Vec<Value>, FetchError> {
        let resp = self
            .client
            .get(url)
            .query(&filters.query_pairs())
            .send()
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
        let status = resp.status();
        let body = resp.text().map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
                body: truncate(&body, ERROR_BODY_LIMIT),
            });
        }

        let value = serde_json::from_str::<Value>(body.trim()).map_err(|err| FetchError::Decode {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        match value {
            Value::Array(items) => Ok(items),
            other => Err(FetchError::Decode {
                url: url.to_string(),
                reason: format!("expected a json array, got {}", json_kind(&other)),
            }),
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn truncate(raw: &str, limit: usize) -> String {
    if raw.len() <= limit {
        return raw.to_string();
    }
    let mut end = limit;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &raw[..end])
}
