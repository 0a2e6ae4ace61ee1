//! Read-through proxy for the football-data.org v4 API.
//!
//! Matches are never stored locally: every listing comes from the provider,
//! kept in a short-lived cache keyed by request path.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{Days, NaiveDate, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::DataManagerError;

const AUTH_HEADER: &str = "X-Auth-Token";

#[derive(Debug, Clone)]
pub struct FootballDataConfig {
    pub base_url: String,
    pub api_key: String,
    /// Competition whose teams are offered at registration.
    pub default_competition: String,
    /// Upcoming matches are those from today to today + this many days.
    pub match_window_days: u64,
    pub cache_ttl: Duration,
}

#[derive(Clone)]
pub struct FootballDataClient {
    http: reqwest::Client,
    config: FootballDataConfig,
    cache: Arc<RwLock<ResponseCache>>,
}

impl FootballDataClient {
    pub fn new(config: FootballDataConfig) -> Result<Self, DataManagerError> {
        if config.api_key.is_empty() {
            tracing::warn!("No football-data API key configured, upstream requests will be rate limited or refused");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            cache: Arc::new(RwLock::new(ResponseCache::new(config.cache_ttl))),
            config,
        })
    }

    /// League competitions only; cups and tournaments are filtered out.
    pub async fn competitions(&self) -> Result<Value, DataManagerError> {
        let data = self.fetch("/competitions").await?;
        leagues_only(&data)
    }

    pub async fn competition(&self, competition: &str) -> Result<Value, DataManagerError> {
        let competition = path_segment(competition)?;
        self.fetch(&format!("/competitions/{competition}")).await
    }

    pub async fn competition_matches(&self, competition: &str) -> Result<Value, DataManagerError> {
        let competition = path_segment(competition)?;
        let window = self.upcoming_window();
        self.fetch(&format!("/competitions/{competition}/matches{window}")).await
    }

    pub async fn competition_teams(&self, competition: &str) -> Result<Value, DataManagerError> {
        let competition = path_segment(competition)?;
        self.fetch(&format!("/competitions/{competition}/teams")).await
    }

    pub async fn default_competition_teams(&self) -> Result<Value, DataManagerError> {
        self.competition_teams(&self.config.default_competition).await
    }

    pub async fn team(&self, team_id: i64) -> Result<Value, DataManagerError> {
        self.fetch(&format!("/teams/{team_id}")).await
    }

    /// Upcoming fixtures of a team, used for a user's favourite team.
    pub async fn team_matches(&self, team_id: i64) -> Result<Value, DataManagerError> {
        let window = self.upcoming_window();
        self.fetch(&format!("/teams/{team_id}/matches{window}")).await
    }

    pub async fn match_by_id(&self, match_id: i64) -> Result<Value, DataManagerError> {
        self.fetch(&format!("/matches/{match_id}")).await
    }

    fn upcoming_window(&self) -> String {
        let (from, to) = match_window(Utc::now().date_naive(), self.config.match_window_days);
        format!("?status=SCHEDULED&dateFrom={from}&dateTo={to}")
    }

    async fn fetch(&self, endpoint: &str) -> Result<Value, DataManagerError> {
        if let Some(body) = self.cache.read().await.get(endpoint, Instant::now()) {
            tracing::debug!("football-data cache hit for {endpoint}");
            return Ok(body);
        }

        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        tracing::debug!("Fetching {url}");

        let response = self.http
            .get(&url)
            .header(AUTH_HEADER, &self.config.api_key)
            .send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("football-data answered {status} for {endpoint}");
            return Err(DataManagerError::Upstream(format!("{endpoint} returned {status}")));
        }

        let body: Value = response.json().await?;
        self.cache.write().await.insert(endpoint.to_string(), body.clone(), Instant::now());

        Ok(body)
    }
}

/// First and last day, inclusive, of the upcoming-matches window.
pub fn match_window(today: NaiveDate, days: u64) -> (NaiveDate, NaiveDate) {
    let end = today.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX);
    (today, end)
}

fn leagues_only(data: &Value) -> Result<Value, DataManagerError> {
    let competitions = data
        .get("competitions")
        .and_then(Value::as_array)
        .ok_or_else(|| DataManagerError::Upstream("Malformed competitions listing".to_string()))?;

    Ok(Value::Array(
        competitions
            .iter()
            .filter(|competition| competition.get("type").and_then(Value::as_str) == Some("LEAGUE"))
            .cloned()
            .collect(),
    ))
}

/// Competition identifiers are numeric ids or short codes such as `FL1`.
fn path_segment(id: &str) -> Result<&str, DataManagerError> {
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(id)
    } else {
        Err(DataManagerError::InvalidInput(format!("Invalid competition id: {id}")))
    }
}

struct CachedResponse {
    fetched_at: Instant,
    body: Value,
}

struct ResponseCache {
    ttl: Duration,
    entries: HashMap<String, CachedResponse>,
}

impl ResponseCache {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    fn get(&self, key: &str, now: Instant) -> Option<Value> {
        self.entries
            .get(key)
            .filter(|entry| now.duration_since(entry.fetched_at) < self.ttl)
            .map(|entry| entry.body.clone())
    }

    /// Stale entries are dropped on every insert, so the cache only holds live paths.
    fn insert(&mut self, key: String, body: Value, now: Instant) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| now.duration_since(entry.fetched_at) < ttl);
        self.entries.insert(key, CachedResponse { fetched_at: now, body });
    }
}
