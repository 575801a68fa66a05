//! Issue catalog sources: live GitHub fetch with a fixture fallback.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oscf_core::{Issue, Label, Repository};
use reqwest::{header, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

pub const CRATE_NAME: &str = "oscf-catalog";

const FALLBACK_ISSUES_JSON: &str = include_str!("../fixtures/fallback_issues.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request failed after retries: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("decoding {context}: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A finite, already-validated candidate set plus the source that produced it.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    pub source_id: &'static str,
    pub issues: Vec<Issue>,
}

/// A source of candidate issues. Implementations own their transport and
/// must return only records that pass [`Issue::validate`].
#[async_trait]
pub trait IssueSource: Send + Sync {
    fn source_id(&self) -> &'static str;
    async fn fetch(&self) -> Result<Vec<Issue>, CatalogError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Exponential delay, doubling per attempt and capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub api_base: String,
    pub token: Option<String>,
    pub user_agent: String,
    pub timeout: Duration,
    pub per_page: u32,
    pub retry: RetryPolicy,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_owned(),
            token: None,
            user_agent: "oscf-bot/0.1".to_owned(),
            timeout: Duration::from_secs(20),
            per_page: 30,
            retry: RetryPolicy::default(),
        }
    }
}

impl CatalogConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base: std::env::var("OSCF_GITHUB_API_BASE").unwrap_or(defaults.api_base),
            token: std::env::var("OSCF_GITHUB_TOKEN").ok(),
            user_agent: std::env::var("OSCF_USER_AGENT").unwrap_or(defaults.user_agent),
            timeout: std::env::var("OSCF_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            per_page: std::env::var("OSCF_SEARCH_PER_PAGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.per_page),
            retry: defaults.retry,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: u64,
    title: String,
    html_url: String,
    body: Option<String>,
    created_at: DateTime<Utc>,
    repository_url: String,
    labels: Vec<Label>,
}

#[derive(Debug, Deserialize)]
struct RepoDocument {
    full_name: String,
    html_url: String,
    language: Option<String>,
    #[serde(default)]
    topics: Option<Vec<String>>,
}

/// Live source backed by the GitHub search API. Fetching is two-phase:
/// one search for open "good first issue" issues, then one repository
/// document per item. Per-item failures drop the item, never the batch.
pub struct GithubSource {
    client: reqwest::Client,
    config: CatalogConfig,
}

impl GithubSource {
    pub fn new(config: CatalogConfig) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, config })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, CatalogError> {
        let mut last_request_error: Option<reqwest::Error> = None;

        for attempt in 0..=self.config.retry.max_retries {
            let mut request = self
                .client
                .get(url)
                .header(header::ACCEPT, "application/vnd.github.v3+json");
            if let Some(token) = &self.config.token {
                request = request.header(header::AUTHORIZATION, format!("token {token}"));
            }

            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let final_url = resp.url().to_string();
                    if status.is_success() {
                        return Ok(resp.json::<T>().await?);
                    }
                    if is_retryable_status(status) && attempt < self.config.retry.max_retries {
                        tokio::time::sleep(self.config.retry.delay_for_attempt(attempt)).await;
                        continue;
                    }
                    return Err(CatalogError::HttpStatus {
                        status: status.as_u16(),
                        url: final_url,
                    });
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt < self.config.retry.max_retries {
                        last_request_error = Some(err);
                        tokio::time::sleep(self.config.retry.delay_for_attempt(attempt)).await;
                        continue;
                    }
                    return Err(CatalogError::Request(err));
                }
            }
        }

        Err(CatalogError::Request(
            last_request_error.expect("retry loop captures a request error before falling through"),
        ))
    }
}

#[async_trait]
impl IssueSource for GithubSource {
    fn source_id(&self) -> &'static str {
        "github"
    }

    async fn fetch(&self) -> Result<Vec<Issue>, CatalogError> {
        let search_url = format!(
            "{}/search/issues?q=label:%22good+first+issue%22+state:open&sort=created&order=desc&per_page={}",
            self.config.api_base, self.config.per_page
        );
        let search: SearchResponse = self.get_json(&search_url).await?;

        let mut issues = Vec::with_capacity(search.items.len());
        for item in search.items {
            let repo: RepoDocument = match self.get_json(&item.repository_url).await {
                Ok(repo) => repo,
                Err(err) => {
                    warn!(issue_id = item.id, %err, "skipping issue, repository fetch failed");
                    continue;
                }
            };

            let issue = Issue {
                id: item.id,
                title: item.title,
                url: item.html_url,
                body: item.body,
                created_at: item.created_at,
                repository: Repository {
                    full_name: repo.full_name,
                    url: repo.html_url,
                    language: repo.language,
                    topics: repo.topics,
                },
                labels: item.labels,
            };
            match issue.validate() {
                Ok(()) => issues.push(issue),
                Err(err) => warn!(%err, "dropping malformed issue record"),
            }
        }
        Ok(issues)
    }
}

/// Fallback source: the embedded seven-issue dataset, used when the live
/// fetch fails so downstream always receives a finite candidate set.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureSource;

#[async_trait]
impl IssueSource for FixtureSource {
    fn source_id(&self) -> &'static str {
        "fixture"
    }

    async fn fetch(&self) -> Result<Vec<Issue>, CatalogError> {
        let records: Vec<Issue> =
            serde_json::from_str(FALLBACK_ISSUES_JSON).map_err(|source| CatalogError::Decode {
                context: "fallback_issues.json",
                source,
            })?;
        Ok(records
            .into_iter()
            .filter(|issue| match issue.validate() {
                Ok(()) => true,
                Err(err) => {
                    warn!(%err, "dropping malformed fixture record");
                    false
                }
            })
            .collect())
    }
}

/// The catalog policy: try the primary source, substitute the fallback on
/// failure. The matching core never observes a fetch error.
pub struct IssueCatalog {
    primary: Box<dyn IssueSource>,
    fallback: Box<dyn IssueSource>,
}

impl IssueCatalog {
    pub fn new(primary: Box<dyn IssueSource>, fallback: Box<dyn IssueSource>) -> Self {
        Self { primary, fallback }
    }

    pub fn from_env() -> Result<Self, CatalogError> {
        let github = GithubSource::new(CatalogConfig::from_env())?;
        Ok(Self::new(Box::new(github), Box::new(FixtureSource)))
    }

    /// A catalog wired to the fixture source only; used by tests and demos
    /// that must not touch the network.
    pub fn fixture_only() -> Self {
        Self::new(Box::new(FixtureSource), Box::new(FixtureSource))
    }

    pub async fn candidate_issues(&self) -> Result<CandidateSet, CatalogError> {
        match self.primary.fetch().await {
            Ok(issues) => Ok(CandidateSet {
                source_id: self.primary.source_id(),
                issues,
            }),
            Err(err) => {
                warn!(source_id = self.primary.source_id(), %err, "live fetch failed, using fallback dataset");
                let issues = self.fallback.fetch().await?;
                Ok(CandidateSet {
                    source_id: self.fallback.source_id(),
                    issues,
                })
            }
        }
    }
}
