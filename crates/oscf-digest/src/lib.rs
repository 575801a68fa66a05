//! Match notification and the end-to-end digest pipeline.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oscf_catalog::IssueCatalog;
use oscf_core::DeveloperProfile;
use oscf_matcher::{MatchEngine, MatchResult};
use oscf_store::JsonProfileStore;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

pub const CRATE_NAME: &str = "oscf-digest";

pub const NOTIFICATION_SUBJECT: &str = "New Open-Source Contribution Opportunities For You!";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification dispatch failed: {0}")]
    Dispatch(String),
}

/// Delivery seam for match summaries. The pipeline has no knowledge of how
/// or whether delivery succeeds beyond the returned result.
#[async_trait]
pub trait MatchNotifier: Send + Sync {
    async fn notify(
        &self,
        profile: &DeveloperProfile,
        matches: &[MatchResult<'_>],
    ) -> Result<(), NotifyError>;
}

/// Renders the notification message for one profile. Pure, so tests can
/// assert on content without a notifier in the loop.
pub fn render_notification(profile: &DeveloperProfile, matches: &[MatchResult<'_>]) -> String {
    let mut lines = vec![
        format!("To: {}", profile.email),
        format!("Subject: {NOTIFICATION_SUBJECT}"),
        String::new(),
        "Hello Developer,".to_owned(),
        String::new(),
        "We've found some open source issues that match your skills and interests:".to_owned(),
        String::new(),
    ];

    for (index, entry) in matches.iter().enumerate() {
        lines.push(format!("{}. {}", index + 1, entry.issue.title));
        lines.push(format!(
            "   Repository: {}",
            entry.issue.repository.full_name
        ));
        lines.push(format!(
            "   Language: {}",
            entry
                .issue
                .repository
                .language
                .as_deref()
                .unwrap_or("Not specified")
        ));
        lines.push(format!("   Why it matches: {}", entry.reasons.join("; ")));
        lines.push(format!("   Link: {}", entry.issue.url));
        lines.push(String::new());
    }

    lines.push("Happy coding!".to_owned());
    lines.push("The Open Source Contribution Finder Team".to_owned());
    lines.join("\n")
}

/// Default notifier: emits the rendered message through the log stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl MatchNotifier for LogNotifier {
    async fn notify(
        &self,
        profile: &DeveloperProfile,
        matches: &[MatchResult<'_>],
    ) -> Result<(), NotifyError> {
        info!(
            email = %profile.email,
            matches = matches.len(),
            "dispatching match notification"
        );
        info!("{}", render_notification(profile, matches));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DigestConfig {
    pub store_path: PathBuf,
    pub limit: usize,
}

impl DigestConfig {
    pub fn from_env() -> Self {
        Self {
            store_path: std::env::var("OSCF_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./profiles.json")),
            limit: std::env::var("OSCF_MATCH_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(MatchEngine::DEFAULT_LIMIT),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DigestRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub source_id: String,
    pub profiles: usize,
    pub candidate_issues: usize,
    pub notified: usize,
}

/// One digest pass: fetch a candidate set once, rank it per profile, notify
/// every profile with at least one qualifying match.
pub struct DigestPipeline {
    engine: MatchEngine,
    catalog: IssueCatalog,
    notifier: Box<dyn MatchNotifier>,
    limit: usize,
}

impl DigestPipeline {
    pub fn new(catalog: IssueCatalog, notifier: Box<dyn MatchNotifier>, limit: usize) -> Self {
        Self {
            engine: MatchEngine::default(),
            catalog,
            notifier,
            limit,
        }
    }

    pub async fn run_once(&self, store: &JsonProfileStore) -> Result<DigestRunSummary> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();

        let candidate_set = self
            .catalog
            .candidate_issues()
            .await
            .context("fetching candidate issues")?;
        let profiles = store.all();

        let mut notified = 0usize;
        for profile in &profiles {
            let matches = self.engine.rank(&candidate_set.issues, profile, self.limit);
            if matches.is_empty() {
                // A profile with no qualifying issues is a normal state, not
                // an error; it simply receives no notification this run.
                info!(email = %profile.email, "no qualifying matches this run");
                continue;
            }
            self.notifier
                .notify(profile, &matches)
                .await
                .with_context(|| format!("notifying {}", profile.email))?;
            notified += 1;
        }

        Ok(DigestRunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            source_id: candidate_set.source_id.to_owned(),
            profiles: profiles.len(),
            candidate_issues: candidate_set.issues.len(),
            notified,
        })
    }
}

pub async fn run_digest_once_from_env() -> Result<DigestRunSummary> {
    let config = DigestConfig::from_env();
    let store = JsonProfileStore::open(config.store_path).await;
    let catalog = IssueCatalog::from_env().context("building issue catalog")?;
    let pipeline = DigestPipeline::new(catalog, Box::new(LogNotifier), config.limit);
    pipeline.run_once(&store).await
}
