//! Core domain model and validation for OSCF.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "oscf-core";

/// Self-declared experience level; affects scoring bonuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("malformed email address {0:?}")]
    InvalidEmail(String),
    #[error("profile {0} declares no skills and no interests")]
    NoSignals(String),
}

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("issue {id} has an empty title")]
    EmptyTitle { id: u64 },
    #[error("issue {id} has a malformed url {url:?}")]
    MalformedUrl { id: u64, url: String },
    #[error("issue {id} has no repository name")]
    MissingRepository { id: u64 },
}

/// A developer's declared skills, interests and experience level, keyed by
/// email. Immutable once constructed; replace the whole record to update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeveloperProfile {
    pub email: String,
    pub skills: Vec<String>,
    pub interests: Vec<String>,
    pub experience_level: ExperienceLevel,
}

impl DeveloperProfile {
    pub fn new(
        email: impl Into<String>,
        skills: Vec<String>,
        interests: Vec<String>,
        experience_level: ExperienceLevel,
    ) -> Result<Self, ProfileError> {
        let profile = Self {
            email: email.into(),
            skills,
            interests,
            experience_level,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Records deserialized from external input bypass [`Self::new`]; callers
    /// persisting such records must re-validate.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if !is_valid_email(&self.email) {
            return Err(ProfileError::InvalidEmail(self.email.clone()));
        }
        if self.skills.is_empty() && self.interests.is_empty() {
            return Err(ProfileError::NoSignals(self.email.clone()));
        }
        Ok(())
    }
}

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Repository metadata attached to a candidate issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub full_name: String,
    #[serde(rename = "html_url")]
    pub url: String,
    pub language: Option<String>,
    /// Absent when the catalog could not resolve topics; the matcher skips
    /// topic scoring entirely in that case.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

/// One open-source task record, a read-only snapshot pulled from the issue
/// catalog. Field names on the wire follow the GitHub REST shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: u64,
    pub title: String,
    #[serde(rename = "html_url")]
    pub url: String,
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub repository: Repository,
    /// Duplicates are kept exactly as delivered; label scoring counts each
    /// occurrence independently.
    pub labels: Vec<Label>,
}

impl Issue {
    /// Structural validation applied by the catalog before a record may enter
    /// a candidate set. Failing records are dropped, never passed through
    /// partially.
    pub fn validate(&self) -> Result<(), IssueError> {
        if self.title.trim().is_empty() {
            return Err(IssueError::EmptyTitle { id: self.id });
        }
        for url in [&self.url, &self.repository.url] {
            if !is_http_url(url) {
                return Err(IssueError::MalformedUrl {
                    id: self.id,
                    url: url.clone(),
                });
            }
        }
        if self.repository.full_name.trim().is_empty() {
            return Err(IssueError::MissingRepository { id: self.id });
        }
        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .is_some_and(|rest| !rest.is_empty())
}
