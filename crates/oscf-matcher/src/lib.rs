//! Deterministic rule-based scoring and ranking of issues against profiles.

use oscf_core::{DeveloperProfile, ExperienceLevel, Issue};
use serde::Serialize;

pub const CRATE_NAME: &str = "oscf-matcher";

/// Point values and inclusion threshold for the scoring rules.
///
/// The defaults are the canonical weights; production code constructs the
/// engine with [`MatchWeights::default`] and tests may narrow or widen
/// individual bonuses to isolate one rule.
#[derive(Debug, Clone, Copy)]
pub struct MatchWeights {
    /// Flat bonus when the repository language appears exactly in the
    /// profile's skills.
    pub language_bonus: u32,
    /// Per matched label occurrence.
    pub label_bonus: u32,
    /// Per matched repository topic.
    pub topic_bonus: u32,
    /// Per interest keyword found in the issue title.
    pub title_keyword_bonus: u32,
    /// Per interest keyword found in the issue body.
    pub body_keyword_bonus: u32,
    /// Flat bonus for beginners on issues labelled "good first issue".
    pub beginner_bonus: u32,
    /// Pairs scoring strictly below this total are excluded.
    pub inclusion_threshold: u32,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            language_bonus: 30,
            label_bonus: 20,
            topic_bonus: 15,
            title_keyword_bonus: 10,
            body_keyword_bonus: 5,
            beginner_bonus: 40,
            inclusion_threshold: 30,
        }
    }
}

/// One ranked recommendation: the matched issue, its total score, and one
/// human-readable reason per rule that fired.
///
/// Results borrow the issue from the candidate set and are recomputed on
/// every ranking call; they are never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult<'a> {
    pub issue: &'a Issue,
    pub score: u32,
    pub reasons: Vec<String>,
}

/// Bidirectional substring containment, the fuzzy predicate shared by label
/// and topic matching. Callers lower-case their operands as required; there
/// is no minimum-length guard, so very short tokens match eagerly.
pub fn overlaps(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

/// Lower-cased interest keywords, split on whitespace only. No stemming and
/// no punctuation stripping; a token shared by two interests appears twice.
fn interest_keywords(interests: &[String]) -> Vec<String> {
    interests
        .iter()
        .flat_map(|interest| {
            interest
                .to_lowercase()
                .split_whitespace()
                .map(str::to_owned)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Pure scoring engine. Stateless and side-effect free; scoring N issues
/// against M profiles is independent along both axes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchEngine {
    weights: MatchWeights,
}

impl MatchEngine {
    pub const DEFAULT_LIMIT: usize = 5;

    pub fn new(weights: MatchWeights) -> Self {
        Self { weights }
    }

    /// Scores one (issue, profile) pair. Returns `None` when the total lands
    /// below the inclusion threshold.
    pub fn score_issue<'a>(
        &self,
        issue: &'a Issue,
        profile: &DeveloperProfile,
    ) -> Option<MatchResult<'a>> {
        let mut score = 0u32;
        let mut reasons = Vec::new();

        if let Some(language) = issue.repository.language.as_deref() {
            if profile.skills.iter().any(|skill| skill == language) {
                score += self.weights.language_bonus;
                reasons.push(format!(
                    "Repository uses {language}, which is in your skills"
                ));
            }
        }

        let interests_lower: Vec<String> =
            profile.interests.iter().map(|i| i.to_lowercase()).collect();
        let label_names: Vec<String> =
            issue.labels.iter().map(|l| l.name.to_lowercase()).collect();

        // Labels are not deduplicated: a repeated label adds the bonus once
        // per occurrence.
        let matched_labels: Vec<&str> = label_names
            .iter()
            .map(String::as_str)
            .filter(|label| {
                interests_lower
                    .iter()
                    .any(|interest| overlaps(label, interest))
            })
            .collect();
        if !matched_labels.is_empty() {
            score += matched_labels.len() as u32 * self.weights.label_bonus;
            reasons.push(format!(
                "Issue has labels ({}) that match your interests",
                matched_labels.join(", ")
            ));
        }

        // Topics arrive lower-cased from the catalog and are compared as-is.
        if let Some(topics) = issue.repository.topics.as_deref() {
            let matched_topics: Vec<&str> = topics
                .iter()
                .map(String::as_str)
                .filter(|topic| {
                    interests_lower
                        .iter()
                        .any(|interest| overlaps(topic, interest))
                })
                .collect();
            if !matched_topics.is_empty() {
                score += matched_topics.len() as u32 * self.weights.topic_bonus;
                reasons.push(format!(
                    "Repository has topics ({}) that match your interests",
                    matched_topics.join(", ")
                ));
            }
        }

        let keywords = interest_keywords(&profile.interests);

        let title_lower = issue.title.to_lowercase();
        let title_hits = keywords
            .iter()
            .filter(|keyword| title_lower.contains(keyword.as_str()))
            .count();
        if title_hits > 0 {
            score += title_hits as u32 * self.weights.title_keyword_bonus;
            reasons.push("Issue title contains keywords related to your interests".to_owned());
        }

        if let Some(body) = issue.body.as_deref() {
            let body_lower = body.to_lowercase();
            let body_hits = keywords
                .iter()
                .filter(|keyword| body_lower.contains(keyword.as_str()))
                .count();
            if body_hits > 0 {
                score += body_hits as u32 * self.weights.body_keyword_bonus;
                reasons.push(
                    "Issue description contains keywords related to your interests".to_owned(),
                );
            }
        }

        if profile.experience_level == ExperienceLevel::Beginner
            && label_names
                .iter()
                .any(|label| label == "good first issue" || label == "good-first-issue")
        {
            score += self.weights.beginner_bonus;
            reasons.push(
                "Issue is explicitly labeled as \"good first issue\", perfect for your experience level"
                    .to_owned(),
            );
        }

        if score < self.weights.inclusion_threshold {
            return None;
        }

        Some(MatchResult {
            issue,
            score,
            reasons,
        })
    }

    /// Scores every issue in the candidate set, drops excluded pairs, sorts
    /// by score descending and truncates to `limit`.
    ///
    /// The sort is stable, so equal scores keep candidate-set order and the
    /// output is deterministic for a fixed input. `limit == 0` yields an
    /// empty vector.
    pub fn rank<'a>(
        &self,
        issues: &'a [Issue],
        profile: &DeveloperProfile,
        limit: usize,
    ) -> Vec<MatchResult<'a>> {
        let mut matches: Vec<MatchResult<'a>> = issues
            .iter()
            .filter_map(|issue| self.score_issue(issue, profile))
            .collect();
        matches.sort_by(|a, b| b.score.cmp(&a.score));
        matches.truncate(limit);
        matches
    }
}
