//! Profile persistence for OSCF: a JSON document store keyed by email.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use oscf_core::{DeveloperProfile, ExperienceLevel, ProfileError};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

pub const CRATE_NAME: &str = "oscf-store";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Invalid(#[from] ProfileError),
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

/// Profile store backed by a single JSON file holding an array of profiles.
///
/// All reads are served from memory; every mutation validates first, then
/// rewrites the file through a temp-file + atomic rename so a crash never
/// leaves a half-written store behind.
#[derive(Debug)]
pub struct JsonProfileStore {
    path: PathBuf,
    profiles: BTreeMap<String, DeveloperProfile>,
}

impl JsonProfileStore {
    /// Opens the store at `path`, hydrating from the file when it exists.
    /// A missing or unparsable file opens an empty store with a logged
    /// warning rather than failing the process.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let profiles = match fs::read_to_string(&path).await {
            Ok(text) => match serde_json::from_str::<Vec<DeveloperProfile>>(&text) {
                Ok(records) => records
                    .into_iter()
                    .map(|profile| (profile.email.clone(), profile))
                    .collect(),
                Err(err) => {
                    warn!(path = %path.display(), %err, "profile store is unreadable, starting empty");
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to read profile store, starting empty");
                BTreeMap::new()
            }
        };
        Self { path, profiles }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, email: &str) -> Option<&DeveloperProfile> {
        self.profiles.get(email)
    }

    /// All profiles in stable (email) order.
    pub fn all(&self) -> Vec<DeveloperProfile> {
        self.profiles.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Validates and inserts or replaces the profile keyed by its email.
    pub async fn upsert(&mut self, profile: DeveloperProfile) -> Result<(), StoreError> {
        profile.validate()?;
        self.profiles.insert(profile.email.clone(), profile);
        self.persist().await?;
        Ok(())
    }

    /// Removes the profile for `email`; returns whether anything was removed.
    pub async fn delete(&mut self, email: &str) -> Result<bool, StoreError> {
        let removed = self.profiles.remove(email).is_some();
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Inserts the three sample profiles shipped for demos and tests.
    pub async fn seed_samples(&mut self) -> Result<(), StoreError> {
        for profile in sample_profiles() {
            self.upsert(profile).await?;
        }
        Ok(())
    }

    async fn persist(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating store directory {}", parent.display()))?;
            }
        }

        let records: Vec<&DeveloperProfile> = self.profiles.values().collect();
        let bytes = serde_json::to_vec_pretty(&records).context("serializing profile store")?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "profiles.json".to_owned());
        let temp_path = self.path.with_file_name(format!(".{file_name}.tmp"));

        let mut file = fs::File::create(&temp_path)
            .await
            .with_context(|| format!("opening temp store file {}", temp_path.display()))?;
        file.write_all(&bytes)
            .await
            .with_context(|| format!("writing temp store file {}", temp_path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing temp store file {}", temp_path.display()))?;
        drop(file);

        fs::rename(&temp_path, &self.path).await.with_context(|| {
            format!(
                "atomically renaming {} -> {}",
                temp_path.display(),
                self.path.display()
            )
        })?;
        Ok(())
    }
}

/// The demo profiles carried over from the original dataset.
pub fn sample_profiles() -> Vec<DeveloperProfile> {
    vec![
        DeveloperProfile {
            email: "dev1@example.com".into(),
            skills: vec!["JavaScript".into(), "React".into(), "TypeScript".into()],
            interests: vec!["web development".into(), "UI/UX".into()],
            experience_level: ExperienceLevel::Intermediate,
        },
        DeveloperProfile {
            email: "dev2@example.com".into(),
            skills: vec!["Python".into(), "Django".into(), "JavaScript".into()],
            interests: vec!["backend".into(), "data science".into()],
            experience_level: ExperienceLevel::Beginner,
        },
        DeveloperProfile {
            email: "dev3@example.com".into(),
            skills: vec!["Go".into(), "Rust".into(), "C++".into()],
            interests: vec!["systems".into(), "performance".into()],
            experience_level: ExperienceLevel::Advanced,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("profiles.json")
    }

    #[tokio::test]
    async fn upsert_get_delete_round_trip() {
        let dir = tempdir().expect("tempdir");
        let mut store = JsonProfileStore::open(store_path(&dir)).await;

        let profile = sample_profiles().remove(0);
        store.upsert(profile.clone()).await.expect("upsert");
        assert_eq!(store.get("dev1@example.com"), Some(&profile));
        assert_eq!(store.len(), 1);

        assert!(store.delete("dev1@example.com").await.expect("delete"));
        assert!(!store.delete("dev1@example.com").await.expect("second delete"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn profiles_survive_reopen() {
        let dir = tempdir().expect("tempdir");
        let path = store_path(&dir);

        let mut store = JsonProfileStore::open(&path).await;
        store.seed_samples().await.expect("seed");
        drop(store);

        let reopened = JsonProfileStore::open(&path).await;
        assert_eq!(reopened.len(), 3);
        assert!(reopened.get("dev2@example.com").is_some());
        // BTreeMap keeps listings in stable email order.
        let emails: Vec<String> = reopened.all().into_iter().map(|p| p.email).collect();
        assert_eq!(
            emails,
            vec!["dev1@example.com", "dev2@example.com", "dev3@example.com"]
        );
    }

    #[tokio::test]
    async fn invalid_profile_is_rejected_and_not_persisted() {
        let dir = tempdir().expect("tempdir");
        let path = store_path(&dir);
        let mut store = JsonProfileStore::open(&path).await;

        let mut profile = sample_profiles().remove(0);
        profile.email = "not-an-email".into();
        let result = store.upsert(profile).await;
        assert!(matches!(result, Err(StoreError::Invalid(_))));
        assert!(store.is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn corrupt_store_file_opens_empty() {
        let dir = tempdir().expect("tempdir");
        let path = store_path(&dir);
        std::fs::write(&path, b"{ not json").expect("write corrupt file");

        let store = JsonProfileStore::open(&path).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn upsert_replaces_existing_record() {
        let dir = tempdir().expect("tempdir");
        let mut store = JsonProfileStore::open(store_path(&dir)).await;

        let mut profile = sample_profiles().remove(0);
        store.upsert(profile.clone()).await.expect("first upsert");
        profile.skills.push("Svelte".into());
        store.upsert(profile.clone()).await.expect("second upsert");

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&profile.email), Some(&profile));
    }
}
