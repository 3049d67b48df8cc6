//! Versioning provider: semantic version + source revision.
//!
//! A [`Versioning`] value is built explicitly by whichever step needs a
//! version (publisher, CLI) from a [`VersionConfig`] and a
//! [`RevisionSource`]. Revision lookup never fails; an unavailable revision
//! is the explicit [`RevisionLookup::Unavailable`] branch and renders as
//! `local`.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{Revision, Version};
use crate::git::head_revision;

/// Number of hash characters kept in a version string.
pub const SHORT_HASH_LEN: usize = 8;

/// Environment variable consulted before asking git.
pub const CI_SHA_ENV: &str = "GITHUB_SHA";

/// Semantic version components (`[versioning]` config section).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionConfig {
    #[serde(default = "default_major")]
    pub major: u32,
    #[serde(default)]
    pub minor: u32,
    #[serde(default)]
    pub patch: u32,
}

fn default_major() -> u32 {
    1
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            major: default_major(),
            minor: 0,
            patch: 0,
        }
    }
}

/// Outcome of a revision lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionLookup {
    /// Full or short commit hash.
    Found(String),
    Unavailable,
}

/// Something that can name the current source revision.
pub trait RevisionSource: Send + Sync {
    fn lookup(&self) -> RevisionLookup;
}

/// CI variable first, then `git rev-parse HEAD` in `repo_dir`.
#[derive(Debug, Clone)]
pub struct EnvOrGit {
    ci_sha: Option<String>,
    repo_dir: PathBuf,
}

impl EnvOrGit {
    pub fn new(ci_sha: Option<String>, repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            ci_sha: ci_sha.filter(|s| !s.trim().is_empty()),
            repo_dir: repo_dir.into(),
        }
    }

    /// Read `GITHUB_SHA` from the process environment.
    pub fn from_env(repo_dir: impl Into<PathBuf>) -> Self {
        Self::new(std::env::var(CI_SHA_ENV).ok(), repo_dir)
    }
}

impl RevisionSource for EnvOrGit {
    fn lookup(&self) -> RevisionLookup {
        if let Some(sha) = &self.ci_sha {
            return RevisionLookup::Found(sha.trim().to_string());
        }
        match head_revision(&self.repo_dir) {
            Ok(sha) => RevisionLookup::Found(sha),
            Err(e) => {
                tracing::debug!(error = %e, "no git revision available, using local");
                RevisionLookup::Unavailable
            }
        }
    }
}

/// Fixed answer, for tests and pinned CI runs.
#[derive(Debug, Clone)]
pub struct FixedRevision(pub RevisionLookup);

impl RevisionSource for FixedRevision {
    fn lookup(&self) -> RevisionLookup {
        self.0.clone()
    }
}

/// Version provider owned by the invoking step.
#[derive(Clone)]
pub struct Versioning {
    config: VersionConfig,
    source: Arc<dyn RevisionSource>,
}

impl std::fmt::Debug for Versioning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Versioning")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Versioning {
    pub fn new(config: VersionConfig, source: Arc<dyn RevisionSource>) -> Self {
        Self { config, source }
    }

    /// Provider that resolves revisions from the environment and git.
    pub fn from_env(config: VersionConfig, repo_dir: impl Into<PathBuf>) -> Self {
        Self::new(config, Arc::new(EnvOrGit::from_env(repo_dir)))
    }

    /// Provider with a pinned revision.
    pub fn fixed(config: VersionConfig, revision: RevisionLookup) -> Self {
        Self::new(config, Arc::new(FixedRevision(revision)))
    }

    pub fn config(&self) -> VersionConfig {
        self.config
    }

    /// Current version. Never fails.
    pub fn get_version(&self) -> Version {
        let revision = match self.source.lookup() {
            RevisionLookup::Found(hash) => {
                let short: String = hash.chars().take(SHORT_HASH_LEN).collect();
                Revision::Commit(short)
            }
            RevisionLookup::Unavailable => Revision::Local,
        };
        Version::new(
            self.config.major,
            self.config.minor,
            self.config.patch,
            revision,
        )
    }

    /// `s3://{bucket}/models/{model_name}/{version}/`
    pub fn get_model_path(&self, bucket: &str, model_name: &str) -> String {
        format!("s3://{}/models/{}/{}/", bucket, model_name, self.get_version())
    }

    /// Local wall-clock timestamp `YYYYMMDD_HHMMSS`, for backup naming.
    pub fn get_timestamp(&self) -> String {
        chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
    }
}
