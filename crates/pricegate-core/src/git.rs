//! Source revision lookup through the `git` binary.

use std::path::Path;
use std::process::Command;

use crate::domain::error::{PricegateError, Result};

/// Commit hash of `HEAD` in the repository containing `repo_dir`.
///
/// Fails when git is missing, when `repo_dir` is not a work tree, when the
/// repository has no commits yet, or when git prints something that is not
/// a hex hash.
pub fn head_revision(repo_dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--verify", "HEAD"])
        .current_dir(repo_dir)
        .output()
        .map_err(|e| {
            PricegateError::GitError(format!("cannot run git in {}: {e}", repo_dir.display()))
        })?;

    if !output.status.success() {
        return Err(PricegateError::GitError(format!(
            "no HEAD revision in {}: {}",
            repo_dir.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !is_commit_hash(&hash) {
        return Err(PricegateError::GitError(format!(
            "unexpected rev-parse output '{hash}'"
        )));
    }
    Ok(hash)
}

/// Non-empty and all hex digits.
pub fn is_commit_hash(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    /// Fresh repository with one empty commit.
    pub(crate) fn make_git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init", "--quiet"]);
        git(
            dir.path(),
            &[
                "-c",
                "user.name=pricegate",
                "-c",
                "user.email=ci@pricegate.dev",
                "commit",
                "--quiet",
                "--allow-empty",
                "-m",
                "seed",
            ],
        );
        dir
    }

    #[test]
    fn head_revision_is_a_full_hash() {
        let repo = make_git_repo();
        let hash = head_revision(repo.path()).unwrap();
        assert!(hash.len() >= 40);
        assert!(is_commit_hash(&hash));
    }

    #[test]
    fn plain_directory_has_no_revision() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            head_revision(dir.path()),
            Err(PricegateError::GitError(_))
        ));
    }

    #[test]
    fn hash_shape() {
        assert!(is_commit_hash("0123abcd"));
        assert!(!is_commit_hash(""));
        assert!(!is_commit_hash("local"));
    }
}
