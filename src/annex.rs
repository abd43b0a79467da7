//! git-annex location queries

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::process;

/// Read-only question asked of the annex about an artifact
pub trait AnnexQuery {
    /// Whether `artifact` is an annexed object with at least one known location.
    /// Any failure to answer counts as `false`.
    fn verify_annex_urls(&self, artifact: &Path) -> bool;
}

/// One record of `git annex whereis --json`
#[derive(Debug, Deserialize)]
struct WhereisRecord {
    #[serde(default)]
    success: bool,

    #[serde(default)]
    whereis: Vec<WhereisLocation>,
}

#[derive(Debug, Deserialize)]
struct WhereisLocation {
    #[serde(default)]
    description: String,
}

/// Queries a git-annex working tree through the `git` binary
#[derive(Debug, Clone)]
pub struct GitAnnex {
    git: String,
    repo_dir: PathBuf,
    timeout: Duration,
}

impl GitAnnex {
    pub fn new(git: impl Into<String>, repo_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        GitAnnex {
            git: git.into(),
            repo_dir: repo_dir.into(),
            timeout,
        }
    }

    /// Path as git should see it: relative to the work tree when inside it,
    /// absolute otherwise. Both sides are made absolute against the current
    /// directory first so relative and absolute spellings compare equal.
    fn annex_path(&self, artifact: &Path) -> PathBuf {
        let artifact = absolute(artifact);
        let repo_dir = absolute(&self.repo_dir);
        match artifact.strip_prefix(&repo_dir) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => artifact,
        }
    }
}

impl AnnexQuery for GitAnnex {
    fn verify_annex_urls(&self, artifact: &Path) -> bool {
        let annex_path = self.annex_path(artifact);
        let repo = self.repo_dir.to_string_lossy();
        let target = annex_path.to_string_lossy();
        let args = ["-C", &*repo, "annex", "whereis", "--json", "--", &*target];

        match process::run(&self.git, &args, None, self.timeout) {
            Ok(output) => has_known_location(&output.stdout),
            Err(err) => {
                debug!(path = %artifact.display(), "git annex whereis failed: {}", err);
                false
            }
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Interpret `whereis --json` output: one JSON object per line
fn has_known_location(stdout: &str) -> bool {
    let mut records = stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str::<WhereisRecord>)
        .peekable();

    if records.peek().is_none() {
        return false;
    }

    records.all(|record| match record {
        Ok(record) => {
            for location in &record.whereis {
                debug!("Known location: {}", location.description);
            }
            record.success && !record.whereis.is_empty()
        }
        Err(_) => false,
    })
}
