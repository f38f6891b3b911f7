//! Publishing to the content repository through the `git` CLI.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Stage everything, commit, push.
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn publish_changes(&self, message: &str) -> Result<()>;
}

pub struct GitCli {
    repo_dir: PathBuf,
    remote: String,
    branch: Option<String>,
}

impl GitCli {
    pub fn new(repo_dir: &Path, remote: &str, branch: Option<&str>) -> Self {
        Self {
            repo_dir: repo_dir.to_path_buf(),
            remote: remote.to_string(),
            branch: branch.map(str::to_string),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
            .await
            .context("failed to run git")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            anyhow::bail!(
                "git {} failed ({}): {}{}",
                args.first().copied().unwrap_or_default(),
                output.status,
                stderr.trim(),
                stdout.trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn publish_changes(&self, message: &str) -> Result<()> {
        self.run(&["add", "--all"]).await?;
        self.run(&["commit", "-m", message]).await?;

        let mut push = vec!["push", self.remote.as_str()];
        if let Some(branch) = &self.branch {
            push.push(branch.as_str());
        }
        self.run(&push).await?;
        tracing::info!(remote = %self.remote, "pushed to remote");
        Ok(())
    }
}

/// Check whether a directory is inside a git work tree.
pub async fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}
