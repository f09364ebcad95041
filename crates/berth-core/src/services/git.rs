use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::error::{BerthError, Result};

/// Version-control operations the project service depends on.
#[async_trait]
pub trait GitExecutor: Send + Sync {
    async fn clone_repo(&self, git_url: &str, destination: &Path) -> Result<()>;

    /// Fast-forward the checkout. An up-to-date checkout is not an error.
    async fn pull(&self, checkout: &Path) -> Result<()>;

    /// Hash of the commit at HEAD.
    async fn latest_commit(&self, checkout: &Path) -> Result<String>;
}

async fn run_git(args: &[&str], working_directory: Option<&Path>) -> Result<String> {
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(dir) = working_directory {
        cmd.current_dir(dir);
    }
    let output = cmd
        .output()
        .await
        .map_err(|e| BerthError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BerthError::Git(format!(
            "git {} failed (exit {}): {}",
            args.join(" "),
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn is_up_to_date(pull_output: &str) -> bool {
    pull_output.contains("Already up to date") || pull_output.contains("Already up-to-date")
}

/// [`GitExecutor`] backed by the `git` command line.
#[derive(Debug, Default, Clone)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GitExecutor for GitCli {
    async fn clone_repo(&self, git_url: &str, destination: &Path) -> Result<()> {
        info!(git_url, destination = %destination.display(), "cloning repository");
        let target = destination.to_string_lossy();
        if let Err(e) = run_git(&["clone", "--single-branch", git_url, &target], None).await {
            error!(
                layer = "git",
                operation = "git_clone",
                git_url,
                destination = %destination.display(),
                error = %e,
                "service operation failed"
            );
            return Err(e);
        }
        info!(git_url, destination = %destination.display(), "repository cloned");
        Ok(())
    }

    async fn pull(&self, checkout: &Path) -> Result<()> {
        debug!(checkout = %checkout.display(), "pulling repository changes");
        match run_git(&["pull", "--ff-only"], Some(checkout)).await {
            Ok(output) if is_up_to_date(&output) => {
                debug!(checkout = %checkout.display(), "repository already up to date");
                Ok(())
            }
            Ok(_) => {
                info!(checkout = %checkout.display(), "repository changes pulled");
                Ok(())
            }
            Err(e) => {
                error!(
                    layer = "git",
                    operation = "git_pull",
                    checkout = %checkout.display(),
                    error = %e,
                    "service operation failed"
                );
                Err(e)
            }
        }
    }

    async fn latest_commit(&self, checkout: &Path) -> Result<String> {
        run_git(&["rev-parse", "HEAD"], Some(checkout))
            .await
            .inspect_err(|e| {
                error!(
                    layer = "git",
                    operation = "git_get_commit",
                    checkout = %checkout.display(),
                    error = %e,
                    "service operation failed"
                );
            })
    }
}
