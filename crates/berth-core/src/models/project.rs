use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::BerthError;

/// Name of the git checkout directory inside a project's working directory.
pub const GIT_CHECKOUT_DIR: &str = "git";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectStatus {
    Running,
    Stopped,
    Error,
    Unknown,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Running => "running",
            ProjectStatus::Stopped => "stopped",
            ProjectStatus::Error => "error",
            ProjectStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = BerthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(ProjectStatus::Running),
            "stopped" => Ok(ProjectStatus::Stopped),
            "error" => Ok(ProjectStatus::Error),
            "unknown" => Ok(ProjectStatus::Unknown),
            other => Err(BerthError::InvalidStatus {
                kind: "project",
                value: other.to_string(),
            }),
        }
    }
}

/// A git-backed compose project managed by berth.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub git_url: String,
    /// Assigned by the service from the workspace root and `id`.
    pub working_dir: PathBuf,
    /// Paths relative to the git checkout.
    pub compose_files: Vec<String>,
    /// Paths relative to the git checkout.
    pub environment_files: Vec<String>,
    pub status: ProjectStatus,
    pub last_commit: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(
        name: String,
        git_url: String,
        compose_files: Vec<String>,
        environment_files: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            git_url,
            working_dir: PathBuf::new(),
            compose_files,
            environment_files,
            status: ProjectStatus::Stopped,
            last_commit: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Working directory for project `id` under `workspace_dir`.
    pub fn working_dir_for(workspace_dir: &Path, id: Uuid) -> PathBuf {
        workspace_dir.join(id.to_string())
    }

    /// Directory holding the git checkout. Never the working directory itself.
    pub fn git_dir(&self) -> PathBuf {
        self.working_dir.join(GIT_CHECKOUT_DIR)
    }

    pub fn compose_paths(&self) -> Vec<PathBuf> {
        let git_dir = self.git_dir();
        self.compose_files.iter().map(|f| git_dir.join(f)).collect()
    }

    pub fn environment_paths(&self) -> Vec<PathBuf> {
        let git_dir = self.git_dir();
        self.environment_files.iter().map(|f| git_dir.join(f)).collect()
    }
}
