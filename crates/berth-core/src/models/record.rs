//! Flat storage records and their mapping to domain entities.
//!
//! Status fields are stored as their lowercase string encoding and file
//! lists as a single string joined by NUL. NUL is therefore reserved and
//! can not appear inside a stored path.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BerthError, Result};

use super::deployment::Deployment;
use super::project::Project;

const FILE_SEPARATOR: char = '\0';

pub fn parse_files(s: &str) -> Vec<String> {
    if s.is_empty() {
        return Vec::new();
    }
    s.split(FILE_SEPARATOR).map(str::to_string).collect()
}

pub fn serialize_files(files: &[String]) -> String {
    files.join("\0")
}

fn validate_files(files: &[String]) -> Result<()> {
    if let Some(bad) = files.iter().find(|f| f.contains(FILE_SEPARATOR)) {
        return Err(BerthError::Validation(format!(
            "file path {bad:?} contains a NUL character"
        )));
    }
    if files.iter().any(|f| f.is_empty()) {
        return Err(BerthError::Validation("file path must not be empty".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: Uuid,
    pub name: String,
    pub git_url: String,
    pub working_dir: String,
    pub compose_files: String,
    pub environment_files: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    pub fn from_domain(project: &Project) -> Result<Self> {
        validate_files(&project.compose_files)?;
        validate_files(&project.environment_files)?;
        Ok(Self {
            id: project.id,
            name: project.name.clone(),
            git_url: project.git_url.clone(),
            working_dir: project.working_dir.to_string_lossy().to_string(),
            compose_files: serialize_files(&project.compose_files),
            environment_files: serialize_files(&project.environment_files),
            status: project.status.to_string(),
            last_commit: project.last_commit.clone(),
            created_at: project.created_at,
            updated_at: project.updated_at,
        })
    }

    pub fn to_domain(&self) -> Result<Project> {
        Ok(Project {
            id: self.id,
            name: self.name.clone(),
            git_url: self.git_url.clone(),
            working_dir: PathBuf::from(&self.working_dir),
            compose_files: parse_files(&self.compose_files),
            environment_files: parse_files(&self.environment_files),
            status: self.status.parse()?,
            last_commit: self.last_commit.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub commit_hash: String,
    pub command_line: String,
    pub status: String,
    #[serde(default)]
    pub output: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeploymentRecord {
    pub fn from_domain(deployment: &Deployment) -> Self {
        Self {
            id: deployment.id,
            project_id: deployment.project_id,
            commit_hash: deployment.commit_hash.clone(),
            command_line: deployment.command_line.clone(),
            status: deployment.status.to_string(),
            output: deployment.output.clone(),
            created_at: deployment.created_at,
            updated_at: deployment.updated_at,
        }
    }

    pub fn to_domain(&self) -> Result<Deployment> {
        Ok(Deployment {
            id: self.id,
            project_id: self.project_id,
            commit_hash: self.commit_hash.clone(),
            command_line: self.command_line.clone(),
            status: self.status.parse()?,
            output: self.output.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
