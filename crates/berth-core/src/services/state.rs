use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{BerthError, Result};
use crate::models::record::{DeploymentRecord, ProjectRecord};
use crate::models::{Deployment, Project};

use super::repository::{DeploymentRepository, ProjectRepository};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    #[serde(default)]
    pub projects: Vec<ProjectRecord>,
    #[serde(default)]
    pub deployments: Vec<DeploymentRecord>,
}

/// JSON file holding every project and deployment record.
pub struct StateStore {
    state_file_path: PathBuf,
    state: Mutex<StateSnapshot>,
}

impl StateStore {
    /// Open the store in `state_directory`, loading `state.json` if present.
    pub async fn open(state_directory: &Path) -> Result<Self> {
        let state_file_path = state_directory.join("state.json");
        let state = Self::load(&state_file_path).await?;
        Ok(Self {
            state_file_path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.state_file_path
    }

    async fn load(path: &Path) -> Result<StateSnapshot> {
        if !path.exists() {
            return Ok(StateSnapshot::default());
        }
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BerthError::State(format!("failed to read state file: {e}")))?;
        let state: StateSnapshot = serde_json::from_str(&json)?;
        Ok(state)
    }

    async fn save(&self, state: &StateSnapshot) -> Result<()> {
        if let Some(parent) = self.state_file_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BerthError::State(format!("failed to create state dir: {e}")))?;
        }
        let json = serde_json::to_string_pretty(state)?;
        let temp_path = self.state_file_path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json)
            .await
            .map_err(|e| BerthError::State(format!("failed to write state file: {e}")))?;
        tokio::fs::rename(&temp_path, &self.state_file_path)
            .await
            .map_err(|e| BerthError::State(format!("failed to replace state file: {e}")))?;
        Ok(())
    }

    async fn read<T>(&self, f: impl FnOnce(&StateSnapshot) -> T) -> T {
        let state = self.state.lock().await;
        f(&state)
    }

    /// Apply `f` to a copy of the state and persist it. The in-memory state
    /// only changes once the file has been written.
    async fn mutate<T>(&self, f: impl FnOnce(&mut StateSnapshot) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let value = f(&mut next)?;
        self.save(&next).await?;
        *state = next;
        Ok(value)
    }
}

pub struct JsonProjectRepository {
    store: Arc<StateStore>,
}

impl JsonProjectRepository {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProjectRepository for JsonProjectRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Project> {
        self.store
            .read(|s| s.projects.iter().find(|p| p.id == id).cloned())
            .await
            .ok_or_else(|| BerthError::ProjectNotFound(id.to_string()))?
            .to_domain()
    }

    async fn find_by_name(&self, name: &str) -> Result<Project> {
        self.store
            .read(|s| s.projects.iter().find(|p| p.name == name).cloned())
            .await
            .ok_or_else(|| BerthError::ProjectNotFound(name.to_string()))?
            .to_domain()
    }

    async fn create(&self, project: &Project) -> Result<Project> {
        let record = ProjectRecord::from_domain(project)?;
        self.store
            .mutate(|s| {
                if s.projects
                    .iter()
                    .any(|p| p.name == record.name || p.id == record.id)
                {
                    return Err(BerthError::ProjectAlreadyExists(record.name.clone()));
                }
                s.projects.push(record.clone());
                Ok(())
            })
            .await?;
        record.to_domain()
    }

    async fn update(&self, project: &Project) -> Result<()> {
        let mut record = ProjectRecord::from_domain(project)?;
        self.store
            .mutate(|s| {
                let existing = s
                    .projects
                    .iter_mut()
                    .find(|p| p.id == record.id)
                    .ok_or_else(|| BerthError::ProjectNotFound(record.id.to_string()))?;
                if existing.name != record.name {
                    return Err(BerthError::Validation(format!(
                        "project name is immutable ('{}' -> '{}')",
                        existing.name, record.name
                    )));
                }
                record.created_at = existing.created_at;
                record.updated_at = Utc::now();
                *existing = record;
                Ok(())
            })
            .await
    }

    async fn list(&self) -> Result<Vec<Project>> {
        let records = self.store.read(|s| s.projects.clone()).await;
        records.iter().map(ProjectRecord::to_domain).collect()
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.store
            .mutate(|s| {
                let before = s.projects.len();
                s.projects.retain(|p| p.id != id);
                if s.projects.len() == before {
                    return Err(BerthError::ProjectNotFound(id.to_string()));
                }
                s.deployments.retain(|d| d.project_id != id);
                Ok(())
            })
            .await
    }
}

pub struct JsonDeploymentRepository {
    store: Arc<StateStore>,
}

impl JsonDeploymentRepository {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DeploymentRepository for JsonDeploymentRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Deployment> {
        self.store
            .read(|s| s.deployments.iter().find(|d| d.id == id).cloned())
            .await
            .ok_or_else(|| BerthError::DeploymentNotFound(id.to_string()))?
            .to_domain()
    }

    async fn create(&self, deployment: &Deployment) -> Result<()> {
        let record = DeploymentRecord::from_domain(deployment);
        self.store
            .mutate(|s| {
                if !s.projects.iter().any(|p| p.id == record.project_id) {
                    return Err(BerthError::ProjectNotFound(record.project_id.to_string()));
                }
                s.deployments.push(record);
                Ok(())
            })
            .await
    }

    async fn list_by_project_id(&self, project_id: Uuid) -> Result<Vec<Deployment>> {
        let records: Vec<DeploymentRecord> = self
            .store
            .read(|s| {
                s.deployments
                    .iter()
                    .filter(|d| d.project_id == project_id)
                    .cloned()
                    .collect()
            })
            .await;
        records.iter().map(DeploymentRecord::to_domain).collect()
    }
}
