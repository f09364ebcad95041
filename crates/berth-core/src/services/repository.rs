//! Persistence contracts consumed by the project service.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Deployment, Project};

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Fails with `ProjectNotFound` when `id` is absent.
    async fn find_by_id(&self, id: Uuid) -> Result<Project>;

    /// Fails with `ProjectNotFound` when `name` is absent.
    async fn find_by_name(&self, name: &str) -> Result<Project>;

    /// Fails with `ProjectAlreadyExists` when the name is taken.
    async fn create(&self, project: &Project) -> Result<Project>;

    /// Replaces every stored field of the project with `project`'s.
    async fn update(&self, project: &Project) -> Result<()>;

    async fn list(&self) -> Result<Vec<Project>>;

    /// Deletes the project and all of its deployments.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait DeploymentRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Deployment>;

    /// Fails with `ProjectNotFound` when the referenced project is absent.
    async fn create(&self, deployment: &Deployment) -> Result<()>;

    async fn list_by_project_id(&self, project_id: Uuid) -> Result<Vec<Deployment>>;
}
