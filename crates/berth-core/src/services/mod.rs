pub mod compose;
pub mod config_loader;
pub mod git;
pub mod locks;
pub mod project_service;
pub mod repository;
pub mod state;

pub use compose::{
    ComposeExecutor, ComposeProvider, DockerCompose, DockerComposeProvider, OutputStream,
};
pub use git::{GitCli, GitExecutor};
pub use project_service::ProjectService;
pub use repository::{DeploymentRepository, ProjectRepository};
pub use state::{JsonDeploymentRepository, JsonProjectRepository, StateStore};
