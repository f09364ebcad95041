use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{BerthError, Result, ResultExt};
use crate::models::{
    BerthConfig, Deployment, DeploymentStatus, ProgressMessage, Project, ProjectStatus,
};

use super::compose::{ComposeExecutor, ComposeProvider, DockerComposeProvider, OutputStream};
use super::git::{GitCli, GitExecutor};
use super::locks::ProjectLocks;
use super::repository::{DeploymentRepository, ProjectRepository};
use super::state::{JsonDeploymentRepository, JsonProjectRepository, StateStore};

/// Sequences git, compose and persistence for every project operation.
///
/// Mutating operations hold a per-project lock for their whole duration, so at
/// most one of create, update, start, stop, deploy or remove runs for a given
/// project at a time. Streaming operations take ownership of their output
/// sender and drop it on return, which closes the stream on every path.
pub struct ProjectService {
    projects: Arc<dyn ProjectRepository>,
    deployments: Arc<dyn DeploymentRepository>,
    git: Arc<dyn GitExecutor>,
    compose: Arc<dyn ComposeProvider>,
    config: BerthConfig,
    locks: ProjectLocks,
}

fn emit(output: &OutputStream, message: ProgressMessage) {
    if output.send(message.encode()).is_err() {
        debug!(message = %message.text, "output receiver dropped, progress message discarded");
    }
}

/// Remove `path` if present, logging instead of failing.
async fn remove_dir_best_effort(path: &Path, operation: &str) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            error!(
                layer = "service",
                operation,
                path = %path.display(),
                error = %e,
                "cleanup failed"
            );
        }
    }
}

/// Run `up_streaming`, forwarding every line to `output` while also
/// collecting it.
async fn up_with_capture(
    compose: &dyn ComposeExecutor,
    output: &OutputStream,
) -> (Result<()>, String) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let up = async move {
        let result = compose.up_streaming(&tx).await;
        drop(tx);
        result
    };
    let forward = async {
        let mut captured = String::new();
        while let Some(line) = rx.recv().await {
            captured.push_str(&line);
            captured.push('\n');
            let _ = output.send(line);
        }
        captured
    };
    tokio::join!(up, forward)
}

impl ProjectService {
    pub fn new(
        projects: Arc<dyn ProjectRepository>,
        deployments: Arc<dyn DeploymentRepository>,
        git: Arc<dyn GitExecutor>,
        compose: Arc<dyn ComposeProvider>,
        config: BerthConfig,
    ) -> Self {
        Self {
            projects,
            deployments,
            git,
            compose,
            config,
            locks: ProjectLocks::new(),
        }
    }

    /// Wire the service to the JSON state file, the `git` CLI and
    /// `docker compose`.
    pub async fn open(config: BerthConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.workspace_dir)
            .await
            .context("failed to create workspace directory")?;
        let store = Arc::new(StateStore::open(&config.state_dir()).await?);
        info!(
            workspace_dir = %config.workspace_dir.display(),
            state_file = %store.path().display(),
            "project service ready"
        );
        Ok(Self::new(
            Arc::new(JsonProjectRepository::new(store.clone())),
            Arc::new(JsonDeploymentRepository::new(store)),
            Arc::new(GitCli::new()),
            Arc::new(DockerComposeProvider::new(config.compose_command.clone())),
            config,
        ))
    }

    pub fn config(&self) -> &BerthConfig {
        &self.config
    }

    pub async fn list(&self) -> Result<Vec<Project>> {
        self.projects.list().await.inspect_err(|e| {
            error!(
                layer = "service",
                operation = "list_projects",
                error = %e,
                "service operation failed"
            );
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<Project> {
        self.projects.find_by_id(id).await.inspect_err(|e| {
            error!(
                layer = "service",
                operation = "get_project",
                project_id = %id,
                error = %e,
                "service operation failed"
            );
        })
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Project> {
        self.projects.find_by_name(name).await.inspect_err(|e| {
            error!(
                layer = "service",
                operation = "get_project",
                project_name = name,
                error = %e,
                "service operation failed"
            );
        })
    }

    pub async fn list_deployments(&self, project_id: Uuid) -> Result<Vec<Deployment>> {
        self.get(project_id).await?;
        self.deployments.list_by_project_id(project_id).await
    }

    /// Create a project by cloning its repository.
    pub async fn create(&self, project: Project) -> Result<Project> {
        self.create_from_prepared(project, None).await
    }

    /// Create a project, adopting `prepared_dir` as its checkout when given
    /// instead of cloning.
    ///
    /// Either both the working directory and the stored record exist
    /// afterwards, or neither does (cleanup failures are only logged). A
    /// project whose id is already stored is rejected before any filesystem
    /// work, and cleanup only removes directories this call created.
    pub async fn create_from_prepared(
        &self,
        mut project: Project,
        prepared_dir: Option<&Path>,
    ) -> Result<Project> {
        if project.name.trim().is_empty() {
            return Err(BerthError::Validation("project name is required".into()));
        }
        if project.git_url.trim().is_empty() {
            return Err(BerthError::Validation("git url is required".into()));
        }

        let _guard = self.locks.acquire(project.id).await;

        match self.projects.find_by_id(project.id).await {
            Ok(existing) => return Err(BerthError::ProjectAlreadyExists(existing.name)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.context("failed to create project")),
        }

        project.working_dir = Project::working_dir_for(&self.config.workspace_dir, project.id);
        let working_dir = project.working_dir.clone();
        let git_dir = project.git_dir();
        let owns_working_dir = !tokio::fs::try_exists(&working_dir)
            .await
            .context("failed to inspect project directory")?;

        match prepared_dir {
            Some(prepared) => {
                self.adopt_prepared(&project, prepared, &git_dir, owns_working_dir)
                    .await?
            }
            None => {
                if let Err(e) = self.git.clone_repo(&project.git_url, &git_dir).await {
                    error!(
                        layer = "service",
                        operation = "create_project",
                        project_id = %project.id,
                        project_name = %project.name,
                        git_url = %project.git_url,
                        error = %e,
                        "service operation failed"
                    );
                    if owns_working_dir {
                        remove_dir_best_effort(&working_dir, "create_project_cleanup").await;
                    }
                    return Err(e.context("failed to clone repository"));
                }
            }
        }

        match self.git.latest_commit(&git_dir).await {
            Ok(commit) => project.last_commit = Some(commit),
            Err(e) => {
                warn!(
                    project_id = %project.id,
                    error = %e,
                    "could not read latest commit, continuing without it"
                );
            }
        }

        match self.projects.create(&project).await {
            Ok(created) => {
                info!(
                    project_id = %created.id,
                    project_name = %created.name,
                    working_dir = %created.working_dir.display(),
                    "project created"
                );
                Ok(created)
            }
            Err(e) => {
                if owns_working_dir {
                    remove_dir_best_effort(&working_dir, "create_project_cleanup").await;
                }
                error!(
                    layer = "service",
                    operation = "create_project",
                    project_id = %project.id,
                    project_name = %project.name,
                    error = %e,
                    "service operation failed"
                );
                Err(e.context("failed to create project"))
            }
        }
    }

    async fn adopt_prepared(
        &self,
        project: &Project,
        prepared: &Path,
        git_dir: &Path,
        owns_working_dir: bool,
    ) -> Result<()> {
        if let Err(e) = tokio::fs::metadata(prepared).await {
            error!(
                layer = "service",
                operation = "create_project",
                project_id = %project.id,
                prepared_dir = %prepared.display(),
                error = %e,
                "prepared directory not found"
            );
            return Err(BerthError::from(e).context(format!(
                "prepared directory {} is not accessible",
                prepared.display()
            )));
        }

        if let Some(parent) = git_dir.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("failed to create project directory")?;
        }

        if let Err(e) = tokio::fs::rename(prepared, git_dir).await {
            remove_dir_best_effort(prepared, "create_project_cleanup").await;
            if owns_working_dir {
                remove_dir_best_effort(&project.working_dir, "create_project_cleanup").await;
            }
            error!(
                layer = "service",
                operation = "create_project",
                project_id = %project.id,
                project_name = %project.name,
                prepared_dir = %prepared.display(),
                error = %e,
                "service operation failed"
            );
            return Err(BerthError::from(e).context("failed to move prepared checkout into place"));
        }

        info!(
            prepared_dir = %prepared.display(),
            project_id = %project.id,
            git_dir = %git_dir.display(),
            "prepared checkout moved to project location"
        );
        Ok(())
    }

    /// Persist a mutated project. No filesystem side effects.
    pub async fn update(&self, project: &Project) -> Result<()> {
        let _guard = self.locks.acquire(project.id).await;
        self.projects.update(project).await
    }

    pub async fn start(&self, project_id: Uuid) -> Result<()> {
        let _guard = self.locks.acquire(project_id).await;
        let mut project = self.get(project_id).await?;

        info!(project_id = %project.id, project_name = %project.name, "starting compose project");
        let compose = self.compose.for_project(&project);
        match compose.up().await {
            Ok(output) => {
                info!(
                    project_id = %project.id,
                    output_length = output.len(),
                    "compose project started"
                );
            }
            Err(e) => {
                error!(project_id = %project.id, error = %e, "compose up failed");
                return Err(e.context("failed to start project"));
            }
        }

        project.status = ProjectStatus::Running;
        self.projects
            .update(&project)
            .await
            .context("failed to update project status")
    }

    pub async fn start_streaming(&self, project_id: Uuid, output: OutputStream) -> Result<()> {
        let _guard = self.locks.acquire(project_id).await;
        let mut project = self.get(project_id).await?;

        info!(
            project_id = %project.id,
            project_name = %project.name,
            "starting compose project with streaming"
        );
        let compose = self.compose.for_project(&project);

        emit(&output, ProgressMessage::info("Starting Docker Compose project..."));
        if let Err(e) = compose.up_streaming(&output).await {
            error!(project_id = %project.id, error = %e, "compose up failed");
            emit(&output, ProgressMessage::error(format!("Failed to start project: {e}")));
            return Err(e.context("failed to start project"));
        }
        emit(&output, ProgressMessage::success("Docker Compose project started successfully"));

        project.status = ProjectStatus::Running;
        self.projects
            .update(&project)
            .await
            .context("failed to update project status")
    }

    pub async fn stop(&self, project_id: Uuid) -> Result<()> {
        let _guard = self.locks.acquire(project_id).await;
        let mut project = self.get(project_id).await?;
        self.stop_locked(&mut project).await
    }

    /// Stop with the project lock already held by the caller.
    async fn stop_locked(&self, project: &mut Project) -> Result<()> {
        info!(project_id = %project.id, project_name = %project.name, "stopping compose project");
        let compose = self.compose.for_project(project);
        match compose.down().await {
            Ok(output) => {
                info!(
                    project_id = %project.id,
                    output_length = output.len(),
                    "compose project stopped"
                );
            }
            Err(e) => {
                error!(project_id = %project.id, error = %e, "compose down failed");
                return Err(e.context("failed to stop project"));
            }
        }

        project.status = ProjectStatus::Stopped;
        self.projects
            .update(project)
            .await
            .context("failed to update project status")
    }

    pub async fn stop_streaming(&self, project_id: Uuid, output: OutputStream) -> Result<()> {
        let _guard = self.locks.acquire(project_id).await;
        let mut project = self.get(project_id).await?;

        info!(
            project_id = %project.id,
            project_name = %project.name,
            "stopping compose project with streaming"
        );
        let compose = self.compose.for_project(&project);

        emit(&output, ProgressMessage::info("Starting Docker Compose shutdown..."));
        if let Err(e) = compose.down_streaming(&output).await {
            error!(project_id = %project.id, error = %e, "compose down failed");
            emit(&output, ProgressMessage::error(format!("Failed to stop project: {e}")));
            return Err(e.context("failed to stop project"));
        }
        emit(&output, ProgressMessage::success("Docker Compose shutdown completed successfully"));

        project.status = ProjectStatus::Stopped;
        self.projects
            .update(&project)
            .await
            .context("failed to update project status")
    }

    /// Optionally pull, then bring the project up and record a deployment.
    ///
    /// A failed `up` records a `Failed` deployment and leaves the project
    /// untouched. On success the deployment is written before the project;
    /// if the second write fails the deployment stays recorded while the
    /// project keeps its previous status and commit.
    pub async fn deploy_streaming(
        &self,
        project_id: Uuid,
        pull: bool,
        output: OutputStream,
    ) -> Result<()> {
        let _guard = self.locks.acquire(project_id).await;
        let mut project = self.get(project_id).await?;
        let git_dir = project.git_dir();

        if pull {
            emit(&output, ProgressMessage::info("Pulling latest changes from Git..."));
            if let Err(e) = self.pull_latest_changes(&project).await {
                emit(
                    &output,
                    ProgressMessage::error(format!("Failed to pull latest changes: {e}")),
                );
                return Err(e);
            }
            emit(&output, ProgressMessage::success("Git pull completed successfully"));
        }

        let commit_hash = match self.git.latest_commit(&git_dir).await {
            Ok(hash) => hash,
            Err(e) => {
                error!(
                    layer = "service",
                    operation = "deploy_project",
                    project_id = %project.id,
                    error = %e,
                    "service operation failed"
                );
                emit(
                    &output,
                    ProgressMessage::error(format!("Failed to read latest commit: {e}")),
                );
                return Err(e.context("failed to read latest commit"));
            }
        };

        let compose = self.compose.for_project(&project);
        let mut deployment = Deployment::new(project.id, commit_hash.clone(), compose.up_command());

        info!(
            project_id = %project.id,
            project_name = %project.name,
            commit = %commit_hash,
            pull,
            "starting compose deployment"
        );
        emit(&output, ProgressMessage::info("Starting Docker Compose deployment..."));
        let (result, captured) = up_with_capture(&*compose, &output).await;
        deployment.output = captured;

        if let Err(e) = result {
            error!(project_id = %project.id, error = %e, "compose up failed");
            emit(&output, ProgressMessage::error(format!("Docker Compose deployment failed: {e}")));
            deployment.status = DeploymentStatus::Failed;
            if let Err(record_err) = self.deployments.create(&deployment).await {
                error!(
                    project_id = %project.id,
                    deployment_id = %deployment.id,
                    error = %record_err,
                    "failed to record failed deployment"
                );
            }
            return Err(e.context("failed to deploy project"));
        }

        info!(
            project_id = %project.id,
            deployment_id = %deployment.id,
            "compose deployment completed"
        );
        emit(
            &output,
            ProgressMessage::success("Docker Compose deployment completed successfully"),
        );

        deployment.status = DeploymentStatus::Success;
        project.status = ProjectStatus::Running;
        project.last_commit = Some(commit_hash);

        self.deployments
            .create(&deployment)
            .await
            .context("failed to record deployment")?;
        self.projects
            .update(&project)
            .await
            .context("failed to update project status")
    }

    /// Stop the project, delete its working directory, then its record.
    pub async fn remove(&self, project_id: Uuid) -> Result<()> {
        let _guard = self.locks.acquire(project_id).await;
        let mut project = self.get(project_id).await?;

        if let Err(e) = self.stop_locked(&mut project).await {
            warn!(project_id = %project.id, error = %e, "failed to stop project before removal");
            return Err(e.context("failed to stop project before removal"));
        }

        match tokio::fs::remove_dir_all(&project.working_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    project_id = %project.id,
                    working_dir = %project.working_dir.display(),
                    "project directory already gone"
                );
            }
            Err(e) => {
                return Err(BerthError::from(e).context("failed to remove project directory"));
            }
        }

        self.projects
            .delete(project_id)
            .await
            .context("failed to delete project record")?;

        info!(
            project_id = %project.id,
            working_dir = %project.working_dir.display(),
            "project removed"
        );
        Ok(())
    }

    pub async fn logs_streaming(&self, project_id: Uuid, output: OutputStream) -> Result<()> {
        let project = self.get(project_id).await?;

        info!(project_id = %project.id, project_name = %project.name, "streaming compose logs");
        let compose = self.compose.for_project(&project);
        if let Err(e) = compose.logs_streaming(&output).await {
            error!(project_id = %project.id, error = %e, "failed to stream logs");
            return Err(e.context("failed to stream logs"));
        }
        info!(project_id = %project.id, project_name = %project.name, "log streaming completed");
        Ok(())
    }

    async fn pull_latest_changes(&self, project: &Project) -> Result<()> {
        info!(project_id = %project.id, git_url = %project.git_url, "pulling latest changes");
        self.git
            .pull(&project.git_dir())
            .await
            .inspect_err(|e| error!(project_id = %project.id, error = %e, "failed to pull changes"))
            .context("failed to pull changes")?;
        info!(project_id = %project.id, "git pull completed");
        Ok(())
    }
}
