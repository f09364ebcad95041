// Each test binary compiles this module independently and uses a different
// subset of helpers, so unused-function warnings are expected.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use berth_core::error::{BerthError, Result};
use berth_core::models::{BerthConfig, Deployment, Project};
use berth_core::services::{
    ComposeExecutor, ComposeProvider, DeploymentRepository, GitExecutor, OutputStream,
    ProjectRepository, ProjectService,
};

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    pub projects: Mutex<HashMap<Uuid, Project>>,
    pub deployments: Mutex<Vec<Deployment>>,
    pub fail_project_create: AtomicBool,
    pub fail_project_update: AtomicBool,
    pub fail_deployment_create: AtomicBool,
}

pub struct MemoryProjectRepository(pub Arc<MemoryStore>);

#[async_trait]
impl ProjectRepository for MemoryProjectRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Project> {
        self.0
            .projects
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| BerthError::ProjectNotFound(id.to_string()))
    }

    async fn find_by_name(&self, name: &str) -> Result<Project> {
        self.0
            .projects
            .lock()
            .unwrap()
            .values()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| BerthError::ProjectNotFound(name.to_string()))
    }

    async fn create(&self, project: &Project) -> Result<Project> {
        if self.0.fail_project_create.load(Ordering::SeqCst) {
            return Err(BerthError::State("simulated create failure".into()));
        }
        let mut projects = self.0.projects.lock().unwrap();
        if projects.values().any(|p| p.name == project.name) {
            return Err(BerthError::ProjectAlreadyExists(project.name.clone()));
        }
        projects.insert(project.id, project.clone());
        Ok(project.clone())
    }

    async fn update(&self, project: &Project) -> Result<()> {
        if self.0.fail_project_update.load(Ordering::SeqCst) {
            return Err(BerthError::State("simulated update failure".into()));
        }
        let mut projects = self.0.projects.lock().unwrap();
        match projects.get_mut(&project.id) {
            Some(existing) => {
                *existing = project.clone();
                Ok(())
            }
            None => Err(BerthError::ProjectNotFound(project.id.to_string())),
        }
    }

    async fn list(&self) -> Result<Vec<Project>> {
        Ok(self.0.projects.lock().unwrap().values().cloned().collect())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        if self.0.projects.lock().unwrap().remove(&id).is_none() {
            return Err(BerthError::ProjectNotFound(id.to_string()));
        }
        self.0
            .deployments
            .lock()
            .unwrap()
            .retain(|d| d.project_id != id);
        Ok(())
    }
}

pub struct MemoryDeploymentRepository(pub Arc<MemoryStore>);

#[async_trait]
impl DeploymentRepository for MemoryDeploymentRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Deployment> {
        self.0
            .deployments
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| BerthError::DeploymentNotFound(id.to_string()))
    }

    async fn create(&self, deployment: &Deployment) -> Result<()> {
        if self.0.fail_deployment_create.load(Ordering::SeqCst) {
            return Err(BerthError::State("simulated deployment failure".into()));
        }
        if !self
            .0
            .projects
            .lock()
            .unwrap()
            .contains_key(&deployment.project_id)
        {
            return Err(BerthError::ProjectNotFound(deployment.project_id.to_string()));
        }
        self.0.deployments.lock().unwrap().push(deployment.clone());
        Ok(())
    }

    async fn list_by_project_id(&self, project_id: Uuid) -> Result<Vec<Deployment>> {
        Ok(self
            .0
            .deployments
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.project_id == project_id)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Git
// ---------------------------------------------------------------------------

pub const FAKE_COMMIT: &str = "0123456789abcdef0123456789abcdef01234567";

#[derive(Default)]
pub struct FakeGit {
    pub fail_clone: AtomicBool,
    pub fail_pull: AtomicBool,
    pub fail_commit: AtomicBool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeGit {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GitExecutor for FakeGit {
    async fn clone_repo(&self, git_url: &str, destination: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(format!("clone {git_url}"));
        // A real clone creates the checkout before failing part way through.
        std::fs::create_dir_all(destination)?;
        if self.fail_clone.load(Ordering::SeqCst) {
            return Err(BerthError::Git("simulated clone failure".into()));
        }
        std::fs::write(destination.join("compose.yaml"), "services: {}\n")?;
        Ok(())
    }

    async fn pull(&self, checkout: &Path) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("pull {}", checkout.display()));
        if self.fail_pull.load(Ordering::SeqCst) {
            return Err(BerthError::Git("simulated pull failure".into()));
        }
        Ok(())
    }

    async fn latest_commit(&self, _checkout: &Path) -> Result<String> {
        self.calls.lock().unwrap().push("rev-parse".into());
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(BerthError::Git("simulated rev-parse failure".into()));
        }
        Ok(FAKE_COMMIT.to_string())
    }
}

// ---------------------------------------------------------------------------
// Compose
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ComposeScript {
    pub fail_up: AtomicBool,
    pub fail_down: AtomicBool,
    pub fail_logs: AtomicBool,
    /// Lines every streaming call writes before finishing.
    pub lines: Mutex<Vec<String>>,
    pub delay: Mutex<Option<Duration>>,
    pub calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ComposeScript {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_lines(&self, lines: &[&str]) {
        *self.lines.lock().unwrap() = lines.iter().map(|l| l.to_string()).collect();
    }

    async fn run(
        &self,
        action: &str,
        project: &str,
        output: Option<&OutputStream>,
    ) -> Result<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(format!("{action} {project}"));

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let lines = self.lines.lock().unwrap().clone();
        if let Some(output) = output {
            for line in &lines {
                let _ = output.send(line.clone());
            }
        }

        let failed = match action {
            "up" => self.fail_up.load(Ordering::SeqCst),
            "down" => self.fail_down.load(Ordering::SeqCst),
            _ => self.fail_logs.load(Ordering::SeqCst),
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if failed {
            return Err(BerthError::Compose(format!("simulated {action} failure")));
        }
        Ok(lines.join("\n"))
    }
}

pub struct FakeCompose {
    project_name: String,
    script: Arc<ComposeScript>,
}

#[async_trait]
impl ComposeExecutor for FakeCompose {
    fn up_command(&self) -> String {
        format!("docker compose -p {} up -d", self.project_name)
    }

    async fn up(&self) -> Result<String> {
        self.script.run("up", &self.project_name, None).await
    }

    async fn up_streaming(&self, output: &OutputStream) -> Result<()> {
        self.script
            .run("up", &self.project_name, Some(output))
            .await
            .map(|_| ())
    }

    async fn down(&self) -> Result<String> {
        self.script.run("down", &self.project_name, None).await
    }

    async fn down_streaming(&self, output: &OutputStream) -> Result<()> {
        self.script
            .run("down", &self.project_name, Some(output))
            .await
            .map(|_| ())
    }

    async fn logs_streaming(&self, output: &OutputStream) -> Result<()> {
        self.script
            .run("logs", &self.project_name, Some(output))
            .await
            .map(|_| ())
    }
}

pub struct FakeComposeProvider(pub Arc<ComposeScript>);

impl ComposeProvider for FakeComposeProvider {
    fn for_project(&self, project: &Project) -> Box<dyn ComposeExecutor> {
        Box::new(FakeCompose {
            project_name: project.name.clone(),
            script: self.0.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub service: Arc<ProjectService>,
    pub store: Arc<MemoryStore>,
    pub git: Arc<FakeGit>,
    pub compose: Arc<ComposeScript>,
    pub workspace: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let workspace = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::default());
        let git = Arc::new(FakeGit::default());
        let compose = Arc::new(ComposeScript::default());
        let service = ProjectService::new(
            Arc::new(MemoryProjectRepository(store.clone())),
            Arc::new(MemoryDeploymentRepository(store.clone())),
            git.clone(),
            Arc::new(FakeComposeProvider(compose.clone())),
            BerthConfig::new(workspace.path().join("projects")),
        );
        Self {
            service: Arc::new(service),
            store,
            git,
            compose,
            workspace,
        }
    }

    pub fn workspace_dir(&self) -> PathBuf {
        self.workspace.path().join("projects")
    }

    pub fn stored(&self, id: Uuid) -> Option<Project> {
        self.store.projects.lock().unwrap().get(&id).cloned()
    }

    pub fn deployments(&self) -> Vec<Deployment> {
        self.store.deployments.lock().unwrap().clone()
    }

    /// Create a project through the clone path.
    pub async fn create_project(&self, name: &str) -> Project {
        self.service.create(new_project(name)).await.unwrap()
    }
}

pub fn new_project(name: &str) -> Project {
    Project::new(
        name.to_string(),
        format!("https://git.example/{name}.git"),
        vec!["compose.yaml".into()],
        vec![],
    )
}

pub fn channel() -> (OutputStream, mpsc::UnboundedReceiver<String>) {
    mpsc::unbounded_channel()
}

/// Drain a receiver whose sender has been dropped.
pub async fn drain(mut rx: mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(line) = rx.recv().await {
        lines.push(line);
    }
    lines
}
