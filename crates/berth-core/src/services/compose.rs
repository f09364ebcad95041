use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{BerthError, Result};
use crate::models::Project;

/// Sending half of a streaming operation's output channel.
pub type OutputStream = tokio::sync::mpsc::UnboundedSender<String>;

/// Container-orchestration operations over one project's compose files.
///
/// Streaming variants write tool output into the borrowed stream and never
/// close it; closing belongs to whoever owns the sender.
#[async_trait]
pub trait ComposeExecutor: Send + Sync {
    /// Command line of the `up` invocation, as recorded on deployments.
    fn up_command(&self) -> String;

    async fn up(&self) -> Result<String>;

    async fn up_streaming(&self, output: &OutputStream) -> Result<()>;

    async fn down(&self) -> Result<String>;

    async fn down_streaming(&self, output: &OutputStream) -> Result<()>;

    /// Follows container logs until they end or the receiver goes away.
    async fn logs_streaming(&self, output: &OutputStream) -> Result<()>;
}

/// Builds a [`ComposeExecutor`] for a project.
pub trait ComposeProvider: Send + Sync {
    fn for_project(&self, project: &Project) -> Box<dyn ComposeExecutor>;
}

/// Compose project names allow lowercase letters, digits, `-` and `_`.
///
/// The project id is appended so that names differing only in characters
/// compose rejects still map to distinct compose projects.
pub fn compose_project_name(name: &str, id: Uuid) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let sanitized = sanitized.trim_matches(['-', '_']);
    if sanitized.is_empty() {
        format!("berth-{}", id.simple())
    } else {
        format!("{sanitized}-{}", id.simple())
    }
}

/// [`ComposeExecutor`] that shells out to `docker compose`.
#[derive(Debug, Clone)]
pub struct DockerCompose {
    program: String,
    base_args: Vec<String>,
    project_name: String,
    checkout: PathBuf,
    compose_files: Vec<PathBuf>,
    environment_files: Vec<PathBuf>,
}

impl DockerCompose {
    /// `compose_command` is the program followed by its leading arguments,
    /// e.g. `["docker", "compose"]`.
    pub fn new(compose_command: &[String], project: &Project) -> Self {
        let (program, base_args) = match compose_command.split_first() {
            Some((program, rest)) => (program.clone(), rest.to_vec()),
            None => ("docker".to_string(), vec!["compose".to_string()]),
        };
        Self {
            program,
            base_args,
            project_name: compose_project_name(&project.name, project.id),
            checkout: project.git_dir(),
            compose_files: project.compose_paths(),
            environment_files: project.environment_paths(),
        }
    }

    fn args(&self, action: &[&str]) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push("-p".into());
        args.push(self.project_name.clone());
        for file in &self.compose_files {
            args.push("-f".into());
            args.push(file.to_string_lossy().to_string());
        }
        for file in &self.environment_files {
            args.push("--env-file".into());
            args.push(file.to_string_lossy().to_string());
        }
        args.extend(action.iter().map(|a| a.to_string()));
        args
    }

    fn command_line(&self, action: &[&str]) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args(action));
        parts.join(" ")
    }

    fn command(&self, action: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(action));
        cmd.current_dir(&self.checkout);
        cmd
    }

    async fn run(&self, action: &[&str]) -> Result<String> {
        debug!(command = %self.command_line(action), "running compose");
        let output = self
            .command(action)
            .output()
            .await
            .map_err(|e| BerthError::Compose(format!("failed to run {}: {e}", self.program)))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(BerthError::Compose(format!(
                "{} failed (exit {}): {}",
                self.command_line(action),
                output.status.code().unwrap_or(-1),
                combined.trim()
            )));
        }
        Ok(combined)
    }

    async fn run_streaming(
        &self,
        action: &[&str],
        output: &OutputStream,
        stop_when_unobserved: bool,
    ) -> Result<()> {
        debug!(command = %self.command_line(action), "running compose with streaming output");
        let mut cmd = self.command(action);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| BerthError::Compose(format!("failed to spawn {}: {e}", self.program)))?;

        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, output.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, output.clone()));
        }

        let status = if stop_when_unobserved {
            tokio::select! {
                status = child.wait() => Some(status),
                _ = output.closed() => None,
            }
        } else {
            Some(child.wait().await)
        };

        let status = match status {
            Some(status) => status,
            None => {
                info!(
                    command = %self.command_line(action),
                    "output receiver dropped, stopping compose"
                );
                let killed = child.kill().await;
                for reader in readers {
                    let _ = reader.await;
                }
                return killed
                    .map_err(|e| BerthError::Compose(format!("failed to stop compose: {e}")));
            }
        };

        for reader in readers {
            let _ = reader.await;
        }

        let status =
            status.map_err(|e| BerthError::Compose(format!("failed to wait for compose: {e}")))?;
        if !status.success() {
            return Err(BerthError::Compose(format!(
                "{} failed (exit {})",
                self.command_line(action),
                status.code().unwrap_or(-1)
            )));
        }
        Ok(())
    }
}

fn forward_lines<R>(source: R, output: OutputStream) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(source).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let _ = output.send(line);
        }
    })
}

#[async_trait]
impl ComposeExecutor for DockerCompose {
    fn up_command(&self) -> String {
        self.command_line(&["up", "-d"])
    }

    async fn up(&self) -> Result<String> {
        self.run(&["up", "-d"]).await
    }

    async fn up_streaming(&self, output: &OutputStream) -> Result<()> {
        self.run_streaming(&["up", "-d"], output, false).await
    }

    async fn down(&self) -> Result<String> {
        self.run(&["down"]).await
    }

    async fn down_streaming(&self, output: &OutputStream) -> Result<()> {
        self.run_streaming(&["down"], output, false).await
    }

    async fn logs_streaming(&self, output: &OutputStream) -> Result<()> {
        self.run_streaming(&["logs", "--follow"], output, true).await
    }
}

/// Production [`ComposeProvider`] creating [`DockerCompose`] executors.
#[derive(Debug, Clone)]
pub struct DockerComposeProvider {
    compose_command: Vec<String>,
}

impl DockerComposeProvider {
    pub fn new(compose_command: Vec<String>) -> Self {
        Self { compose_command }
    }
}

impl ComposeProvider for DockerComposeProvider {
    fn for_project(&self, project: &Project) -> Box<dyn ComposeExecutor> {
        Box::new(DockerCompose::new(&self.compose_command, project))
    }
}
