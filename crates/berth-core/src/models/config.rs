use std::path::PathBuf;

use serde::Deserialize;

fn default_compose_command() -> Vec<String> {
    vec!["docker".to_string(), "compose".to_string()]
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BerthConfig {
    /// Root under which every project gets its own working directory.
    pub workspace_dir: PathBuf,
    /// Where the state file lives. Defaults to `<workspace_dir>/.berth`.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    /// Program and leading arguments used to invoke compose.
    #[serde(default = "default_compose_command")]
    pub compose_command: Vec<String>,
}

impl BerthConfig {
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
            state_dir: None,
            compose_command: default_compose_command(),
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(|| self.workspace_dir.join(".berth"))
    }
}
