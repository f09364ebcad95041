use std::path::Path;

use crate::error::{BerthError, Result};
use crate::models::BerthConfig;

pub const CONFIG_FILENAME: &str = "berth.yaml";

/// Load the configuration file at `config_path`.
pub fn load(config_path: &Path) -> Result<BerthConfig> {
    if !config_path.exists() {
        return Err(BerthError::ConfigNotFound(config_path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(config_path)?;
    let config: BerthConfig =
        serde_yaml::from_str(&contents).map_err(|e| BerthError::InvalidConfig(e.to_string()))?;
    if config.workspace_dir.as_os_str().is_empty() {
        return Err(BerthError::InvalidConfig(
            "workspace_dir field is required".into(),
        ));
    }
    if config.compose_command.is_empty() {
        return Err(BerthError::InvalidConfig(
            "compose_command must name a program".into(),
        ));
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn parse_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = r#"
workspace_dir: /srv/berth/projects
state_dir: /var/lib/berth
compose_command:
  - docker-compose
"#;
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, yaml).unwrap();
        let config = load(&path).unwrap();
        assert_eq!(config.workspace_dir, PathBuf::from("/srv/berth/projects"));
        assert_eq!(config.state_dir(), PathBuf::from("/var/lib/berth"));
        assert_eq!(config.compose_command, vec!["docker-compose".to_string()]);
    }

    #[test]
    fn parse_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "workspace_dir: /srv/projects\n").unwrap();
        let config = load(&path).unwrap();
        assert_eq!(config.state_dir(), PathBuf::from("/srv/projects/.berth"));
        assert_eq!(config.compose_command, vec!["docker", "compose"]);
    }

    #[test]
    fn empty_workspace_dir_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "workspace_dir: \"\"\n").unwrap();
        assert!(matches!(load(&path), Err(BerthError::InvalidConfig(_))));
    }

    #[test]
    fn empty_compose_command_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "workspace_dir: /w\ncompose_command: []\n").unwrap();
        assert!(matches!(load(&path), Err(BerthError::InvalidConfig(_))));
    }

    #[test]
    fn missing_config_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load(&dir.path().join(CONFIG_FILENAME)),
            Err(BerthError::ConfigNotFound(_))
        ));
    }
}
