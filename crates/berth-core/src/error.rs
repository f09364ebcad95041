use std::path::PathBuf;

/// Coarse classification of a [`BerthError`], stable across context wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    ExternalTool,
    Io,
    Validation,
    Persistence,
    Config,
}

#[derive(Debug, thiserror::Error)]
pub enum BerthError {
    #[error("project '{0}' not found")]
    ProjectNotFound(String),

    #[error("deployment '{0}' not found")]
    DeploymentNotFound(String),

    #[error("project '{0}' already exists")]
    ProjectAlreadyExists(String),

    #[error("config file not found at {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid {kind} status: {value:?}")]
    InvalidStatus { kind: &'static str, value: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("git operation failed: {0}")]
    Git(String),

    #[error("compose operation failed: {0}")]
    Compose(String),

    #[error("state persistence failed: {0}")]
    State(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<BerthError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl BerthError {
    /// Kind of the innermost error, looking through any context layers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BerthError::ProjectNotFound(_) | BerthError::DeploymentNotFound(_) => {
                ErrorKind::NotFound
            }
            BerthError::ProjectAlreadyExists(_) => ErrorKind::AlreadyExists,
            BerthError::ConfigNotFound(_) | BerthError::InvalidConfig(_) | BerthError::Yaml(_) => {
                ErrorKind::Config
            }
            BerthError::InvalidStatus { .. } | BerthError::Validation(_) => ErrorKind::Validation,
            BerthError::Git(_) | BerthError::Compose(_) => ErrorKind::ExternalTool,
            BerthError::State(_) | BerthError::Json(_) => ErrorKind::Persistence,
            BerthError::Io(_) => ErrorKind::Io,
            BerthError::Context { source, .. } => source.kind(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Wrap this error with a description of the operation that failed.
    pub fn context(self, context: impl Into<String>) -> Self {
        BerthError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Attach operation context to the error side of a [`Result`].
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<BerthError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(context))
    }
}

pub type Result<T> = std::result::Result<T, BerthError>;
