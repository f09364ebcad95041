pub mod config;
pub mod deployment;
pub mod message;
pub mod project;
pub mod record;

pub use config::BerthConfig;
pub use deployment::{Deployment, DeploymentStatus};
pub use message::{MessageLevel, ProgressMessage};
pub use project::{Project, ProjectStatus};
