//! Lifecycle management for git-backed, compose-deployed projects.
//!
//! [`services::ProjectService`] is the entry point: it clones or adopts a
//! project's repository, drives `docker compose` to start, stop and redeploy
//! it, and keeps project and deployment records consistent with what
//! happened.

pub mod error;
pub mod models;
pub mod services;

pub use error::{BerthError, ErrorKind, Result};
