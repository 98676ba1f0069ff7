//! Deployment backend contracts.
//!
//! This module provides the `DeploymentBackend` trait: the primitive actions a
//! deployment target supports, each rendered as shell text. The selection
//! engine and the stage driver only talk to this trait, so a new target is
//! added by implementing it and registering a `DeploymentType` variant, never
//! by branching on type names elsewhere.
//!
//! # Contract
//!
//! - Every method returns newline-terminated shell text.
//! - Nothing is executed or checked; a missing container is a failure of the
//!   generated script, not of the generator.
//! - Output is a pure function of the arguments.

pub mod docker;

use crate::error::{Result, StageScriptError};
use crate::model::InstanceDefinition;
use crate::types::DeploymentType;

pub use docker::{ContainerSpec, DockerBackend};

/// Primitive actions of a deployment target.
pub trait DeploymentBackend {
    /// The deployment type this backend serves
    fn deployment_type(&self) -> DeploymentType;

    /// Runs `then_cmd` if the target `name` exists, `else_cmd` otherwise.
    ///
    /// Missing or empty commands default to a no-op.
    fn existence_branch(&self, name: &str, then_cmd: Option<&str>, else_cmd: Option<&str>)
        -> String;

    /// Restarts `name` if it exists
    fn restart(&self, name: &str) -> String;

    /// Stops and removes `name` (with its volumes) if it exists
    fn remove(&self, name: &str) -> String;

    /// Creates and starts `name` from the instance definition
    fn run(&self, name: &str, instance: &InstanceDefinition) -> Result<String>;

    /// Executes `command` inside `name`
    fn execute(&self, name: &str, command: &str) -> String;

    /// Copies a host file into `name`
    fn copy(&self, name: &str, source: &str, destination: &str, sudo: bool) -> String;
}

/// Backend serving a deployment type
pub fn backend_for(deployment_type: DeploymentType) -> &'static dyn DeploymentBackend {
    match deployment_type {
        DeploymentType::Docker => &DockerBackend,
    }
}

/// Resolves the backend named by a deployment's `type`.
///
/// # Errors
///
/// `UnsupportedBackend` when no backend serves that name.
pub fn resolve_backend(kind: &str) -> Result<&'static dyn DeploymentBackend> {
    let deployment_type = kind
        .parse::<DeploymentType>()
        .map_err(|_| StageScriptError::unsupported_backend(kind))?;
    Ok(backend_for(deployment_type))
}
