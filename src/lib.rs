//! stagescript library
//!
//! Synthesizes the shell script a continuous-delivery pipeline runs at each
//! deployment stage of a long-lived instance, plus the status record that
//! marks the stage as done.

pub mod backend;
pub mod cli;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod model;
pub mod scripts;
pub mod stage;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use backend::{backend_for, resolve_backend, ContainerSpec, DeploymentBackend, DockerBackend};
pub use config::{Config, StageScriptNames};
pub use driver::{
    build_stage_script, check_instance, FsScriptWriter, GeneratedScript, ScriptWriter,
    StageDriver, StageOutcome,
};
pub use engine::{compute_additional_scripts, select_scripts, stage_body, ComputedScript};
pub use error::{Result, StageScriptError};
pub use model::{
    Artifact, AuxiliaryScript, ChangeSet, Deployment, Host, InstanceDefinition, Link,
    MavenCoordinates, Script, SshHost, StatusRecord,
};
pub use stage::Stage;
pub use store::{InstanceStore, JsonFileStore, StoreEntry};
pub use types::{ArtifactKind, ChangeCategory, DeploymentType, LinkKind, ScriptKind};
