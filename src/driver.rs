//! Stage Driver
//!
//! Runs one pipeline stage for one instance: builds the stage's script, writes
//! it as an executable file, then records the stage in the status file.
//!
//! # Output Rules
//!
//! - The whole script is built in memory before anything is written
//! - On any error nothing is written, so the status file keeps pointing at
//!   the previous stage
//! - The status file is written last, after the script is executable

use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::backend::resolve_backend;
use crate::config::Config;
use crate::engine::{compute_additional_scripts, stage_body};
use crate::error::{Result, StageScriptError};
use crate::model::{ChangeSet, InstanceDefinition, Script, StatusRecord};
use crate::scripts::remote::wrap_remote;
use crate::stage::Stage;
use crate::store::InstanceStore;

/// Filesystem operations the driver needs
pub trait ScriptWriter {
    /// Writes `content` to `path`, replacing any previous file
    fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    /// Marks `path` as executable
    fn set_executable(&self, path: &Path) -> Result<()>;
}

/// Writer backed by the local filesystem.
///
/// Files are written to a sibling temporary file and renamed into place, so
/// a reader never sees a partially written script.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsScriptWriter;

impl ScriptWriter for FsScriptWriter {
    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn set_executable(&self, path: &Path) -> Result<()> {
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
        Ok(())
    }
}

/// A stage script and whether it ends with a restart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedScript {
    pub script: Script,
    pub restart_needed: bool,
}

/// Builds the script of `stage` for `instance`, without writing it.
pub fn build_stage_script(
    config: &Config,
    instance: &InstanceDefinition,
    stage: Stage,
    changes: &ChangeSet,
) -> Result<GeneratedScript> {
    let mut script = Script::for_stage(stage);
    script.body.extend(stage_body(config, instance, stage, changes)?);

    let computed = compute_additional_scripts(script.body, instance, stage, changes)?;
    script.body = computed.body;

    if computed.restart_needed {
        let backend = resolve_backend(&instance.deployment.kind)?;
        let restart = backend.restart(&instance.uuid);
        script
            .body
            .push(wrap_remote(instance.deployment.host.ssh(), &restart)?);
    }

    Ok(GeneratedScript {
        script,
        restart_needed: computed.restart_needed,
    })
}

/// Checks that an instance can be deployed: its backend exists, its payload
/// renders and its host is reachable over SSH.
pub fn check_instance(instance: &InstanceDefinition) -> Result<()> {
    let backend = resolve_backend(&instance.deployment.kind)?;
    let run = backend.run(&instance.uuid, instance)?;
    wrap_remote(instance.deployment.host.ssh(), &run)?;
    Ok(())
}

/// What a successful stage run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub stage: Stage,
    pub script_path: PathBuf,
    pub status_path: PathBuf,
    pub restart_needed: bool,
    /// Number of body fragments, preamble included
    pub fragments: usize,
}

/// Runs stages against an instance store and a writer
pub struct StageDriver<'a, S: InstanceStore, W: ScriptWriter> {
    config: &'a Config,
    store: &'a S,
    writer: &'a W,
}

impl<'a, S: InstanceStore, W: ScriptWriter> StageDriver<'a, S, W> {
    pub fn new(config: &'a Config, store: &'a S, writer: &'a W) -> Self {
        Self {
            config,
            store,
            writer,
        }
    }

    /// Generates and persists the script of `stage` for instance `uuid`.
    ///
    /// # Errors
    ///
    /// - `MissingInstance` when the store has no such instance
    /// - any builder, backend or I/O error; nothing is written in that case
    ///   unless the failure is in the writes themselves
    pub fn run(
        &self,
        stage: Stage,
        uuid: &str,
        env: &HashMap<String, String>,
    ) -> Result<StageOutcome> {
        if self.config.build_dir.as_os_str().is_empty() {
            return Err(StageScriptError::config("no build directory configured"));
        }
        if uuid.trim().is_empty() {
            return Err(StageScriptError::missing_instance(uuid));
        }
        let instance = self
            .store
            .get_instance_definition(uuid)?
            .ok_or_else(|| StageScriptError::missing_instance(uuid))?;

        let changes = ChangeSet::from_env(self.config, env);
        debug!(
            "Changes for {}: {:?} (creation: {})",
            uuid,
            changes.categories().collect::<Vec<_>>(),
            changes.is_creation()
        );

        let generated = build_stage_script(self.config, &instance, stage, &changes)?;
        let text = generated.script.render();
        let status = serde_json::to_string(&StatusRecord { status: stage })?;

        let script_path = self.config.script_path(stage);
        let status_path = self.config.status_path();

        self.writer.write_file(&script_path, &text)?;
        self.writer.set_executable(&script_path)?;
        self.writer.write_file(&status_path, &status)?;

        info!(
            "Wrote {} script for {} to {:?} (restart: {})",
            stage, uuid, script_path, generated.restart_needed
        );

        Ok(StageOutcome {
            stage,
            script_path,
            status_path,
            restart_needed: generated.restart_needed,
            fragments: generated.script.body.len(),
        })
    }
}
