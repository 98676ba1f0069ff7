//! Pipeline configuration
//!
//! Supplies the constants the stage driver consumes: environment variable
//! names for the change flags and the instance uuid, the build directory and
//! the names of the files generated there. Every field has a default, so an
//! empty JSON object is a valid configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scripts::paths::parse_slash_flag;
use crate::stage::Stage;

/// Pipeline configuration that can be saved/loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    // Environment variable names
    pub artifacts_changes_var: String,
    pub deployment_changes_var: String,
    pub data_changes_var: String,
    pub creation_var: String,
    pub instance_uuid_var: String,
    pub build_dir_var: String,

    // Generated files
    pub build_dir: PathBuf,
    pub status_file_name: String,
    pub artifacts_dir_name: String,
    pub script_names: StageScriptNames,

    /// Trailing-slash flag for both sides of the artifacts upload: `true`,
    /// `false`, or empty to keep the paths as written
    #[serde(deserialize_with = "flag_text")]
    pub artifacts_sync_slash: String,

    /// Owner applied to linked folders inside the container
    pub link_owner: String,
}

/// File name of the script generated for each stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StageScriptNames {
    pub pre_host_prepare: String,
    pub host_prepare: String,
    pub start_instance: String,
    pub post_start: String,
    pub startup_monitoring: String,
}

impl Default for StageScriptNames {
    fn default() -> Self {
        Self {
            pre_host_prepare: "pre-host-prepare.sh".to_string(),
            host_prepare: "host-prepare.sh".to_string(),
            start_instance: "start-instance.sh".to_string(),
            post_start: "post-start.sh".to_string(),
            startup_monitoring: "startup-monitoring.sh".to_string(),
        }
    }
}

impl StageScriptNames {
    /// Script name for the given stage
    pub fn get(&self, stage: Stage) -> &str {
        match stage {
            Stage::PreHostPrepare => &self.pre_host_prepare,
            Stage::HostPrepare => &self.host_prepare,
            Stage::StartInstance => &self.start_instance,
            Stage::PostStart => &self.post_start,
            Stage::StartupMonitoring => &self.startup_monitoring,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            artifacts_changes_var: "ARTIFACTS_CHANGES".to_string(),
            deployment_changes_var: "DEPLOYMENT_CHANGES".to_string(),
            data_changes_var: "DATA_CHANGES".to_string(),
            creation_var: "CREATION".to_string(),
            instance_uuid_var: "INSTANCE_UUID".to_string(),
            build_dir_var: "BUILD_PATH".to_string(),
            build_dir: PathBuf::from("/tmp/stagescript"),
            status_file_name: "status.json".to_string(),
            artifacts_dir_name: "artifacts".to_string(),
            script_names: StageScriptNames::default(),
            artifacts_sync_slash: "true".to_string(),
            link_owner: "root".to_string(),
        }
    }
}

impl Config {
    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Returns a copy whose build directory is taken from the environment, if set there
    pub fn with_env_overrides(mut self, env: &HashMap<String, String>) -> Self {
        if let Some(dir) = env.get(&self.build_dir_var).filter(|d| !d.trim().is_empty()) {
            self.build_dir = PathBuf::from(dir);
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let vars = [
            ("artifactsChangesVar", &self.artifacts_changes_var),
            ("deploymentChangesVar", &self.deployment_changes_var),
            ("dataChangesVar", &self.data_changes_var),
            ("creationVar", &self.creation_var),
            ("instanceUuidVar", &self.instance_uuid_var),
            ("buildDirVar", &self.build_dir_var),
        ];
        for (field, value) in vars {
            if value.trim().is_empty() {
                anyhow::bail!("{} must be specified", field);
            }
        }

        if self.build_dir.as_os_str().is_empty() {
            anyhow::bail!("buildDir must be specified");
        }
        if self.status_file_name.trim().is_empty() {
            anyhow::bail!("statusFileName must be specified");
        }
        if self.artifacts_dir_name.trim().is_empty() {
            anyhow::bail!("artifactsDirName must be specified");
        }
        if self.link_owner.trim().is_empty() {
            anyhow::bail!("linkOwner must be specified");
        }
        parse_slash_flag(&self.artifacts_sync_slash).context("Invalid artifactsSyncSlash")?;

        let mut seen = HashSet::new();
        for stage in Stage::all_stages() {
            let name = self.script_names.get(*stage);
            if name.trim().is_empty() {
                anyhow::bail!("Script name for stage '{}' must be specified", stage);
            }
            if name.contains('/') {
                anyhow::bail!("Script name '{}' must be a plain file name", name);
            }
            if !seen.insert(name) {
                anyhow::bail!("Script name '{}' is used by more than one stage", name);
            }
        }
        if seen.contains(self.status_file_name.as_str()) {
            anyhow::bail!(
                "Status file '{}' collides with a stage script name",
                self.status_file_name
            );
        }

        Ok(())
    }

    /// Path of the script generated for a stage
    pub fn script_path(&self, stage: Stage) -> PathBuf {
        self.build_dir.join(self.script_names.get(stage))
    }

    /// Path of the status record
    pub fn status_path(&self) -> PathBuf {
        self.build_dir.join(&self.status_file_name)
    }

    /// Directory artifacts are fetched into on the pipeline agent
    pub fn artifacts_dir(&self) -> PathBuf {
        self.build_dir.join(&self.artifacts_dir_name)
    }
}

/// Accepts a JSON boolean or string and keeps it as text
fn flag_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Text(String),
    }

    Ok(match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => b.to_string(),
        BoolOrString::Text(s) => s,
    })
}
