//! Instance definitions and generated artifacts
//!
//! The JSON shape of instance definitions follows the instance store
//! (camelCase keys, `type`/`value` pairs). Boolean flags written by older
//! tooling as the strings `"true"`/`"false"` are accepted too.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::config::Config;
use crate::error::StageScriptError;
use crate::stage::Stage;
use crate::types::{ArtifactKind, ChangeCategory, LinkKind, ScriptKind};

/// Separator used to join the fragments of a script body
pub const SCRIPT_SEPARATOR: &str = "\n";

/// Shebang line of every generated script
pub const SHEBANG: &str = "#!/bin/bash";

/// Strict-mode preamble seeding every script body
pub const STRICT_PREAMBLE: &str = "set -e\n";

/// Declarative description of one deployed instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDefinition {
    pub uuid: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub group: String,
    pub deployment: Deployment,
    #[serde(default)]
    pub scripts: Vec<AuxiliaryScript>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// Where and how an instance is deployed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    /// Backend name, resolved by `backend::resolve_backend`
    #[serde(rename = "type")]
    pub kind: String,
    pub host: Host,
    /// Directory on the host bound into the execution target
    pub host_dir: String,
    /// Backend-specific payload
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Connection descriptor of the target host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Host {
    Ssh(SshHost),
}

impl Host {
    /// SSH parameters used to reach the host
    pub fn ssh(&self) -> &SshHost {
        match self {
            Host::Ssh(ssh) => ssh,
        }
    }
}

/// SSH parameters, plus which side of a transfer lives on the remote host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshHost {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default = "default_ssh_port", deserialize_with = "string_or_number")]
    pub port: String,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub remote_src: bool,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub remote_dst: bool,
}

fn default_ssh_port() -> String {
    "22".to_string()
}

impl SshHost {
    pub fn new(user: impl Into<String>, ip: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ip: ip.into(),
            port: port.into(),
            remote_src: false,
            remote_dst: false,
        }
    }

    /// An empty descriptor means "local"
    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.ip.is_empty()
    }

    /// Both the user and the ip are set
    pub fn is_complete(&self) -> bool {
        !self.user.trim().is_empty() && !self.ip.trim().is_empty()
    }

    /// Checks that the descriptor can address a remote host.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when the user or ip is missing, or the port is not a
    /// number in `1..=65535`.
    pub fn check(&self) -> Result<(), StageScriptError> {
        if !self.is_complete() {
            return Err(StageScriptError::invalid_argument(format!(
                "remote execution needs an SSH user and ip (got '{}')",
                self.destination()
            )));
        }
        match self.port.parse::<u16>() {
            Ok(port) if port > 0 => Ok(()),
            _ => Err(StageScriptError::invalid_argument(format!(
                "invalid SSH port '{}' for {}",
                self.port,
                self.destination()
            ))),
        }
    }

    /// `user@ip`
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.ip)
    }
}

/// One optional action attached to an instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuxiliaryScript {
    #[serde(rename = "type")]
    pub kind: ScriptKind,
    #[serde(default)]
    pub value: String,
    /// Unknown category names are dropped, so they never match a change
    #[serde(default, deserialize_with = "known_categories")]
    pub conditions: Vec<ChangeCategory>,
    /// `None` when the definition names no known stage; such a script is never selected
    #[serde(default, deserialize_with = "known_stage")]
    pub execution_stage: Option<Stage>,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub at_stage_start: bool,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub restart: bool,
}

/// An artifact fetched for the instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Coordinates of a maven artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MavenCoordinates {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub packaging: String,
}

impl MavenCoordinates {
    /// File name `mvn dependency:copy` produces
    pub fn file_name(&self) -> String {
        format!("{}-{}.{}", self.artifact_id, self.version, self.packaging)
    }
}

/// A mounted folder to symlink into place inside the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "type")]
    pub kind: LinkKind,
    #[serde(default)]
    pub component: String,
    pub source: String,
    pub target: String,
}

/// What changed since the last deployment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    categories: BTreeSet<ChangeCategory>,
    creation: bool,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change set holding the given categories
    pub fn of(categories: impl IntoIterator<Item = ChangeCategory>) -> Self {
        Self {
            categories: categories.into_iter().collect(),
            creation: false,
        }
    }

    /// Marks the run as the instance's first deployment
    pub fn with_creation(mut self, creation: bool) -> Self {
        self.creation = creation;
        self
    }

    /// Builds the change set from the pipeline's environment.
    ///
    /// Only the exact string `"true"` raises a flag; a missing variable means
    /// no change.
    pub fn from_env(config: &Config, env: &HashMap<String, String>) -> Self {
        let flag = |name: &str| env.get(name).map(String::as_str) == Some("true");

        let mut changes = Self::new();
        if flag(&config.artifacts_changes_var) {
            changes.categories.insert(ChangeCategory::Artifacts);
        }
        if flag(&config.deployment_changes_var) {
            changes.categories.insert(ChangeCategory::Deployment);
        }
        if flag(&config.data_changes_var) {
            changes.categories.insert(ChangeCategory::Data);
        }
        changes.creation = flag(&config.creation_var);
        changes
    }

    pub fn contains(&self, category: ChangeCategory) -> bool {
        self.categories.contains(&category)
    }

    /// True when at least one of `conditions` is part of this change set
    pub fn intersects(&self, conditions: &[ChangeCategory]) -> bool {
        conditions.iter().any(|c| self.categories.contains(c))
    }

    pub fn is_creation(&self) -> bool {
        self.creation
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && !self.creation
    }

    pub fn categories(&self) -> impl Iterator<Item = ChangeCategory> + '_ {
        self.categories.iter().copied()
    }
}

/// A generated shell script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    /// Shebang line
    pub shebang: String,
    pub head_comment: String,
    pub body: Vec<String>,
}

impl Script {
    /// Empty script for a stage, with the strict-mode preamble as first fragment
    pub fn for_stage(stage: Stage) -> Self {
        Self {
            shebang: SHEBANG.to_string(),
            head_comment: stage.head_comment(),
            body: vec![STRICT_PREAMBLE.to_string()],
        }
    }

    /// Flattens the script to the text written on disk
    pub fn render(&self) -> String {
        let mut text = String::new();
        text.push_str(&self.shebang);
        text.push('\n');
        text.push_str(&self.head_comment);
        text.push('\n');
        text.push_str(&self.body.join(SCRIPT_SEPARATOR));
        if !text.ends_with('\n') {
            text.push('\n');
        }
        text
    }
}

/// Last completed stage, persisted for the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub status: Stage,
}

fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Text(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::Text(s) => match s.as_str() {
            "true" => Ok(true),
            "false" | "" => Ok(false),
            other => Err(de::Error::custom(format!("boolean expected: {}", other))),
        },
    }
}

fn known_stage<'de, D>(deserializer: D) -> Result<Option<Stage>, D::Error>
where
    D: Deserializer<'de>,
{
    let name = Option::<String>::deserialize(deserializer)?;
    Ok(name.and_then(|n| n.parse::<Stage>().ok()))
}

fn known_categories<'de, D>(deserializer: D) -> Result<Vec<ChangeCategory>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = Vec::<String>::deserialize(deserializer)?;
    Ok(names.iter().filter_map(|n| n.parse().ok()).collect())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        Number(u64),
        Text(String),
    }

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Number(n) => Ok(n.to_string()),
        StringOrNumber::Text(s) => Ok(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTANCE_JSON: &str = r#"{
        "uuid": "3b8d0f6e-52a1-4c8e-9d7c-1f0a2b3c4d5e",
        "type": "dev",
        "group": "tlc",
        "deployment": {
            "type": "docker",
            "host": {
                "type": "ssh",
                "value": { "user": "cdagent", "ip": "10.99.0.4", "port": 22 }
            },
            "hostDir": "/var/docker-volumes/3b8d0f6e",
            "value": { "image": "registry/app", "tag": "latest", "ports": { "443": "8443" } }
        },
        "scripts": [
            {
                "type": "shell",
                "value": "echo hello",
                "conditions": ["data"],
                "executionStage": "host-prepare",
                "atStageStart": "true",
                "restart": false
            }
        ]
    }"#;

    #[test]
    fn test_parse_instance_definition() {
        let instance: InstanceDefinition =
            serde_json::from_str(INSTANCE_JSON).expect("should parse");

        assert_eq!(instance.kind, "dev");
        assert_eq!(instance.deployment.kind, "docker");
        let ssh = instance.deployment.host.ssh();
        assert_eq!(ssh.destination(), "cdagent@10.99.0.4");
        assert_eq!(ssh.port, "22");
        assert!(!ssh.remote_src);

        let script = &instance.scripts[0];
        assert_eq!(script.kind, ScriptKind::Shell);
        assert_eq!(script.execution_stage, Some(Stage::HostPrepare));
        assert!(script.at_stage_start);
        assert!(!script.restart);
        assert!(instance.artifacts.is_empty());
        assert!(instance.links.is_empty());
    }

    #[test]
    fn test_unknown_stage_and_conditions_are_inert() {
        let json = INSTANCE_JSON
            .replace("\"host-prepare\"", "\"pre-start\"")
            .replace("[\"data\"]", "[\"data\", \"schema\"]");
        let instance: InstanceDefinition = serde_json::from_str(&json).expect("should parse");

        let script = &instance.scripts[0];
        assert_eq!(script.execution_stage, None);
        assert_eq!(script.conditions, vec![ChangeCategory::Data]);
    }

    #[test]
    fn test_missing_stage_is_inert() {
        let script: AuxiliaryScript =
            serde_json::from_str(r#"{ "type": "shell", "value": "echo", "conditions": ["data"] }"#)
                .expect("should parse");
        assert_eq!(script.execution_stage, None);
    }

    #[test]
    fn test_ssh_check() {
        assert!(SshHost::new("cdagent", "10.99.0.4", "22").check().is_ok());

        for port in ["", "0", "ssh", "70000", " 22"] {
            let err = SshHost::new("cdagent", "10.99.0.4", port).check().unwrap_err();
            assert!(matches!(err, StageScriptError::InvalidArgument(_)), "port {:?}", port);
        }

        let half = SshHost::new("", "10.99.0.4", "22");
        assert!(!half.is_empty());
        assert!(!half.is_complete());
        assert!(matches!(half.check(), Err(StageScriptError::InvalidArgument(_))));
    }

    #[test]
    fn test_invalid_boolean_string_rejected() {
        let json = INSTANCE_JSON.replace("\"atStageStart\": \"true\"", "\"atStageStart\": \"yes\"");
        let err = serde_json::from_str::<InstanceDefinition>(&json).unwrap_err();
        assert!(err.to_string().contains("boolean expected"));
    }

    #[test]
    fn test_change_set_from_env() {
        let config = Config::default();
        let mut env = HashMap::new();
        env.insert("ARTIFACTS_CHANGES".to_string(), "true".to_string());
        env.insert("DEPLOYMENT_CHANGES".to_string(), "false".to_string());
        env.insert("DATA_CHANGES".to_string(), "TRUE".to_string());

        let changes = ChangeSet::from_env(&config, &env);
        assert!(changes.contains(ChangeCategory::Artifacts));
        assert!(!changes.contains(ChangeCategory::Deployment));
        assert!(!changes.contains(ChangeCategory::Data), "only exact 'true' counts");
        assert!(!changes.is_creation());
    }

    #[test]
    fn test_change_set_empty_env() {
        let changes = ChangeSet::from_env(&Config::default(), &HashMap::new());
        assert!(changes.is_empty());
        assert!(!changes.intersects(&[ChangeCategory::Data, ChangeCategory::Artifacts]));
    }

    #[test]
    fn test_creation_is_not_a_category() {
        let changes = ChangeSet::new().with_creation(true);
        assert!(!changes.is_empty());
        assert!(!changes.intersects(&[
            ChangeCategory::Artifacts,
            ChangeCategory::Deployment,
            ChangeCategory::Data
        ]));
    }

    #[test]
    fn test_script_render() {
        let mut script = Script::for_stage(Stage::PostStart);
        script.body.push("echo one\n".to_string());
        let text = script.render();
        assert_eq!(
            text,
            "#!/bin/bash\n# Autogenerated script for the instance post-start...\nset -e\n\necho one\n"
        );
    }

    #[test]
    fn test_status_record_json() {
        let record = StatusRecord {
            status: Stage::StartupMonitoring,
        };
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"status":"startup-monitoring"}"#
        );
    }

    #[test]
    fn test_maven_file_name() {
        let coords = MavenCoordinates {
            group_id: "org.example".to_string(),
            artifact_id: "app".to_string(),
            version: "1.2.0".to_string(),
            packaging: "zip".to_string(),
        };
        assert_eq!(coords.file_name(), "app-1.2.0.zip");
    }
}
