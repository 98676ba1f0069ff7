//! Docker deployment backend.
//!
//! Containers are named after the instance uuid. All generated text is meant
//! to be sent through `wrap_remote`, whose heredoc is unquoted: variables that
//! must expand on the host are escaped (`\$container`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::backend::DeploymentBackend;
use crate::error::{Result, StageScriptError};
use crate::model::InstanceDefinition;
use crate::scripts::remote::{heredoc, EXEC_BOUNDARY};
use crate::types::DeploymentType;

/// Mount point of the instance's host directory inside the container
pub const HOST_DIR_MOUNT: &str = "/mnt";

/// Docker payload of a deployment (`deployment.value`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub image: String,
    pub tag: String,
    /// Container port ➔ host port
    #[serde(default)]
    pub ports: BTreeMap<String, PortNumber>,
    /// Defaults to the container name
    #[serde(default)]
    pub hostname: Option<String>,
}

/// A port written either as a number or a string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortNumber {
    Number(u16),
    Text(String),
}

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl ContainerSpec {
    /// Reads the docker payload of an instance's deployment
    pub fn from_instance(instance: &InstanceDefinition) -> Result<Self> {
        let spec: Self = serde_json::from_value(instance.deployment.value.clone()).map_err(|e| {
            StageScriptError::invalid_argument(format!(
                "malformed docker deployment for '{}': {}",
                instance.uuid, e
            ))
        })?;
        if spec.image.trim().is_empty() || spec.tag.trim().is_empty() {
            return Err(StageScriptError::invalid_argument(format!(
                "docker deployment for '{}' needs an image and a tag",
                instance.uuid
            )));
        }
        Ok(spec)
    }

    /// `image:tag`
    pub fn reference(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }
}

/// Backend driving containers through the docker CLI
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerBackend;

impl DeploymentBackend for DockerBackend {
    fn deployment_type(&self) -> DeploymentType {
        DeploymentType::Docker
    }

    fn existence_branch(
        &self,
        name: &str,
        then_cmd: Option<&str>,
        else_cmd: Option<&str>,
    ) -> String {
        let or_noop = |cmd: Option<&str>| match cmd {
            Some(c) if !c.is_empty() => {
                let mut c = c.to_string();
                if !c.ends_with('\n') {
                    c.push('\n');
                }
                c
            }
            _ => "echo\n".to_string(),
        };

        let mut script = String::new();
        script.push_str("set -xe\n");
        script.push_str(&format!(
            "container=\\$(docker ps -a --filter name={} --format {{{{.Names}}}})\n",
            name
        ));
        script.push_str(&format!("if [ \"\\$container\" == \"{}\" ]\n", name));
        script.push_str("then ");
        script.push_str(&or_noop(then_cmd));
        script.push_str("else ");
        script.push_str(&or_noop(else_cmd));
        script.push_str("fi\n");
        script
    }

    fn restart(&self, name: &str) -> String {
        let script = format!("set -xe\ndocker restart {}\n", name);
        self.existence_branch(name, Some(&script), None)
    }

    fn remove(&self, name: &str) -> String {
        let script = format!("set -xe\ndocker stop {0}\ndocker rm -v {0}\n", name);
        self.existence_branch(name, Some(&script), None)
    }

    fn run(&self, name: &str, instance: &InstanceDefinition) -> Result<String> {
        let spec = ContainerSpec::from_instance(instance)?;
        let host_dir = instance.deployment.host_dir.trim();
        if host_dir.is_empty() {
            return Err(StageScriptError::invalid_argument(format!(
                "deployment of '{}' has no host directory",
                instance.uuid
            )));
        }

        let mut args: Vec<String> = vec![
            "docker run -dit".to_string(),
            "--restart unless-stopped".to_string(),
        ];
        for (container_port, host_port) in &spec.ports {
            args.push(format!("--publish {}:{}", host_port, container_port));
        }
        args.push(format!("--label type={}", instance.kind));
        args.push(format!("--label group={}", instance.group));
        args.push(format!("--name {}", name));
        args.push(format!(
            "--hostname {}",
            spec.hostname.as_deref().unwrap_or(name)
        ));
        args.push(format!(
            "--mount type=bind,source={},target={}",
            host_dir, HOST_DIR_MOUNT
        ));
        args.push(spec.reference());

        Ok(format!("set -xe\n{}\n", args.join(" ")))
    }

    fn execute(&self, name: &str, command: &str) -> String {
        let invocation = format!("docker exec -i {} /bin/bash -s", name);
        let body = format!("set -xe\n{}", command);

        let mut script = String::new();
        script.push_str("set -xe\n");
        script.push_str(&heredoc(&invocation, &body, EXEC_BOUNDARY));
        script
    }

    fn copy(&self, name: &str, source: &str, destination: &str, sudo: bool) -> String {
        let mut script = String::new();
        if sudo {
            script.push_str("sudo ");
        }
        script.push_str(&format!("docker cp {} {}:{}\n", source, name, destination));
        script
    }
}
