//! Built-in work of each pipeline stage
//!
//! Before auxiliary scripts are merged in, every stage contributes its own
//! fragments, gated by the change set:
//!
//! | Stage               | When                          | Fragments |
//! |---------------------|-------------------------------|-----------|
//! | pre-host-prepare    | artifacts changed or creation | reset local artifacts dir, fetch each artifact |
//! | host-prepare        | always                        | remote init of the host dir |
//! |                     | artifacts changed or creation | rsync artifacts to the host |
//! | start-instance      | deployment changed or creation| remote remove, remote run |
//! | post-start          | artifacts/data changed or creation | remote link of mounted folders in the container |
//! | startup-monitoring  | never                         | none |

use tracing::debug;

use crate::backend::resolve_backend;
use crate::config::Config;
use crate::error::Result;
use crate::model::{ChangeSet, InstanceDefinition, SshHost};
use crate::scripts::folders::{init_folder, link_components};
use crate::scripts::paths::parse_slash_flag;
use crate::scripts::remote::wrap_remote;
use crate::scripts::transfer::{fetch_artifact, rsync};
use crate::stage::Stage;
use crate::types::{ChangeCategory, LinkKind};

/// Owner expression for folders created on the pipeline agent itself
const LOCAL_USER: &str = "$(whoami)";

/// Fragments a stage contributes on its own
pub fn stage_body(
    config: &Config,
    instance: &InstanceDefinition,
    stage: Stage,
    changes: &ChangeSet,
) -> Result<Vec<String>> {
    let fragments = match stage {
        Stage::PreHostPrepare => pre_host_prepare(config, instance, changes)?,
        Stage::HostPrepare => host_prepare(config, instance, changes)?,
        Stage::StartInstance => start_instance(instance, changes)?,
        Stage::PostStart => post_start(config, instance, changes)?,
        Stage::StartupMonitoring => Vec::new(),
    };
    debug!("Stage {} contributes {} fragments", stage, fragments.len());
    Ok(fragments)
}

fn touches(changes: &ChangeSet, category: ChangeCategory) -> bool {
    changes.is_creation() || changes.contains(category)
}

fn pre_host_prepare(
    config: &Config,
    instance: &InstanceDefinition,
    changes: &ChangeSet,
) -> Result<Vec<String>> {
    if !touches(changes, ChangeCategory::Artifacts) || instance.artifacts.is_empty() {
        return Ok(Vec::new());
    }

    let dir = config.artifacts_dir().display().to_string();
    let mut script = init_folder(&dir, LOCAL_USER, true);
    for artifact in &instance.artifacts {
        script.push_str(&fetch_artifact(artifact, &dir)?);
    }
    Ok(vec![script])
}

fn host_prepare(
    config: &Config,
    instance: &InstanceDefinition,
    changes: &ChangeSet,
) -> Result<Vec<String>> {
    let ssh = instance.deployment.host.ssh();
    let host_dir = instance.deployment.host_dir.as_str();

    let mut fragments = vec![wrap_remote(ssh, &init_folder(host_dir, &ssh.user, false))?];

    if touches(changes, ChangeCategory::Artifacts) && !instance.artifacts.is_empty() {
        let upload = SshHost {
            remote_src: false,
            remote_dst: true,
            ..ssh.clone()
        };
        let src = config.artifacts_dir().display().to_string();
        let dst = format!("{}/{}", host_dir.trim_end_matches('/'), config.artifacts_dir_name);
        let slash = parse_slash_flag(&config.artifacts_sync_slash)?;
        fragments.push(rsync(Some(&upload), &src, &dst, slash, slash, None, false)?);
    }
    Ok(fragments)
}

fn start_instance(instance: &InstanceDefinition, changes: &ChangeSet) -> Result<Vec<String>> {
    if !touches(changes, ChangeCategory::Deployment) {
        return Ok(Vec::new());
    }

    let backend = resolve_backend(&instance.deployment.kind)?;
    let ssh = instance.deployment.host.ssh();
    Ok(vec![
        wrap_remote(ssh, &backend.remove(&instance.uuid))?,
        wrap_remote(ssh, &backend.run(&instance.uuid, instance)?)?,
    ])
}

fn post_start(
    config: &Config,
    instance: &InstanceDefinition,
    changes: &ChangeSet,
) -> Result<Vec<String>> {
    let components: Vec<ChangeCategory> = [ChangeCategory::Artifacts, ChangeCategory::Data]
        .into_iter()
        .filter(|c| touches(changes, *c))
        .collect();

    let has_links = instance.links.iter().any(|link| {
        components.iter().any(|c| match c {
            ChangeCategory::Artifacts => link.kind == LinkKind::Artifact,
            ChangeCategory::Data => link.kind == LinkKind::Data,
            ChangeCategory::Deployment => false,
        })
    });
    if !has_links {
        return Ok(Vec::new());
    }

    let backend = resolve_backend(&instance.deployment.kind)?;
    let links = link_components(&components, &instance.links, &config.link_owner)?;
    let in_target = backend.execute(&instance.uuid, &links);
    Ok(vec![wrap_remote(instance.deployment.host.ssh(), &in_target)?])
}
