//! File transfer builders: `rsync` and artifact fetching.

use crate::error::{Result, StageScriptError};
use crate::model::{Artifact, MavenCoordinates, SshHost};
use crate::scripts::paths::{normalize_trailing_slash, to_remote_path};
use crate::types::ArtifactKind;

/// Default `rsync` flags
pub const DEFAULT_RSYNC_ARGS: &str = "-avz";

/// `rsync` source to destination.
///
/// Each side is turned into a remote path when the descriptor's
/// `remote_src`/`remote_dst` flag is set. The `-e 'ssh -p <port>'` override is
/// emitted once, even when both sides are remote.
///
/// # Errors
///
/// `InvalidArgument` when a path is empty, or when a side is remote and the
/// descriptor fails `SshHost::check`.
pub fn rsync(
    ssh: Option<&SshHost>,
    src: &str,
    dst: &str,
    slash_src: Option<bool>,
    slash_dst: Option<bool>,
    args: Option<&str>,
    sudo: bool,
) -> Result<String> {
    if src.trim().is_empty() || dst.trim().is_empty() {
        return Err(StageScriptError::invalid_argument(format!(
            "rsync needs a source and a destination (got '{}' and '{}')",
            src, dst
        )));
    }

    let mut src_path = normalize_trailing_slash(src, slash_src);
    let mut dst_path = normalize_trailing_slash(dst, slash_dst);
    let args = args.filter(|a| !a.trim().is_empty()).unwrap_or(DEFAULT_RSYNC_ARGS);

    let mut ssh_port = String::new();
    if let Some(ssh) = ssh.filter(|s| !s.is_empty()) {
        if ssh.remote_src || ssh.remote_dst {
            ssh.check()?;
        }
        if ssh.remote_src {
            src_path = to_remote_path(Some(ssh), &src_path);
            ssh_port = format!(" -e 'ssh -p {}'", ssh.port);
        }
        if ssh.remote_dst {
            dst_path = to_remote_path(Some(ssh), &dst_path);
            ssh_port = format!(" -e 'ssh -p {}'", ssh.port);
        }
    }

    let mut script = String::new();
    if sudo {
        script.push_str("sudo ");
    }
    script.push_str(&format!("rsync {}{} {} {}\n", args, ssh_port, src_path, dst_path));
    Ok(script)
}

/// Fetches an artifact into `dest_path`, unpacks it and removes the archive.
///
/// Only maven artifacts are fetched; other kinds yield an empty script.
///
/// # Errors
///
/// `InvalidArgument` when a maven artifact's coordinates are incomplete.
pub fn fetch_artifact(artifact: &Artifact, dest_path: &str) -> Result<String> {
    match &artifact.kind {
        ArtifactKind::Maven => {
            let coords: MavenCoordinates = serde_json::from_value(artifact.value.clone())
                .map_err(|e| {
                    StageScriptError::invalid_argument(format!(
                        "malformed maven artifact: {}",
                        e
                    ))
                })?;
            Ok(fetch_maven(&coords, dest_path))
        }
        ArtifactKind::Unsupported(_) => Ok(String::new()),
    }
}

fn fetch_maven(coords: &MavenCoordinates, dest_path: &str) -> String {
    let file_name = coords.file_name();

    let mut script = String::new();
    script.push_str(&format!(
        "mvn dependency:copy -Dartifact={}:{}:{}:{} -DoutputDirectory={}\n",
        coords.group_id, coords.artifact_id, coords.version, coords.packaging, dest_path
    ));
    script.push_str(&format!("unzip {0}/{1} -d {0}/\n", dest_path, file_name));
    script.push_str(&format!("rm {}/{}\n", dest_path, file_name));
    script
}
