//! Folder builders: creation, symlinks with backups, component links.

use rand::Rng;

use crate::error::{Result, StageScriptError};
use crate::model::Link;
use crate::scripts::transfer::rsync;
use crate::types::{ChangeCategory, LinkKind};

/// Length of the random suffix appended to backup folders
const BACKUP_SUFFIX_LEN: usize = 5;

/// Creates `path` owned by `user`, optionally emptying it.
pub fn init_folder(path: &str, user: &str, wipe: bool) -> String {
    let mut script = String::new();
    script.push_str(&format!("sudo mkdir -p {}\n", path));
    script.push_str(&format!("sudo chown -R {0}:{0} {1}\n", user, path));
    if wipe {
        script.push_str(&format!("rm -rf {}/*\n", path));
    }
    script
}

/// Symlinks `source` to `target`.
///
/// With `remove_if_exists`, an existing `target` is first rsync'ed to
/// `<target>_<suffix>.backup` and removed. With `create`, `source` is created
/// as a directory when missing. The link and an ownership fix on `source` are
/// always emitted.
pub fn link_folder(
    source: &str,
    target: &str,
    remove_if_exists: bool,
    create: bool,
    owner: &str,
) -> Result<String> {
    if source.trim().is_empty() || target.trim().is_empty() {
        return Err(StageScriptError::invalid_argument(format!(
            "link needs a source and a target (got '{}' and '{}')",
            source, target
        )));
    }

    let mut script = String::new();
    if remove_if_exists {
        let backup = format!("{}_{}.backup", target, backup_suffix());
        script.push_str(&format!("if [ -e {} ]; then\n", target));
        script.push_str(&format!("echo \"'{}' exists. Backing it up...\"\n", target));
        script.push_str(&rsync(None, target, &backup, None, None, None, false)?);
        script.push_str(&format!("rm -rf {}\n", target));
        script.push_str("fi\n");
    }
    if create {
        script.push_str(&format!("if [ ! -e {} ]; then\n", source));
        script.push_str(&format!("mkdir -p {}\n", source));
        script.push_str("fi\n");
    }

    script.push_str(&format!("echo \"MountPoint: {}, Target: {}\"\n", source, target));
    script.push_str(&format!("ln -s {} {}\n", source, target));
    script.push_str(&format!("chown -R {0}:{0} {1}\n", owner, source));
    Ok(script)
}

/// Links the mounted folders of each requested component.
///
/// Artifact links back up an existing target; data links additionally create
/// a missing source. Categories without links (deployment) are ignored.
pub fn link_components(
    components: &[ChangeCategory],
    links: &[Link],
    owner: &str,
) -> Result<String> {
    let mut script = String::new();
    if !components.is_empty() {
        script.push_str("# Link mounted folder...\n\n");
    }

    for component in components {
        let (kind, create) = match component {
            ChangeCategory::Artifacts => (LinkKind::Artifact, false),
            ChangeCategory::Data => (LinkKind::Data, true),
            ChangeCategory::Deployment => continue,
        };
        for link in links.iter().filter(|l| l.kind == kind) {
            script.push_str(&format!("# '{}' component:\n", link.component));
            script.push_str(&link_folder(&link.source, &link.target, true, create, owner)?);
            script.push('\n');
        }
    }
    Ok(script)
}

/// Last characters of a random base-36 number
fn backup_suffix() -> String {
    let value: u64 = rand::thread_rng().r#gen();
    let digits = to_base36(value);
    let start = digits.len().saturating_sub(BACKUP_SUFFIX_LEN);
    format!("{:0>width$}", &digits[start..], width = BACKUP_SUFFIX_LEN)
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
