//! Path helpers shared by the transfer and folder builders.

use crate::error::{Result, StageScriptError};
use crate::model::SshHost;

/// Adds or strips the trailing slash of a path.
///
/// | Path   | `want_slash`  | Result |
/// |--------|---------------|--------|
/// | `foo`  | `Some(true)`  | `foo/` |
/// | `foo/` | `Some(true)`  | `foo/` |
/// | `foo/` | `Some(false)` | `foo`  |
/// | `foo`  | `Some(false)` | `foo`  |
/// | any    | `None`        | unchanged |
pub fn normalize_trailing_slash(path: &str, want_slash: Option<bool>) -> String {
    match want_slash {
        None => path.to_string(),
        Some(true) => format!("{}/", path.trim_end_matches('/')),
        Some(false) => path.trim_end_matches('/').to_string(),
    }
}

/// Parses a textual slash flag: empty means "leave the path alone".
pub fn parse_slash_flag(flag: &str) -> Result<Option<bool>> {
    match flag.trim() {
        "" => Ok(None),
        "true" => Ok(Some(true)),
        "false" => Ok(Some(false)),
        other => Err(StageScriptError::invalid_argument(format!(
            "boolean expected: {}",
            other
        ))),
    }
}

/// Prefixes `user@ip:` when a complete SSH descriptor is given, eg. `/tmp` ➔ `cdagent@10.99.0.4:/tmp`
pub fn to_remote_path(ssh: Option<&SshHost>, path: &str) -> String {
    match ssh {
        Some(ssh) if ssh.is_complete() => format!("{}:{}", ssh.destination(), path),
        _ => path.to_string(),
    }
}
