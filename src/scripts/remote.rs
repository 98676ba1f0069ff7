//! Remote execution through SSH heredocs.
//!
//! Wrappers nest: a fragment is executed over SSH and, inside that, piped to
//! a shell in the container. Each nesting level has its own base token, and
//! a token is only used if no line of the wrapped body already equals it.

use crate::error::Result;
use crate::model::SshHost;

/// Base boundary of the outer SSH heredoc
pub const REMOTE_BOUNDARY: &str = "STAGESCRIPT_REMOTE_EOF";

/// Base boundary of heredocs nested inside a remote script (container exec)
pub const EXEC_BOUNDARY: &str = "STAGESCRIPT_EXEC_EOF";

/// Picks a heredoc boundary that does not terminate `body` early.
///
/// Returns `base` unless a line of `body` equals it, in which case `base_1`,
/// `base_2`, ... are tried in order. The result only depends on the inputs.
pub fn allocate_boundary(base: &str, body: &str) -> String {
    let taken = |token: &str| body.lines().any(|line| line == token);

    if !taken(base) {
        return base.to_string();
    }
    let mut n = 1usize;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Feeds `body` to `command` through a heredoc whose boundary derives from `base`.
pub fn heredoc(command: &str, body: &str, base: &str) -> String {
    let mut body = body.to_string();
    if !body.ends_with('\n') {
        body.push('\n');
    }
    let boundary = allocate_boundary(base, &body);

    let mut script = String::new();
    script.push_str(command);
    script.push_str(" <<");
    script.push_str(&boundary);
    script.push('\n');
    script.push_str(&body);
    script.push_str(&boundary);
    script.push('\n');
    script
}

/// Turns a script into one executed on the SSH host.
///
/// ```text
/// ssh -T cdagent@10.99.0.4 -p 22 <<STAGESCRIPT_REMOTE_EOF
/// <script>
/// STAGESCRIPT_REMOTE_EOF
/// ```
///
/// # Errors
///
/// `InvalidArgument` when the descriptor has no user, no ip or no usable port.
pub fn wrap_remote(ssh: &SshHost, script: &str) -> Result<String> {
    ssh.check()?;
    let command = format!("ssh -T {} -p {}", ssh.destination(), ssh.port);
    Ok(heredoc(&command, script, REMOTE_BOUNDARY))
}
