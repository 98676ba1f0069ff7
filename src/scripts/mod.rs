//! Shell text builders.
//!
//! Pure functions producing newline-terminated shell text. Nothing here runs
//! a command or touches the filesystem; remote effects only exist as text.

pub mod folders;
pub mod paths;
pub mod remote;
pub mod transfer;

pub use folders::{init_folder, link_components, link_folder};
pub use paths::{normalize_trailing_slash, parse_slash_flag, to_remote_path};
pub use remote::{allocate_boundary, heredoc, wrap_remote, EXEC_BOUNDARY, REMOTE_BOUNDARY};
pub use transfer::{fetch_artifact, rsync, DEFAULT_RSYNC_ARGS};
