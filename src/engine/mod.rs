//! Engine modules: the part that decides what a stage's script contains.
//!
//! The engine sits between the instance definition (what is deployed) and the
//! stage driver (which writes the script). It produces ordered fragment lists
//! and never performs I/O.

pub mod selection;
pub mod stage_body;

pub use selection::{compute_additional_scripts, select_scripts, ComputedScript};
pub use stage_body::stage_body;
