//! Auxiliary Script Selection & Ordering
//!
//! Decides which of an instance's auxiliary scripts run at the current stage
//! and merges their fragments into a script body.
//!
//! # Rules
//!
//! | Step      | Rule |
//! |-----------|------|
//! | Select    | `conditions ∩ changes ≠ ∅` AND `executionStage == stage` |
//! | Render    | shell ➔ backend `execute`, then `wrap_remote`; python/sql ➔ nothing |
//! | Place     | `atStageStart` ➔ inserted at index 0 when processed; else appended |
//! | Restart   | OR over the `restart` flags of every selected script |
//!
//! Scripts are processed in definition order, so of two at-start scripts the
//! one defined last ends up first.
//!
//! # Design
//!
//! - **Pure logic**: same inputs, same body, same flag
//! - **Lazy backend**: the deployment backend is only resolved when a shell
//!   script is rendered, so an unsupported type only fails stages that need it

use tracing::{debug, warn};

use crate::backend::resolve_backend;
use crate::error::Result;
use crate::model::{AuxiliaryScript, ChangeSet, InstanceDefinition};
use crate::scripts::remote::wrap_remote;
use crate::stage::Stage;

/// Script body after the auxiliary scripts were merged in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedScript {
    pub body: Vec<String>,
    pub restart_needed: bool,
}

/// Scripts eligible at `stage` for `changes`, in definition order
pub fn select_scripts<'a>(
    scripts: &'a [AuxiliaryScript],
    stage: Stage,
    changes: &ChangeSet,
) -> Vec<&'a AuxiliaryScript> {
    scripts
        .iter()
        .filter(|s| changes.intersects(&s.conditions) && s.execution_stage == Some(stage))
        .collect()
}

/// Merges the auxiliary scripts selected for `stage` into `body`.
///
/// # Errors
///
/// - `UnsupportedBackend` when a shell script is selected and the
///   deployment type has no backend
/// - `InvalidArgument` when the host descriptor cannot be used for SSH
pub fn compute_additional_scripts(
    mut body: Vec<String>,
    instance: &InstanceDefinition,
    stage: Stage,
    changes: &ChangeSet,
) -> Result<ComputedScript> {
    let selected = select_scripts(&instance.scripts, stage, changes);
    debug!(
        "{} of {} auxiliary scripts selected for stage {}",
        selected.len(),
        instance.scripts.len(),
        stage
    );

    let ssh = instance.deployment.host.ssh();
    let mut restart_needed = false;

    for script in selected {
        let fragment = if script.kind.is_rendered() {
            let backend = resolve_backend(&instance.deployment.kind)?;
            let in_target = backend.execute(&instance.uuid, &script.value);
            Some(wrap_remote(ssh, &in_target)?)
        } else {
            warn!(
                "Skipping {} auxiliary script at stage {}: not rendered yet",
                script.kind, stage
            );
            None
        };

        if let Some(fragment) = fragment {
            if script.at_stage_start {
                body.insert(0, fragment);
            } else {
                body.push(fragment);
            }
        }

        restart_needed |= script.restart;
    }

    Ok(ComputedScript {
        body,
        restart_needed,
    })
}
