//! Property-Based Tests for stagescript
//!
//! Uses proptest for testing invariants and edge cases
//!
//! These tests verify:
//! - Enum string round-trips (parse → to_string → parse)
//! - Path and transfer builder invariants
//! - Auxiliary script selection, ordering and restart rules

use proptest::prelude::*;
use serde_json::json;

use stagescript::model::{AuxiliaryScript, ChangeSet, Deployment, Host, InstanceDefinition, SshHost};
use stagescript::scripts::{normalize_trailing_slash, rsync, wrap_remote, REMOTE_BOUNDARY};
use stagescript::types::{ChangeCategory, ScriptKind};
use stagescript::{compute_additional_scripts, select_scripts, Stage};

// =============================================================================
// Strategies
// =============================================================================

fn stage_strategy() -> impl Strategy<Value = Stage> {
    prop::sample::select(Stage::all_stages().to_vec())
}

fn category_strategy() -> impl Strategy<Value = ChangeCategory> {
    prop_oneof![
        Just(ChangeCategory::Artifacts),
        Just(ChangeCategory::Deployment),
        Just(ChangeCategory::Data),
    ]
}

fn categories_strategy() -> impl Strategy<Value = Vec<ChangeCategory>> {
    prop::collection::vec(category_strategy(), 0..4)
}

fn kind_strategy() -> impl Strategy<Value = ScriptKind> {
    prop_oneof![
        3 => Just(ScriptKind::Shell),
        1 => Just(ScriptKind::Python),
        1 => Just(ScriptKind::Sql),
    ]
}

/// (conditions, stage or none, atStageStart, restart, type); the value is filled in
/// from the position so every script is identifiable in the output
fn scripts_strategy() -> impl Strategy<Value = Vec<AuxiliaryScript>> {
    prop::collection::vec(
        (
            categories_strategy(),
            prop::option::weighted(0.9, stage_strategy()),
            any::<bool>(),
            any::<bool>(),
            kind_strategy(),
        ),
        0..8,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(
                |(i, (conditions, execution_stage, at_stage_start, restart, kind))| {
                    AuxiliaryScript {
                        kind,
                        value: format!("echo script-{}", i),
                        conditions,
                        execution_stage,
                        at_stage_start,
                        restart,
                    }
                },
            )
            .collect()
    })
}

fn instance(scripts: Vec<AuxiliaryScript>) -> InstanceDefinition {
    InstanceDefinition {
        uuid: "inst-1".to_string(),
        kind: "dev".to_string(),
        group: "tlc".to_string(),
        deployment: Deployment {
            kind: "docker".to_string(),
            host: Host::Ssh(SshHost::new("cdagent", "10.99.0.4", "22")),
            host_dir: "/var/inst-1".to_string(),
            value: json!({ "image": "app", "tag": "latest" }),
        },
        scripts,
        artifacts: vec![],
        links: vec![],
    }
}

/// Path-like strings, possibly with trailing slashes
fn path_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9_./-]{1,16}/{0,3}"
}

// =============================================================================
// Enum Property Tests
// =============================================================================

proptest! {
    /// Stage: to_string → parse round-trip is identity
    #[test]
    fn stage_roundtrip(stage in stage_strategy()) {
        let s = stage.to_string();
        let parsed: Stage = s.parse().expect("Should parse");
        prop_assert_eq!(stage, parsed);
    }

    /// Stage: order is the position in the pipeline
    #[test]
    fn stage_order_matches_position(stage in stage_strategy()) {
        let position = Stage::all_stages().iter().position(|s| *s == stage);
        prop_assert_eq!(position, Some(stage.order() as usize));
    }

    /// ChangeCategory: Display output is non-empty lowercase and parses back
    #[test]
    fn change_category_roundtrip(category in category_strategy()) {
        let s = category.to_string();
        prop_assert!(!s.is_empty());
        prop_assert_eq!(s.to_lowercase(), s.clone());
        let parsed: ChangeCategory = s.parse().expect("Should parse");
        prop_assert_eq!(category, parsed);
    }
}

// =============================================================================
// Path Builder Property Tests
// =============================================================================

proptest! {
    /// normalize_trailing_slash: applying it twice equals applying it once
    #[test]
    fn trailing_slash_idempotent(
        path in path_strategy(),
        flag in prop_oneof![Just(None), Just(Some(true)), Just(Some(false))],
    ) {
        let once = normalize_trailing_slash(&path, flag);
        let twice = normalize_trailing_slash(&once, flag);
        prop_assert_eq!(once, twice);
    }

    /// normalize_trailing_slash: the flag decides the last character
    #[test]
    fn trailing_slash_respects_flag(path in "[a-z0-9_.-]{1,16}/{0,3}") {
        prop_assert!(normalize_trailing_slash(&path, Some(true)).ends_with('/'));
        prop_assert!(!normalize_trailing_slash(&path, Some(true)).ends_with("//"));
        prop_assert!(!normalize_trailing_slash(&path, Some(false)).ends_with('/'));
        prop_assert_eq!(normalize_trailing_slash(&path, None), path);
    }

    /// rsync: a local transfer is one line with normalized paths
    #[test]
    fn rsync_local_normalizes_both_sides(
        src in "[a-z]{1,8}/?",
        dst in "[a-z]{1,8}/?",
        sudo in any::<bool>(),
    ) {
        let script = rsync(None, &src, &dst, Some(true), Some(false), None, sudo)
            .expect("valid paths");
        let expected = format!(
            "{}rsync -avz {}/ {}\n",
            if sudo { "sudo " } else { "" },
            src.trim_end_matches('/'),
            dst.trim_end_matches('/'),
        );
        prop_assert_eq!(script.clone(), expected);
        prop_assert_eq!(script.lines().count(), 1);
    }

    /// rsync: the ssh port override appears at most once
    #[test]
    fn rsync_port_override_once(remote_src in any::<bool>(), remote_dst in any::<bool>()) {
        let ssh = SshHost {
            remote_src,
            remote_dst,
            ..SshHost::new("cdagent", "10.99.0.4", "2222")
        };
        let script = rsync(Some(&ssh), "/a", "/b", None, None, None, false).expect("valid paths");
        let expected = if remote_src || remote_dst { 1 } else { 0 };
        prop_assert_eq!(script.matches("-e 'ssh -p 2222'").count(), expected);
    }
}

// =============================================================================
// Remote Wrapper Property Tests
// =============================================================================

proptest! {
    /// wrap_remote: the body is newline-terminated and the boundary closes the text
    #[test]
    fn wrap_remote_closes_with_boundary(body in "[a-z ;]{0,20}(\n[a-z ;]{0,20}){0,3}\n?") {
        let ssh = SshHost::new("cdagent", "10.99.0.4", "22");
        let wrapped = wrap_remote(&ssh, &body).expect("valid host");

        let closing = format!("\n{}\n", REMOTE_BOUNDARY);
        prop_assert!(wrapped.ends_with(&closing));

        let header = format!("ssh -T cdagent@10.99.0.4 -p 22 <<{}\n", REMOTE_BOUNDARY);
        prop_assert!(wrapped.starts_with(&header));

        let inner = &wrapped[header.len()..wrapped.len() - REMOTE_BOUNDARY.len() - 1];
        prop_assert!(inner.ends_with('\n'));
        prop_assert_eq!(inner.trim_end_matches('\n'), body.trim_end_matches('\n'));
    }
}

// =============================================================================
// Selection & Ordering Property Tests
// =============================================================================

proptest! {
    /// Selection returns exactly the matching scripts, in definition order, once each
    #[test]
    fn selection_is_exact(
        scripts in scripts_strategy(),
        changes in categories_strategy(),
        stage in stage_strategy(),
    ) {
        let changes = ChangeSet::of(changes);
        let selected = select_scripts(&scripts, stage, &changes);

        let expected: Vec<&AuxiliaryScript> = scripts
            .iter()
            .filter(|s| {
                s.execution_stage == Some(stage)
                    && s.conditions.iter().any(|c| changes.contains(*c))
            })
            .collect();
        prop_assert_eq!(selected, expected);
    }

    /// Restart is the OR of the selected scripts' flags, whatever their type
    #[test]
    fn restart_is_or_of_selected(
        scripts in scripts_strategy(),
        changes in categories_strategy(),
        stage in stage_strategy(),
    ) {
        let changes = ChangeSet::of(changes);
        let expected = select_scripts(&scripts, stage, &changes).iter().any(|s| s.restart);

        let out = compute_additional_scripts(vec![], &instance(scripts), stage, &changes)
            .expect("docker backend");
        prop_assert_eq!(out.restart_needed, expected);
    }

    /// Adding a matching restart script never clears the flag
    #[test]
    fn restart_is_monotonic(
        scripts in scripts_strategy(),
        changes in prop::collection::vec(category_strategy(), 1..4),
        stage in stage_strategy(),
    ) {
        let mut more = scripts.clone();
        more.push(AuxiliaryScript {
            kind: ScriptKind::Python,
            value: "print('restart')".to_string(),
            conditions: changes.clone(),
            execution_stage: Some(stage),
            at_stage_start: false,
            restart: true,
        });
        let changes = ChangeSet::of(changes);

        let before = compute_additional_scripts(vec![], &instance(scripts), stage, &changes)
            .expect("docker backend");
        let after = compute_additional_scripts(vec![], &instance(more), stage, &changes)
            .expect("docker backend");
        prop_assert!(after.restart_needed);
        prop_assert!(after.restart_needed >= before.restart_needed);
    }

    /// Fragments follow the insert-at-start / append rule, one per shell script
    #[test]
    fn fragment_order_follows_placement(
        scripts in scripts_strategy(),
        changes in categories_strategy(),
        stage in stage_strategy(),
    ) {
        let changes = ChangeSet::of(changes);

        let mut expected: Vec<String> = vec!["set -e\n".to_string()];
        for script in select_scripts(&scripts, stage, &changes) {
            if !script.kind.is_rendered() {
                continue;
            }
            if script.at_stage_start {
                expected.insert(0, script.value.clone());
            } else {
                expected.push(script.value.clone());
            }
        }

        let out = compute_additional_scripts(
            vec!["set -e\n".to_string()],
            &instance(scripts),
            stage,
            &changes,
        )
        .expect("docker backend");

        prop_assert_eq!(out.body.len(), expected.len());
        for (fragment, marker) in out.body.iter().zip(&expected) {
            if marker == "set -e\n" {
                prop_assert_eq!(fragment, marker);
            } else {
                let line = format!("\n{}\n", marker);
                prop_assert!(fragment.contains(&line), "{:?} not in {:?}", marker, fragment);
            }
        }
    }

    /// Same inputs, same output
    #[test]
    fn selection_is_deterministic(
        scripts in scripts_strategy(),
        changes in categories_strategy(),
        stage in stage_strategy(),
    ) {
        let changes = ChangeSet::of(changes);
        let inst = instance(scripts);
        let first = compute_additional_scripts(vec![], &inst, stage, &changes).expect("docker backend");
        let second = compute_additional_scripts(vec![], &inst, stage, &changes).expect("docker backend");
        prop_assert_eq!(first, second);
    }
}
