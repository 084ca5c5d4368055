//! Dispatch eligibility predicates.

use std::collections::HashMap;

use conveyor_core::{Stage, Status};

/// Branch whose builds are serialized per repository.
pub(crate) const BRANCH_PRECEDENCE: &str = "master";

/// Label maps match only on exact set equality.
pub(crate) fn labels_equal(a: &HashMap<String, String>, b: &HashMap<String, String>) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().all(|(k, v)| b.get(k) == Some(v))
}

/// Whether the stage's per-name concurrency ceiling leaves room for it.
/// The oldest `limit` same-name stages in the repository are the eligible
/// ones; a limit of zero disables the cap.
pub(crate) fn within_limits(stage: &Stage, siblings: &[Stage]) -> bool {
    if stage.limit == 0 {
        return true;
    }
    let older = siblings
        .iter()
        .filter(|sibling| {
            sibling.repo_id == stage.repo_id
                && sibling.id != stage.id
                && sibling.name == stage.name
                && sibling.id < stage.id
        })
        .count() as i64;
    older < stage.limit
}

/// Whether branch precedence allows the stage to run. Two incomplete
/// builds of the precedence branch in the same repository are serialized:
/// only the older build's stages are eligible until it completes.
pub(crate) fn within_branch_limits(stage: &Stage, siblings: &[Stage]) -> bool {
    let Some(build) = stage.build.as_ref() else {
        return true;
    };
    // A stage whose build already started keeps its slot.
    if build.status == Status::Running {
        return true;
    }
    for sibling in siblings {
        if sibling.build_id == stage.build_id || sibling.repo_id != stage.repo_id {
            continue;
        }
        let Some(other) = sibling.build.as_ref() else {
            continue;
        };
        if other.source == BRANCH_PRECEDENCE && build.source == BRANCH_PRECEDENCE {
            return stage.build_id < sibling.build_id;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::Build;
    use proptest::prelude::*;

    fn stage(id: i64, repo_id: i64, name: &str, limit: i64) -> Stage {
        Stage {
            id,
            repo_id,
            build_id: id,
            name: name.to_string(),
            limit,
            ..Stage::default()
        }
    }

    fn with_build(mut stage: Stage, build_id: i64, source: &str, status: Status) -> Stage {
        stage.build_id = build_id;
        stage.build = Some(Build {
            id: build_id,
            repo_id: stage.repo_id,
            source: source.to_string(),
            status,
            ..Build::default()
        });
        stage
    }

    #[test]
    fn test_labels_equal_exact_match_only() {
        let a = HashMap::from([("region".to_string(), "eu".to_string())]);
        let b = HashMap::from([("region".to_string(), "eu".to_string())]);
        let c = HashMap::from([
            ("region".to_string(), "eu".to_string()),
            ("gpu".to_string(), "yes".to_string()),
        ]);
        assert!(labels_equal(&a, &b));
        assert!(!labels_equal(&a, &c));
        assert!(!labels_equal(&c, &a));
        assert!(labels_equal(&HashMap::new(), &HashMap::new()));
    }

    #[test]
    fn test_limit_zero_is_uncapped() {
        let siblings: Vec<Stage> = (1..=10).map(|id| stage(id, 1, "build", 0)).collect();
        for s in &siblings {
            assert!(within_limits(s, &siblings));
        }
    }

    #[test]
    fn test_limit_admits_oldest_stages_first() {
        let siblings: Vec<Stage> = (1..=3).map(|id| stage(id, 1, "build", 2)).collect();
        assert!(within_limits(&siblings[0], &siblings));
        assert!(within_limits(&siblings[1], &siblings));
        assert!(!within_limits(&siblings[2], &siblings));
    }

    #[test]
    fn test_limit_ignores_other_repos_and_names() {
        let mut siblings: Vec<Stage> = (1..=3).map(|id| stage(id, 1, "build", 1)).collect();
        siblings.push(stage(4, 2, "build", 1));
        siblings.push(stage(5, 1, "test", 1));
        assert!(within_limits(&siblings[3], &siblings));
        assert!(within_limits(&siblings[4], &siblings));
    }

    #[test]
    fn test_branch_precedence_serializes_master_builds() {
        let older = with_build(stage(1, 1, "build", 0), 10, "master", Status::Pending);
        let newer = with_build(stage(2, 1, "build", 0), 11, "master", Status::Pending);
        let siblings = vec![older.clone(), newer.clone()];
        assert!(within_branch_limits(&older, &siblings));
        assert!(!within_branch_limits(&newer, &siblings));
    }

    #[test]
    fn test_branch_precedence_ignores_feature_branches() {
        let master = with_build(stage(1, 1, "build", 0), 10, "master", Status::Pending);
        let feature = with_build(stage(2, 1, "build", 0), 11, "feature", Status::Pending);
        let siblings = vec![master.clone(), feature.clone()];
        assert!(within_branch_limits(&master, &siblings));
        assert!(within_branch_limits(&feature, &siblings));
    }

    #[test]
    fn test_branch_precedence_running_build_keeps_slot() {
        let running = with_build(stage(2, 1, "build", 0), 11, "master", Status::Running);
        let older = with_build(stage(1, 1, "build", 0), 10, "master", Status::Pending);
        let siblings = vec![older, running.clone()];
        assert!(within_branch_limits(&running, &siblings));
    }

    proptest! {
        #[test]
        fn prop_label_equality_is_symmetric_and_reflexive(
            a in proptest::collection::hash_map("[a-z]{1,4}", "[a-z]{1,4}", 0..4),
            b in proptest::collection::hash_map("[a-z]{1,4}", "[a-z]{1,4}", 0..4),
        ) {
            prop_assert_eq!(labels_equal(&a, &b), labels_equal(&b, &a));
            prop_assert!(labels_equal(&a, &a.clone()));
        }
    }
}
