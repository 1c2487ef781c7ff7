use crate::eligibility::{filter_rule, Eligibility, FilterContext, ReachableFiles};
use crate::error::{Result, SelectionError};
use crate::globs::FileGlobs;
use crate::ledger::{saturating_total, FileCounts, RuleMetadata, ViolationLedger};
use crate::options::{LimitKind, SelectionOptions};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

/// One rule considered for selection in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCandidate {
    pub rule_id: String,
    pub is_fixable: bool,
    pub original_files: BTreeSet<String>,
    pub original_violation_total: usize,
    pub eligible_files: BTreeSet<String>,
    pub eligible_violations: FileCounts,
    /// Eligible file count or violation total, per the limit kind
    pub eligible_count: usize,
}

impl RuleCandidate {
    pub fn eligible_violation_total(&self) -> usize {
        saturating_total(self.eligible_violations.values())
    }

    /// Whether filtering removed any of the rule's files.
    pub fn is_narrowed(&self) -> bool {
        self.eligible_files != self.original_files
    }
}

/// Turn the ledger into one candidate per eligible rule, ordered by rule id.
///
/// Absolute ledger paths under `root` are glob-matched relative to it.
/// `reachable` must be supplied when `options` has an active dependency scope.
pub fn aggregate(
    ledger: &ViolationLedger,
    metadata: &RuleMetadata,
    options: &SelectionOptions,
    limit_kind: LimitKind,
    root: Option<&Path>,
    reachable: Option<&ReachableFiles>,
) -> Result<Vec<RuleCandidate>> {
    if options.active_scope().is_some() && reachable.is_none() {
        return Err(SelectionError::ScopeNotResolved);
    }

    let mut globs = FileGlobs::compile(&options.exclude_file_globs, &options.include_file_globs)?;
    if let Some(root) = reachable.map(ReachableFiles::root).or(root) {
        globs = globs.relative_to(root);
    }
    let ctx = FilterContext {
        metadata,
        options,
        globs: &globs,
        reachable,
    };

    let mut candidates = Vec::new();
    for (rule_id, files) in ledger.by_rule() {
        let eligible_violations = match filter_rule(rule_id, &files, &ctx) {
            Eligibility::Eligible(eligible) => eligible,
            Eligibility::Ineligible(reason) => {
                log::debug!("Rule {rule_id} dropped: {reason:?}");
                continue;
            }
        };

        let eligible_count = match limit_kind {
            LimitKind::File => eligible_violations.len(),
            LimitKind::Violation => saturating_total(eligible_violations.values()),
        };
        candidates.push(RuleCandidate {
            rule_id: rule_id.to_string(),
            is_fixable: metadata.is_fixable(rule_id),
            original_files: files.keys().cloned().collect(),
            original_violation_total: saturating_total(files.values()),
            eligible_files: eligible_violations.keys().cloned().collect(),
            eligible_violations,
            eligible_count,
        });
    }

    log::debug!(
        "Aggregated {} candidate rules from {} files",
        candidates.len(),
        ledger.file_count()
    );
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DependencyScope;
    use paydown_graph::ScopeMode;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn ledger() -> ViolationLedger {
        ViolationLedger::from_json(
            r#"{
                "src/a.ts": {"semi": 3, "no-console": 1},
                "src/b.ts": {"semi": 2},
                "dist/out.js": {"semi": 7}
            }"#,
        )
        .unwrap()
    }

    fn lenient() -> SelectionOptions {
        SelectionOptions {
            only_auto_fixable: false,
            ..SelectionOptions::default()
        }
    }

    #[test]
    fn counts_follow_limit_kind() {
        let metadata = RuleMetadata::new().fixable("semi");
        let options = SelectionOptions {
            exclude_file_globs: vec!["dist/**".to_string()],
            ..lenient()
        };

        let by_file =
            aggregate(&ledger(), &metadata, &options, LimitKind::File, None, None).unwrap();
        let by_violation =
            aggregate(&ledger(), &metadata, &options, LimitKind::Violation, None, None).unwrap();

        let semi = by_file.iter().find(|c| c.rule_id == "semi").unwrap();
        assert_eq!(semi.eligible_count, 2);
        assert_eq!(semi.original_violation_total, 12);
        assert_eq!(semi.original_files.len(), 3);
        assert!(semi.is_fixable);
        assert!(semi.is_narrowed());

        let semi = by_violation.iter().find(|c| c.rule_id == "semi").unwrap();
        assert_eq!(semi.eligible_count, 5);
        assert_eq!(semi.eligible_violation_total(), 5);
    }

    #[test]
    fn ineligible_rules_are_dropped_not_zeroed() {
        let metadata = RuleMetadata::new().fixable("semi");
        let candidates = aggregate(
            &ledger(),
            &metadata,
            &SelectionOptions::default(),
            LimitKind::File,
            None,
            None,
        )
        .unwrap();
        let ids: Vec<&str> = candidates.iter().map(|c| c.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["semi"]);
    }

    #[test]
    fn candidates_come_out_in_rule_order() {
        let metadata = RuleMetadata::new();
        let candidates =
            aggregate(&ledger(), &metadata, &lenient(), LimitKind::File, None, None).unwrap();
        let ids: Vec<&str> = candidates.iter().map(|c| c.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["no-console", "semi"]);
        assert!(candidates.iter().all(|c| !c.is_fixable));
    }

    #[test]
    fn active_scope_without_reachable_set_is_an_error() {
        let options = SelectionOptions {
            dependency_scope: Some(DependencyScope::new(
                vec![PathBuf::from("src/a.ts")],
                ScopeMode::Connected,
            )),
            ..lenient()
        };
        let err = aggregate(&ledger(), &RuleMetadata::new(), &options, LimitKind::File, None, None)
            .unwrap_err();
        assert!(matches!(err, SelectionError::ScopeNotResolved));
    }

    #[test]
    fn invalid_glob_propagates() {
        let options = SelectionOptions {
            include_file_globs: vec!["{unclosed".to_string()],
            ..lenient()
        };
        let err = aggregate(&ledger(), &RuleMetadata::new(), &options, LimitKind::File, None, None)
            .unwrap_err();
        assert!(matches!(err, SelectionError::InvalidGlob { .. }));
    }

    #[test]
    fn absolute_paths_are_globbed_relative_to_root() {
        let root = Path::new("/repo");
        let ledger = ViolationLedger::from_json(
            r#"{
                "/repo/dist/out.js": {"semi": 7},
                "/repo/src/a.ts": {"semi": 1}
            }"#,
        )
        .unwrap();
        let options = SelectionOptions {
            exclude_file_globs: vec!["dist/**".to_string()],
            ..lenient()
        };
        let metadata = RuleMetadata::new();

        let unrooted =
            aggregate(&ledger, &metadata, &options, LimitKind::File, None, None).unwrap();
        assert_eq!(unrooted[0].eligible_count, 2);

        let rooted =
            aggregate(&ledger, &metadata, &options, LimitKind::File, Some(root), None).unwrap();
        let files: Vec<&str> = rooted[0].eligible_files.iter().map(String::as_str).collect();
        assert_eq!(files, vec!["/repo/src/a.ts"]);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn huge_counts_saturate_instead_of_overflowing() {
        let max = i64::MAX;
        let ledger = ViolationLedger::from_json(&format!(
            r#"{{"a.ts": {{"semi": {max}}}, "b.ts": {{"semi": {max}}}, "c.ts": {{"semi": {max}}}}}"#
        ))
        .unwrap();
        let metadata = RuleMetadata::new();

        let candidates =
            aggregate(&ledger, &metadata, &lenient(), LimitKind::Violation, None, None).unwrap();
        assert_eq!(candidates[0].eligible_count, usize::MAX);
        assert_eq!(candidates[0].original_violation_total, usize::MAX);
        assert_eq!(candidates[0].eligible_violation_total(), usize::MAX);
    }
}
