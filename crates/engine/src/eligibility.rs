use crate::globs::FileGlobs;
use crate::ledger::{FileCounts, RuleMetadata};
use crate::options::SelectionOptions;
use paydown_graph::resolve_under;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Files reachable from the configured entry points, as canonical paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReachableFiles {
    root: PathBuf,
    files: BTreeSet<PathBuf>,
}

impl ReachableFiles {
    /// `root` must be the canonical project root the graph was built from.
    pub fn new(root: impl Into<PathBuf>, files: BTreeSet<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.iter()
    }

    /// Whether a ledger path (relative to the root, or absolute) is in scope.
    pub fn contains_ledger_path(&self, file: &str) -> bool {
        self.files.contains(&resolve_under(&self.root, Path::new(file)))
    }
}

/// Why a rule was dropped from the candidate set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IneligibleReason {
    NotAutoFixable,
    ExcludedRule,
    NotIncludedRule,
    NoEligibleFiles,
    /// A dependency scope is active but no reachable set was supplied
    ScopeNotResolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    /// Surviving files with their ledger counts
    Eligible(FileCounts),
    Ineligible(IneligibleReason),
}

/// Everything the filter needs besides the rule and its files
#[derive(Debug, Clone, Copy)]
pub struct FilterContext<'a> {
    pub metadata: &'a RuleMetadata,
    pub options: &'a SelectionOptions,
    pub globs: &'a FileGlobs,
    /// Present when `options` carries an active dependency scope
    pub reachable: Option<&'a ReachableFiles>,
}

/// Decide which of `files` (rule violations by file) survive the configured filters.
///
/// Guards run in order and the first failing one wins: fixability, rule
/// exclusion, rule inclusion, then the file filters (dependency scope,
/// exclude globs, include globs). An active scope without a reachable set
/// leaves the rule ineligible rather than unscoped.
pub fn filter_rule(rule_id: &str, files: &FileCounts, ctx: &FilterContext<'_>) -> Eligibility {
    let options = ctx.options;

    if options.only_auto_fixable && !ctx.metadata.is_fixable(rule_id) {
        return Eligibility::Ineligible(IneligibleReason::NotAutoFixable);
    }
    if options.exclude_rules.contains(rule_id) {
        return Eligibility::Ineligible(IneligibleReason::ExcludedRule);
    }
    if !options.include_rules.is_empty() && !options.include_rules.contains(rule_id) {
        return Eligibility::Ineligible(IneligibleReason::NotIncludedRule);
    }

    let scope = match (options.active_scope(), ctx.reachable) {
        (Some(_), None) => return Eligibility::Ineligible(IneligibleReason::ScopeNotResolved),
        (Some(_), reachable) => reachable,
        (None, _) => None,
    };
    let eligible: FileCounts = files
        .iter()
        .filter(|(file, _)| scope.map_or(true, |reachable| reachable.contains_ledger_path(file)))
        .filter(|(file, _)| !ctx.globs.is_excluded(file))
        .filter(|(file, _)| ctx.globs.is_included(file))
        .map(|(file, count)| (file.clone(), *count))
        .collect();

    if eligible.is_empty() {
        Eligibility::Ineligible(IneligibleReason::NoEligibleFiles)
    } else {
        Eligibility::Eligible(eligible)
    }
}
