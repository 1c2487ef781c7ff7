use crate::aggregate::RuleCandidate;
use crate::ledger::FileCounts;
use crate::options::{LimitKind, SelectionLimit, SelectionOptions};
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Every eligible violation of the rule
    Full,

    /// A bounded subset of the rule's eligible violations
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub rule_id: String,
    pub mode: SelectionMode,

    /// Always set for partial selections. For full selections, set only when
    /// filtering narrowed the rule's files; `None` means every file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<FileCounts>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SelectionResult {
    Success(Selection),
    Failure,
}

impl SelectionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SelectionResult::Success(_))
    }

    pub fn selection(&self) -> Option<&Selection> {
        match self {
            SelectionResult::Success(selection) => Some(selection),
            SelectionResult::Failure => None,
        }
    }
}

/// Pick the next rule to pay down.
///
/// Rules whose eligible count fits the limit are ranked fixable first, then
/// by larger eligible count, then by smaller rule id. When none fit and
/// partial selection is allowed, the largest rule (first seen on ties) is
/// sliced down to the limit in ledger order.
pub fn select(
    candidates: &[RuleCandidate],
    limit: &SelectionLimit,
    options: &SelectionOptions,
) -> SelectionResult {
    let best_full = candidates
        .iter()
        .filter(|c| c.eligible_count <= limit.count())
        .min_by(|a, b| rank_full(a, b));

    if let Some(candidate) = best_full {
        return SelectionResult::Success(Selection {
            rule_id: candidate.rule_id.clone(),
            mode: SelectionMode::Full,
            violations: candidate
                .is_narrowed()
                .then(|| candidate.eligible_violations.clone()),
        });
    }

    if !options.allow_partial_selection {
        return SelectionResult::Failure;
    }

    let Some(largest) = largest_over_limit(candidates, limit) else {
        return SelectionResult::Failure;
    };

    let violations = partial_subset(&largest.eligible_violations, limit);
    if violations.is_empty() {
        return SelectionResult::Failure;
    }

    SelectionResult::Success(Selection {
        rule_id: largest.rule_id.clone(),
        mode: SelectionMode::Partial,
        violations: Some(violations),
    })
}

fn rank_full(a: &RuleCandidate, b: &RuleCandidate) -> Ordering {
    b.is_fixable
        .cmp(&a.is_fixable)
        .then_with(|| b.eligible_count.cmp(&a.eligible_count))
        .then_with(|| a.rule_id.cmp(&b.rule_id))
}

fn largest_over_limit<'a>(
    candidates: &'a [RuleCandidate],
    limit: &SelectionLimit,
) -> Option<&'a RuleCandidate> {
    let mut largest: Option<&RuleCandidate> = None;
    for candidate in candidates.iter().filter(|c| c.eligible_count > limit.count()) {
        if largest.map_or(true, |best| candidate.eligible_count > best.eligible_count) {
            largest = Some(candidate);
        }
    }
    largest
}

fn partial_subset(eligible: &FileCounts, limit: &SelectionLimit) -> FileCounts {
    match limit.kind() {
        LimitKind::File => eligible
            .iter()
            .take(limit.count())
            .map(|(file, count)| (file.clone(), *count))
            .collect(),
        LimitKind::Violation => {
            let mut subset = FileCounts::new();
            let mut total = 0usize;
            for (file, count) in eligible {
                let next = total.saturating_add(*count);
                if next > limit.count() {
                    break;
                }
                total = next;
                subset.insert(file.clone(), *count);
            }
            subset
        }
    }
}
