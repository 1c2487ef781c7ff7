//! Violation ledger and rule metadata ingestion.
//!
//! Both documents come from the linter side and are validated here, at the
//! boundary, so the rest of the engine can rely on their shape: every ledger
//! count is positive and every path is normalized to forward slashes.

use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Violation counts keyed by file path, in ledger order.
pub type FileCounts = BTreeMap<String, usize>;

type RawLedger = BTreeMap<String, BTreeMap<String, i64>>;

/// file → rule → violation count
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawLedger")]
pub struct ViolationLedger {
    files: BTreeMap<String, BTreeMap<String, usize>>,
}

impl ViolationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(raw: &str) -> Result<Self, LedgerError> {
        let parsed: RawLedger = serde_json::from_str(raw)?;
        Self::try_from(parsed)
    }

    /// Record `count` violations of `rule` in `file`, adding to any existing count.
    pub fn record(&mut self, file: &str, rule: &str, count: i64) -> Result<(), LedgerError> {
        let file = normalize_ledger_path(file);
        if file.is_empty() {
            return Err(LedgerError::EmptyPath);
        }
        let rule = rule.trim();
        if rule.is_empty() {
            return Err(LedgerError::EmptyRule(file));
        }
        let count = usize::try_from(count)
            .ok()
            .filter(|c| *c > 0)
            .ok_or_else(|| LedgerError::NonPositiveCount {
                file: file.clone(),
                rule: rule.to_string(),
                count,
            })?;

        let total = self
            .files
            .entry(file)
            .or_default()
            .entry(rule.to_string())
            .or_insert(0);
        *total = total.saturating_add(count);
        Ok(())
    }

    /// Chainable [`ViolationLedger::record`] for literal fixtures.
    pub fn with(mut self, file: &str, rule: &str, count: i64) -> Result<Self, LedgerError> {
        self.record(file, rule, count)?;
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn violation_total(&self) -> usize {
        saturating_total(self.files.values().flat_map(|rules| rules.values()))
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, usize>)> {
        self.files.iter().map(|(file, rules)| (file.as_str(), rules))
    }

    pub fn rule_ids(&self) -> BTreeSet<&str> {
        self.files
            .values()
            .flat_map(|rules| rules.keys().map(String::as_str))
            .collect()
    }

    /// Rule-major view: rule → (file → count), files kept in ledger order.
    pub fn by_rule(&self) -> BTreeMap<&str, FileCounts> {
        let mut inverted: BTreeMap<&str, FileCounts> = BTreeMap::new();
        for (file, rules) in &self.files {
            for (rule, count) in rules {
                inverted
                    .entry(rule.as_str())
                    .or_default()
                    .insert(file.clone(), *count);
            }
        }
        inverted
    }
}

impl TryFrom<RawLedger> for ViolationLedger {
    type Error = LedgerError;

    fn try_from(raw: RawLedger) -> Result<Self, Self::Error> {
        let mut ledger = ViolationLedger::new();
        for (file, rules) in raw {
            for (rule, count) in rules {
                ledger.record(&file, &rule, count)?;
            }
        }
        Ok(ledger)
    }
}

/// Sum of violation counts, clamped at `usize::MAX`.
pub(crate) fn saturating_total<'a>(counts: impl IntoIterator<Item = &'a usize>) -> usize {
    counts
        .into_iter()
        .fold(0usize, |total, count| total.saturating_add(*count))
}

/// Normalize a ledger path: forward slashes, no leading `./`.
pub fn normalize_ledger_path(raw: &str) -> String {
    let mut value = raw.trim().replace('\\', "/");
    while let Some(stripped) = value.strip_prefix("./") {
        value = stripped.to_string();
    }
    value
}

/// Per-rule linter facts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleInfo {
    #[serde(default)]
    pub supports_auto_fix: bool,
}

/// rule id → fixability, as resolved from the linter configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleMetadata {
    rules: BTreeMap<String, RuleInfo>,
}

impl RuleMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(raw: &str) -> Result<Self, LedgerError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn insert(&mut self, rule: impl Into<String>, supports_auto_fix: bool) {
        self.rules
            .insert(rule.into(), RuleInfo { supports_auto_fix });
    }

    pub fn fixable(mut self, rule: impl Into<String>) -> Self {
        self.insert(rule, true);
        self
    }

    /// Unknown rules are not fixable.
    pub fn is_fixable(&self, rule: &str) -> bool {
        self.rules
            .get(rule)
            .is_some_and(|info| info.supports_auto_fix)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<(String, bool)> for RuleMetadata {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        let mut metadata = RuleMetadata::new();
        for (rule, supports_auto_fix) in iter {
            metadata.insert(rule, supports_auto_fix);
        }
        metadata
    }
}
