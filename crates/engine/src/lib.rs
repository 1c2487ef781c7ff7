//! # Paydown Engine
//!
//! Picks the next lint rule to pay down: the rule whose eligible violations
//! fit a size budget best, or a bounded slice of the largest rule when nothing
//! fits whole.
//!
//! ## Flow
//!
//! ```text
//! ViolationLedger + RuleMetadata + SelectionOptions
//!     │
//!     ├──> Reachability (optional, via paydown-graph + cache)
//!     ├──> Aggregator ──> Eligibility filter (rule guards, scope, globs)
//!     │      └─> RuleCandidate per surviving rule
//!     └──> Selector ──> SelectionResult { Success(Full | Partial) | Failure }
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use paydown_engine::{
//!     RuleMetadata, SelectionEngine, SelectionLimit, SelectionOptions, ViolationLedger,
//! };
//!
//! #[tokio::main]
//! async fn main() -> paydown_engine::Result<()> {
//!     let ledger = ViolationLedger::from_json(r#"{"src/a.ts": {"semi": 2}}"#)?;
//!     let metadata = RuleMetadata::new().fixable("semi");
//!     let limit = SelectionLimit::files(10)?;
//!
//!     let engine = SelectionEngine::for_project(".");
//!     let result = engine
//!         .select(&ledger, &metadata, &SelectionOptions::default(), &limit)
//!         .await?;
//!     println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
//!     Ok(())
//! }
//! ```

mod aggregate;
mod eligibility;
mod engine;
mod error;
mod globs;
mod ledger;
mod options;
mod select;

pub use aggregate::{aggregate, RuleCandidate};
pub use eligibility::{filter_rule, Eligibility, FilterContext, IneligibleReason, ReachableFiles};
pub use engine::SelectionEngine;
pub use error::{LedgerError, Result, SelectionError};
pub use globs::{escape_glob_path, FileGlobs};
pub use ledger::{normalize_ledger_path, FileCounts, RuleInfo, RuleMetadata, ViolationLedger};
pub use options::{DependencyScope, LimitKind, SelectionLimit, SelectionOptions};
pub use select::{select, Selection, SelectionMode, SelectionResult};

pub use paydown_graph::ScopeMode;
