use async_trait::async_trait;
use paydown_engine::{
    DependencyScope, RuleMetadata, ScopeMode, Selection, SelectionEngine, SelectionError,
    SelectionLimit, SelectionMode, SelectionOptions, SelectionResult, ViolationLedger,
};
use paydown_graph::{
    AnalysisRequest, DependencyGraphCache, GraphError, MemoryCacheStore, ModuleAnalyzer,
    ModuleRecord, PROJECT_CACHE_DIR,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Reports `src/index.ts -> src/a.ts -> src/b.ts` plus an unconnected
/// `src/unused.ts`, counting how often it runs.
struct ChainAnalyzer {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ModuleAnalyzer for ChainAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> paydown_graph::Result<Vec<ModuleRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let src = request.root.join("src");
        Ok(vec![
            ModuleRecord::new(src.join("index.ts"))
                .internal(src.join("a.ts"))
                .external("lodash"),
            ModuleRecord::new(src.join("a.ts")).internal(src.join("b.ts")),
            ModuleRecord::new(src.join("b.ts")),
            ModuleRecord::new(src.join("unused.ts")),
        ])
    }
}

struct BrokenAnalyzer;

#[async_trait]
impl ModuleAnalyzer for BrokenAnalyzer {
    async fn analyze(
        &self,
        _request: &AnalysisRequest,
    ) -> paydown_graph::Result<Vec<ModuleRecord>> {
        Err(GraphError::AnalysisFailed("resolver exited with status 1".to_string()))
    }
}

fn project() -> TempDir {
    let temp = TempDir::new().expect("tempdir");
    let src = temp.path().join("src");
    std::fs::create_dir_all(&src).expect("create src");
    for name in ["index.ts", "a.ts", "b.ts", "unused.ts"] {
        std::fs::write(src.join(name), "export {};\n").expect("write source");
    }
    temp
}

fn chain_engine(
    root: &Path,
) -> (
    SelectionEngine<MemoryCacheStore, ChainAnalyzer>,
    Arc<AtomicUsize>,
) {
    let calls = Arc::new(AtomicUsize::new(0));
    let analyzer = ChainAnalyzer {
        calls: Arc::clone(&calls),
    };
    let engine = SelectionEngine::new(
        root,
        analyzer,
        DependencyGraphCache::new(MemoryCacheStore::new()),
    );
    (engine, calls)
}

fn counts(entries: &[(&str, usize)]) -> BTreeMap<String, usize> {
    entries.iter().map(|(f, c)| (f.to_string(), *c)).collect()
}

fn scoped(mode: ScopeMode) -> SelectionOptions {
    SelectionOptions {
        dependency_scope: Some(DependencyScope::new(vec![PathBuf::from("src/index.ts")], mode)),
        ..SelectionOptions::default()
    }
}

#[tokio::test]
async fn fitting_rule_is_selected_in_full() {
    let temp = project();
    let (engine, calls) = chain_engine(temp.path());
    let ledger = ViolationLedger::new()
        .with("src/a.ts", "R1", 1)
        .and_then(|l| l.with("src/b.ts", "R1", 2))
        .and_then(|l| {
            ["f1", "f2", "f3", "f4", "f5"]
                .iter()
                .try_fold(l, |l, f| l.with(&format!("lib/{f}.ts"), "R2", 1))
        })
        .expect("ledger");
    let metadata = RuleMetadata::new().fixable("R1").fixable("R2");
    let limit = SelectionLimit::files(4).expect("limit");

    let result = engine
        .select(&ledger, &metadata, &SelectionOptions::default(), &limit)
        .await
        .expect("select");

    assert_eq!(
        result,
        SelectionResult::Success(Selection {
            rule_id: "R1".to_string(),
            mode: SelectionMode::Full,
            violations: None,
        })
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0, "no scope means no analysis");
}

#[tokio::test]
async fn larger_fitting_rule_wins_even_when_unfixable_rules_are_allowed() {
    let temp = project();
    let (engine, _) = chain_engine(temp.path());
    let ledger = ViolationLedger::from_json(
        r#"{
            "a.ts": {"R1": 1},
            "b.ts": {"R1": 1},
            "c.ts": {"R1": 1},
            "d.ts": {"R1": 1},
            "e.ts": {"R2": 1}
        }"#,
    )
    .expect("ledger");
    let options = SelectionOptions {
        only_auto_fixable: false,
        ..SelectionOptions::default()
    };

    let result = engine
        .select(
            &ledger,
            &RuleMetadata::new(),
            &options,
            &SelectionLimit::files(4).expect("limit"),
        )
        .await
        .expect("select");
    assert_eq!(
        result,
        SelectionResult::Success(Selection {
            rule_id: "R1".to_string(),
            mode: SelectionMode::Full,
            violations: None,
        })
    );
}

#[tokio::test]
async fn oversized_rule_is_sliced_only_when_partials_are_allowed() {
    let temp = project();
    let (engine, _) = chain_engine(temp.path());
    let ledger = ViolationLedger::from_json(
        r#"{
            "src/a.ts": {"R1": 1},
            "src/b.ts": {"R1": 1},
            "src/c.ts": {"R1": 1},
            "src/d.ts": {"R1": 1},
            "src/e.ts": {"R1": 1}
        }"#,
    )
    .expect("ledger");
    let metadata = RuleMetadata::new().fixable("R1");
    let limit = SelectionLimit::files(3).expect("limit");

    let strict = engine
        .select(&ledger, &metadata, &SelectionOptions::default(), &limit)
        .await
        .expect("select");
    assert_eq!(strict, SelectionResult::Failure);

    let options = SelectionOptions {
        allow_partial_selection: true,
        ..SelectionOptions::default()
    };
    let partial = engine
        .select(&ledger, &metadata, &options, &limit)
        .await
        .expect("select");
    assert_eq!(
        partial,
        SelectionResult::Success(Selection {
            rule_id: "R1".to_string(),
            mode: SelectionMode::Partial,
            violations: Some(counts(&[("src/a.ts", 1), ("src/b.ts", 1), ("src/c.ts", 1)])),
        })
    );
}

#[tokio::test]
async fn excluded_build_output_drops_the_only_rule() {
    let temp = project();
    let (engine, _) = chain_engine(temp.path());
    let ledger = ViolationLedger::from_json(r#"{"dist/x.js": {"R1": 3}}"#).expect("ledger");
    let options = SelectionOptions {
        exclude_file_globs: vec!["dist/**".to_string()],
        allow_partial_selection: true,
        ..SelectionOptions::default()
    };

    let result = engine
        .select(
            &ledger,
            &RuleMetadata::new().fixable("R1"),
            &options,
            &SelectionLimit::violations(10).expect("limit"),
        )
        .await
        .expect("select");
    assert_eq!(result, SelectionResult::Failure);
}

#[tokio::test]
async fn absolute_ledger_paths_honor_root_relative_globs_without_a_scope() {
    let temp = project();
    let (engine, calls) = chain_engine(temp.path());
    let root = temp.path().canonicalize().expect("canonical root");
    let bundle = root.join("dist/x.js").to_string_lossy().into_owned();
    let ledger = ViolationLedger::new()
        .with(&bundle, "R1", 3)
        .and_then(|l| l.with("src/a.ts", "R1", 1))
        .expect("ledger");
    let options = SelectionOptions {
        exclude_file_globs: vec!["dist/**".to_string()],
        ..SelectionOptions::default()
    };

    let result = engine
        .select(
            &ledger,
            &RuleMetadata::new().fixable("R1"),
            &options,
            &SelectionLimit::files(5).expect("limit"),
        )
        .await
        .expect("select");
    assert_eq!(
        result,
        SelectionResult::Success(Selection {
            rule_id: "R1".to_string(),
            mode: SelectionMode::Full,
            violations: Some(counts(&[("src/a.ts", 1)])),
        })
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let only_bundle = ViolationLedger::new().with(&bundle, "R1", 3).expect("ledger");
    let result = engine
        .select(
            &only_bundle,
            &RuleMetadata::new().fixable("R1"),
            &options,
            &SelectionLimit::files(5).expect("limit"),
        )
        .await
        .expect("select");
    assert_eq!(result, SelectionResult::Failure);
}

#[tokio::test]
async fn dependency_scope_narrows_files_and_reuses_cached_graph() {
    let temp = project();
    let (engine, calls) = chain_engine(temp.path());
    let ledger = ViolationLedger::from_json(
        r#"{
            "src/a.ts": {"semi": 2},
            "src/b.ts": {"semi": 1},
            "src/unused.ts": {"semi": 5}
        }"#,
    )
    .expect("ledger");
    let metadata = RuleMetadata::new().fixable("semi");
    let limit = SelectionLimit::files(5).expect("limit");
    let options = scoped(ScopeMode::Dependencies);

    let first = engine
        .select(&ledger, &metadata, &options, &limit)
        .await
        .expect("select");
    let expected = SelectionResult::Success(Selection {
        rule_id: "semi".to_string(),
        mode: SelectionMode::Full,
        violations: Some(counts(&[("src/a.ts", 2), ("src/b.ts", 1)])),
    });
    assert_eq!(first, expected);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.cache().store().len(), 1);

    let second = engine
        .select(&ledger, &metadata, &options, &limit)
        .await
        .expect("select");
    assert_eq!(second, expected);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "second run should hit the cache");

    engine.clear_cache().await.expect("clear");
    engine
        .select(&ledger, &metadata, &options, &limit)
        .await
        .expect("select");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn depth_cap_limits_scope() {
    let temp = project();
    let (engine, _) = chain_engine(temp.path());
    let scope = DependencyScope::new(vec![PathBuf::from("src/index.ts")], ScopeMode::Dependencies)
        .with_max_depth(1);

    let reachable = engine.resolve_scope(&scope).await.expect("scope");
    let root = temp.path().canonicalize().expect("canonical root");
    let files: Vec<PathBuf> = reachable.iter().cloned().collect();
    assert_eq!(files, vec![root.join("src/a.ts"), root.join("src/index.ts")]);
    assert!(reachable.contains_ledger_path("src/a.ts"));
    assert!(!reachable.contains_ledger_path("src/b.ts"));
}

#[tokio::test]
async fn empty_entry_point_list_skips_analysis() {
    let temp = project();
    let (engine, calls) = chain_engine(temp.path());
    let ledger = ViolationLedger::from_json(r#"{"src/unused.ts": {"semi": 1}}"#).expect("ledger");
    let options = SelectionOptions {
        dependency_scope: Some(DependencyScope::new(Vec::new(), ScopeMode::Connected)),
        ..SelectionOptions::default()
    };

    let result = engine
        .select(
            &ledger,
            &RuleMetadata::new().fixable("semi"),
            &options,
            &SelectionLimit::files(1).expect("limit"),
        )
        .await
        .expect("select");
    assert!(result.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn analysis_failure_is_not_an_empty_scope() {
    let temp = project();
    let engine = SelectionEngine::new(
        temp.path(),
        BrokenAnalyzer,
        DependencyGraphCache::new(MemoryCacheStore::new()),
    );
    let ledger = ViolationLedger::from_json(r#"{"src/a.ts": {"semi": 1}}"#).expect("ledger");

    let err = engine
        .select(
            &ledger,
            &RuleMetadata::new().fixable("semi"),
            &scoped(ScopeMode::Connected),
            &SelectionLimit::files(1).expect("limit"),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SelectionError::Graph(GraphError::AnalysisFailed(_))
    ));
}

#[tokio::test]
async fn invalid_glob_fails_before_analysis() {
    let temp = project();
    let (engine, calls) = chain_engine(temp.path());
    let options = SelectionOptions {
        include_file_globs: vec!["src/[".to_string()],
        ..scoped(ScopeMode::Connected)
    };

    let err = engine
        .select(
            &ViolationLedger::new(),
            &RuleMetadata::new(),
            &options,
            &SelectionLimit::files(1).expect("limit"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SelectionError::InvalidGlob { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn source_analysis_scopes_real_imports_and_persists_cache() {
    let temp = TempDir::new().expect("tempdir");
    let src = temp.path().join("src");
    std::fs::create_dir_all(&src).expect("create src");
    std::fs::write(
        src.join("index.ts"),
        "import { helper } from \"./util\";\nimport React from \"react\";\nhelper();\n",
    )
    .expect("write index");
    std::fs::write(src.join("util.ts"), "export function helper() {}\n").expect("write util");
    std::fs::write(src.join("orphan.ts"), "export const x = 1;\n").expect("write orphan");

    let engine = SelectionEngine::for_project(temp.path());
    let ledger = ViolationLedger::from_json(
        r#"{
            "src/index.ts": {"semi": 1},
            "src/util.ts": {"semi": 2},
            "src/orphan.ts": {"semi": 4}
        }"#,
    )
    .expect("ledger");
    let result = engine
        .select(
            &ledger,
            &RuleMetadata::new().fixable("semi"),
            &scoped(ScopeMode::Dependencies),
            &SelectionLimit::violations(10).expect("limit"),
        )
        .await
        .expect("select");

    assert_eq!(
        result,
        SelectionResult::Success(Selection {
            rule_id: "semi".to_string(),
            mode: SelectionMode::Full,
            violations: Some(counts(&[("src/index.ts", 1), ("src/util.ts", 2)])),
        })
    );

    let cache_dir = temp.path().join(PROJECT_CACHE_DIR);
    let entries = std::fs::read_dir(&cache_dir)
        .expect("cache dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
        .count();
    assert_eq!(entries, 1);

    engine.clear_cache().await.expect("clear");
    assert!(!cache_dir.exists());
}

#[tokio::test]
async fn nested_build_directories_stay_in_the_source_graph() {
    let temp = TempDir::new().expect("tempdir");
    let src = temp.path().join("src");
    std::fs::create_dir_all(src.join("build")).expect("create src/build");
    std::fs::create_dir_all(temp.path().join("build")).expect("create build");
    std::fs::write(
        src.join("index.ts"),
        "import { steps } from \"./build/steps\";\nsteps();\n",
    )
    .expect("write index");
    std::fs::write(src.join("build/steps.ts"), "export function steps() {}\n")
        .expect("write steps");
    std::fs::write(temp.path().join("build/bundle.js"), "module.exports = {};\n")
        .expect("write bundle");

    let engine = SelectionEngine::for_project(temp.path());
    let scope = DependencyScope::new(vec![PathBuf::from("src/index.ts")], ScopeMode::Dependencies);
    let reachable = engine.resolve_scope(&scope).await.expect("scope");

    let root = temp.path().canonicalize().expect("canonical root");
    let files: Vec<PathBuf> = reachable.iter().cloned().collect();
    assert_eq!(files, vec![root.join("src/build/steps.ts"), root.join("src/index.ts")]);
}
