use anyhow::{Context as AnyhowContext, Result};
use cache::{CacheBackend, CliCacheStore};
use clap::{Args, Parser, Subcommand};
use config::PaydownConfig;
use paydown_engine::{
    DependencyScope, LimitKind, RuleMetadata, ScopeMode, SelectionEngine, SelectionResult,
    ViolationLedger,
};
use paydown_graph::{relative_slash_path, DependencyGraphCache, SourceImportAnalyzer};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod cache;
mod config;

/// Exit status when no rule fits the limit.
pub const EXIT_NO_SELECTION: u8 = 2;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    print_stdout(&text)
}

#[derive(Parser)]
#[command(name = "paydown")]
#[command(about = "Pick the next lint rule to pay down", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Config file (defaults to <root>/paydown.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Keep the dependency graph cache in memory for this run only
    #[arg(long, global = true)]
    no_cache: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Select the next rule (or slice of a rule) to fix
    Select(SelectArgs),

    /// List files connected to entry points through imports
    Reachable(ReachableArgs),

    /// Manage the dependency graph cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Args)]
struct SelectArgs {
    /// Violation ledger JSON (file -> rule -> count); `-` reads stdin
    #[arg(long)]
    ledger: PathBuf,

    /// Rule metadata JSON (rule -> { supportsAutoFix })
    #[arg(long)]
    rules: Option<PathBuf>,

    /// What the limit counts: file|violation
    #[arg(long)]
    limit_kind: Option<LimitKind>,

    /// Limit count (must be positive)
    #[arg(long, allow_negative_numbers = true)]
    limit: Option<i64>,

    /// Allow slicing a rule that does not fit the limit
    #[arg(long)]
    partial: bool,

    /// Consider rules without an auto-fix
    #[arg(long)]
    include_unfixable: bool,

    /// Rule ids to skip (repeatable)
    #[arg(long = "exclude-rule")]
    exclude_rules: Vec<String>,

    /// Only consider these rule ids (repeatable)
    #[arg(long = "include-rule")]
    include_rules: Vec<String>,

    /// File globs to skip (repeatable)
    #[arg(long = "exclude-glob")]
    exclude_globs: Vec<String>,

    /// Only consider files matching these globs (repeatable)
    #[arg(long = "include-glob")]
    include_globs: Vec<String>,

    /// Entry points for dependency scoping (replaces configured ones)
    #[arg(long = "entry")]
    entries: Vec<PathBuf>,

    /// Scope direction: connected|dependencies|dependents
    #[arg(long)]
    mode: Option<ScopeMode>,

    /// Maximum import hops from an entry point
    #[arg(long)]
    max_depth: Option<usize>,
}

impl SelectArgs {
    fn apply(&self, config: &mut PaydownConfig) {
        if let Some(kind) = self.limit_kind {
            config.limit.kind = kind;
        }
        if let Some(count) = self.limit {
            config.limit.count = count;
        }

        let selection = &mut config.selection;
        if self.partial {
            selection.allow_partial_selection = true;
        }
        if self.include_unfixable {
            selection.only_auto_fixable = false;
        }
        selection
            .exclude_rules
            .extend(self.exclude_rules.iter().cloned());
        selection
            .include_rules
            .extend(self.include_rules.iter().cloned());
        selection
            .exclude_file_globs
            .extend(self.exclude_globs.iter().cloned());
        selection
            .include_file_globs
            .extend(self.include_globs.iter().cloned());

        if self.entries.is_empty() && self.mode.is_none() && self.max_depth.is_none() {
            return;
        }
        let scope = selection
            .dependency_scope
            .get_or_insert_with(DependencyScope::default);
        if !self.entries.is_empty() {
            scope.entry_points = self.entries.clone();
        }
        if let Some(mode) = self.mode {
            scope.mode = mode;
        }
        if let Some(max_depth) = self.max_depth {
            scope.max_depth = Some(max_depth);
        }
    }
}

#[derive(Args)]
struct ReachableArgs {
    /// Entry point (repeatable)
    #[arg(long = "entry", required = true)]
    entries: Vec<PathBuf>,

    /// Direction: connected|dependencies|dependents
    #[arg(long, default_value = "connected")]
    mode: ScopeMode,

    /// Maximum import hops from an entry point
    #[arg(long)]
    max_depth: Option<usize>,

    /// Globs left out of the analysis (repeatable)
    #[arg(long = "exclude-pattern")]
    exclude_patterns: Vec<String>,
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Delete cached dependency graphs
    Clear,
}

type CliEngine = SelectionEngine<CliCacheStore, SourceImportAnalyzer>;

fn engine_for(cli: &Cli) -> CliEngine {
    let backend = if cli.no_cache {
        CacheBackend::Memory
    } else {
        CacheBackend::File
    };
    let store = CliCacheStore::open(backend, &cli.root);
    SelectionEngine::new(
        &cli.root,
        SourceImportAnalyzer::new(),
        DependencyGraphCache::new(store),
    )
}

pub async fn main_entry() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let engine = engine_for(&cli);
    match &cli.command {
        Commands::Select(args) => run_select(&cli, args, &engine).await,
        Commands::Reachable(args) => run_reachable(&cli, args, &engine).await,
        Commands::Cache(CacheCommand::Clear) => {
            engine
                .clear_cache()
                .await
                .context("Failed to clear dependency graph cache")?;
            log::info!("Dependency graph cache cleared");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_select(cli: &Cli, args: &SelectArgs, engine: &CliEngine) -> Result<ExitCode> {
    let mut config = PaydownConfig::load(&cli.root, cli.config.as_deref())?;
    args.apply(&mut config);
    let limit = config.selection_limit()?;

    let ledger = ViolationLedger::from_json(&read_input(&args.ledger)?)
        .with_context(|| format!("Invalid ledger {}", args.ledger.display()))?;
    let metadata = match &args.rules {
        Some(path) => RuleMetadata::from_json(&read_input(path)?)
            .with_context(|| format!("Invalid rule metadata {}", path.display()))?,
        None => RuleMetadata::new(),
    };
    log::debug!(
        "Ledger: {} files, {} violations, {} rules",
        ledger.file_count(),
        ledger.violation_total(),
        ledger.rule_ids().len()
    );

    let result = engine
        .select(&ledger, &metadata, &config.selection, &limit)
        .await?;
    print_json(&result, cli.pretty)?;

    Ok(match result {
        SelectionResult::Success(_) => ExitCode::SUCCESS,
        SelectionResult::Failure => ExitCode::from(EXIT_NO_SELECTION),
    })
}

async fn run_reachable(cli: &Cli, args: &ReachableArgs, engine: &CliEngine) -> Result<ExitCode> {
    let scope = DependencyScope {
        entry_points: args.entries.clone(),
        mode: args.mode,
        max_depth: args.max_depth,
        exclude_patterns: args.exclude_patterns.clone(),
    };
    let reachable = engine.resolve_scope(&scope).await?;
    let files: Vec<String> = reachable
        .iter()
        .map(|path| display_path(reachable.root(), path))
        .collect();
    print_json(&files, cli.pretty)?;
    Ok(ExitCode::SUCCESS)
}

fn display_path(root: &Path, path: &Path) -> String {
    relative_slash_path(root, path).unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut raw = String::new();
        io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read stdin")?;
        return Ok(raw);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
