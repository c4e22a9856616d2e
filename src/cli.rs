//! structmap - CLI for the structural code index
//!
//! # Usage
//!
//! ```bash
//! # Index a workspace and report what changed since the last run
//! structmap index --workspace /path/to/repo
//!
//! # Compare two manifests
//! structmap diff old/manifest.json new/manifest.json
//!
//! # Split the current document into a struct directory
//! structmap split --out /tmp/struct
//!
//! # Summarize a single entity name
//! structmap summarize get_user_name --kind function
//! ```
//!
//! # Output
//!
//! - `--json` flag outputs machine-readable JSON
//! - Logs and errors go to stderr, results to stdout
//! - Exit codes: 0 = success, 1 = error

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use structmap::config::CONFIG_FILE;
use structmap::error::{CollisionError, ConfigError, ManifestError, OutputError};
use structmap::struct_dir;
use structmap::{
    ChangeReport, DocumentStats, EntityKind, IndexReport, Indexer, ManifestStore, StructmapConfig,
    StructmapError, Summary, SummaryEngine, SummaryRequest, diff, load_manifest,
};

#[derive(Parser)]
#[command(name = "structmap")]
#[command(version)]
#[command(about = "Deterministic structural index of a source tree")]
#[command(long_about = r#"
structmap scans a source tree and writes a structural document:
  - stable uids for every module, function, class and method
  - content hashes for incremental change detection
  - short summaries (docstring, optional LLM, heuristic fallback)
  - per-module call graphs

Designed for automation: use --json for machine-readable output.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace directory to analyze
    #[arg(short, long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    /// Config file (defaults to <workspace>/structmap.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the structural document and manifest
    Index {
        /// Do not compare against the previous manifest
        #[arg(long)]
        no_diff: bool,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Compare two manifest files
    Diff {
        /// Previous manifest
        old: PathBuf,
        /// New manifest
        new: PathBuf,
    },

    /// Write the current document as a struct directory
    Split {
        /// Target directory (defaults to <output dir>/struct)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Run the summary chain on a single entity
    Summarize {
        /// Entity name
        name: String,

        /// Entity kind
        #[arg(short, long, value_enum, default_value = "function")]
        kind: KindArg,

        /// Docstring, if the entity has one
        #[arg(long)]
        doc: Option<String>,

        /// Enclosing class, for methods
        #[arg(long)]
        class: Option<String>,

        /// Modifiers such as async, static or decorator names
        #[arg(short, long = "modifier")]
        modifiers: Vec<String>,

        #[command(flatten)]
        overrides: Overrides,
    },
}

#[derive(clap::Args, Default)]
struct Overrides {
    /// Enable LLM summaries for this run
    #[arg(long)]
    llm: bool,

    /// LLM request timeout in milliseconds
    #[arg(long)]
    llm_timeout_ms: Option<u64>,

    /// Scan workers (0 = CPU count)
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Module,
    Function,
    Class,
    Method,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Module => EntityKind::Module,
            KindArg::Function => EntityKind::Function,
            KindArg::Class => EntityKind::Class,
            KindArg::Method => EntityKind::Method,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging (only to stderr to keep stdout clean)
    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let workspace = cli.workspace.clone();
    let workspace = workspace.canonicalize().unwrap_or(workspace);

    match run_command(&cli, &workspace).await {
        Ok(output) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_human_readable(&output);
            }
            Ok(())
        }
        Err(e) => {
            if cli.json {
                let err = serde_json::json!({
                    "ok": false,
                    "error": {
                        "code": error_code(&e),
                        "message": format!("{e:#}"),
                    }
                });
                eprintln!("{}", serde_json::to_string_pretty(&err)?);
            } else {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(1);
        }
    }
}

/// Stable code for the first typed error in the chain.
fn error_code(error: &anyhow::Error) -> &'static str {
    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<StructmapError>() {
            return e.code();
        }
        if cause.is::<CollisionError>() {
            return "uid_collision";
        }
        if cause.is::<ManifestError>() {
            return "manifest_load";
        }
        if cause.is::<ConfigError>() {
            return "config";
        }
        if cause.is::<OutputError>() {
            return "output";
        }
    }
    "error"
}

fn load_config(cli: &Cli, workspace: &Path, overrides: &Overrides) -> Result<StructmapConfig> {
    let mut config = match &cli.config {
        Some(path) => StructmapConfig::load(path)?,
        None => StructmapConfig::load_for_root(workspace)
            .with_context(|| format!("Failed to load {}", workspace.join(CONFIG_FILE).display()))?,
    };
    if overrides.llm {
        config.summary.llm.enabled = true;
    }
    if let Some(timeout_ms) = overrides.llm_timeout_ms {
        config.summary.llm.timeout_ms = timeout_ms;
    }
    if let Some(workers) = overrides.workers {
        config.scan.workers = workers;
    }
    config.validate()?;
    Ok(config)
}

/// `SOURCE_DATE_EPOCH`, when set, pins the manifest timestamp.
fn pinned_timestamp() -> Result<Option<u64>> {
    match std::env::var("SOURCE_DATE_EPOCH") {
        Ok(value) => {
            let at = value
                .trim()
                .parse()
                .with_context(|| format!("SOURCE_DATE_EPOCH is not a unix timestamp: {value}"))?;
            Ok(Some(at))
        }
        Err(_) => Ok(None),
    }
}

async fn run_command(cli: &Cli, workspace: &Path) -> Result<Output> {
    match &cli.command {
        Commands::Index { no_diff, overrides } => {
            let config = load_config(cli, workspace, overrides)?;
            let store = ManifestStore::from_config(&config, workspace);
            let mut indexer = Indexer::new(config);
            if let Some(at) = pinned_timestamp()? {
                indexer = indexer.with_timestamp(at);
            }

            let run = indexer.index_and_save(workspace, &store, !*no_diff).await?;
            Ok(Output::Index {
                workspace: workspace.display().to_string(),
                document: store.document_path().display().to_string(),
                manifest: store.manifest_path().display().to_string(),
                stats: run.document.metadata.stats.clone(),
                report: run.report,
                changes: run.changes,
            })
        }

        Commands::Diff { old, new } => {
            let old_manifest =
                load_manifest(old).with_context(|| format!("Failed to load {}", old.display()))?;
            let new_manifest =
                load_manifest(new).with_context(|| format!("Failed to load {}", new.display()))?;
            let report = diff(&old_manifest, &new_manifest)?;
            Ok(Output::Diff {
                old: old.display().to_string(),
                new: new.display().to_string(),
                report,
            })
        }

        Commands::Split { out } => {
            let config = load_config(cli, workspace, &Overrides::default())?;
            let store = ManifestStore::from_config(&config, workspace);
            let document = store.load_document().with_context(|| {
                format!(
                    "No document at {}; run `structmap index` first",
                    store.document_path().display()
                )
            })?;
            let dir = out.clone().unwrap_or_else(|| store.dir().join("struct"));
            let report = struct_dir::generate(&dir, &document)?;
            Ok(Output::Split {
                dir: report.dir.display().to_string(),
                modules: report.module_files.len(),
                call_edges: report.edge_count,
            })
        }

        Commands::Summarize {
            name,
            kind,
            doc,
            class,
            modifiers,
            overrides,
        } => {
            let config = load_config(cli, workspace, overrides)?;
            let engine = SummaryEngine::from_config(&config.summary);
            let kind = EntityKind::from(*kind);
            let request = SummaryRequest::new(kind, name)
                .with_docstring(doc.as_deref())
                .with_modifiers(modifiers)
                .with_class(class.as_deref());
            Ok(Output::Summary {
                name: name.clone(),
                kind,
                providers: engine.provider_names(),
                summary: engine.summarize(&request),
            })
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum Output {
    Index {
        workspace: String,
        document: String,
        manifest: String,
        stats: DocumentStats,
        report: IndexReport,
        changes: Option<ChangeReport>,
    },
    Diff {
        old: String,
        new: String,
        report: ChangeReport,
    },
    Split {
        dir: String,
        modules: usize,
        call_edges: usize,
    },
    Summary {
        name: String,
        kind: EntityKind,
        providers: Vec<&'static str>,
        summary: Summary,
    },
}

fn print_changes(report: &ChangeReport) {
    println!(
        "Changes: {} added, {} modified, {} deleted, {} unchanged",
        report.added.len(),
        report.modified.len(),
        report.deleted.len(),
        report.unchanged
    );
    for entry in &report.added {
        println!("  + {}", entry.uid);
    }
    for entry in &report.modified {
        println!("  ~ {}", entry.uid);
    }
    for entry in &report.deleted {
        println!("  - {}", entry.uid);
    }
}

fn print_human_readable(output: &Output) {
    match output {
        Output::Index {
            workspace,
            document,
            stats,
            report,
            changes,
            ..
        } => {
            println!(
                "Indexed {} files ({} failed, {} unsupported) in {} ms",
                report.files_scanned,
                report.failures.len(),
                report.files_unsupported,
                report.elapsed_ms
            );
            println!(
                "  {} modules, {} functions, {} classes, {} methods, {} call edges",
                stats.module_count, stats.function_count, stats.class_count, stats.method_count, stats.call_edges_count
            );
            for failure in &report.failures {
                println!("  ! {}: {}", failure.path, failure.error);
            }
            println!("Workspace: {}", workspace);
            println!("Document: {}", document);
            if let Some(changes) = changes {
                print_changes(changes);
            }
        }
        Output::Diff { old, new, report } => {
            println!("{} -> {}", old, new);
            print_changes(report);
        }
        Output::Split {
            dir,
            modules,
            call_edges,
        } => {
            println!("Wrote {} module files and {} call edges to {}", modules, call_edges, dir);
        }
        Output::Summary {
            name, kind, summary, ..
        } => {
            println!("{} {}: {}", kind, name, summary.text);
            println!("  source: {:?}, confidence: {:.2}", summary.source, summary.confidence);
            if !summary.tags.is_empty() {
                println!("  tags: {}", summary.tags.join(", "));
            }
        }
    }
}
