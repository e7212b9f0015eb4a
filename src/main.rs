//! Artifact Vault CLI
//!
//! Entry point for the `vault` command-line tool.

use artifact_vault::{
    ArtifactKind, EffectiveConfig, ListFilter, Payload, PutOptions, Vault, VaultError,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for usage and configuration errors
const EXIT_USAGE: i32 = 2;

#[derive(Parser)]
#[command(name = "vault")]
#[command(about = "Content-addressed artifact vault with golden-suite regression checks", version)]
struct Cli {
    /// Path to vault config file (default: vault.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Override the vault root directory
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store an artifact from JSON payload files (payload name = file stem)
    Put {
        /// Artifact kind (kernel-run, orchestrator-run, session-recap, bundle, contact-inquiry)
        #[arg(long, short = 'k')]
        kind: String,

        /// Artifact id (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Tags (comma-separated)
        #[arg(long, short = 't', value_delimiter = ',')]
        tag: Vec<String>,

        #[arg(long)]
        learner: Option<String>,

        #[arg(long)]
        session: Option<String>,

        #[arg(long)]
        notes: Option<String>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print an artifact bundle as JSON
    Get { id: String },

    /// List artifact manifests, newest first
    List {
        #[arg(long, short = 'k')]
        kind: Option<String>,

        /// Match any of these tags (comma-separated)
        #[arg(long, short = 't', value_delimiter = ',')]
        tag: Vec<String>,

        #[arg(long)]
        learner: Option<String>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Delete an artifact
    Delete { id: String },

    /// Exit 0 if the artifact exists, 1 otherwise
    Exists { id: String },

    /// Recompute and check every stored hash of an artifact
    Verify {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Remove staged payloads left behind by interrupted writes
    Sweep {
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration with provenance
    Config,

    /// Golden suite commands
    Golden {
        #[command(subcommand)]
        action: GoldenCommands,
    },
}

#[derive(Subcommand)]
enum GoldenCommands {
    /// Register the artifact's current summary as a golden case
    Add {
        id: String,

        #[arg(long, short = 'l', default_value = "")]
        label: String,

        /// Register as skipped
        #[arg(long)]
        skip: bool,

        #[arg(long)]
        json: bool,
    },

    /// List registered golden cases
    List {
        #[arg(long)]
        json: bool,
    },

    /// Skip (or with --unskip, re-activate) a golden case
    Skip {
        id: String,

        #[arg(long)]
        unskip: bool,
    },

    /// Run the active golden suite; exits 1 on critical drift
    Run {
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref(), cli.root.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(EXIT_USAGE);
        }
    };
    init_tracing(config.log_filter());

    if let Commands::Config = cli.command {
        print_json(&config);
        return;
    }

    let vault = match Vault::open(&config) {
        Ok(v) => v,
        Err(e) => fail(&e),
    };

    match cli.command {
        Commands::Put {
            kind,
            id,
            tag,
            learner,
            session,
            notes,
            json,
            files,
        } => {
            let options = PutOptions {
                artifact_id: id,
                tags: tag,
                learner_id: learner,
                session_id: session,
                notes,
            };
            run_put(&vault, &kind, options, &files, json);
        }
        Commands::Get { id } => run_get(&vault, &id),
        Commands::List {
            kind,
            tag,
            learner,
            limit,
            json,
        } => run_list(&vault, kind.as_deref(), tag, learner, limit, json),
        Commands::Delete { id } => run_delete(&vault, &id),
        Commands::Exists { id } => run_exists(&vault, &id),
        Commands::Verify { id, json } => run_verify(&vault, &id, json),
        Commands::Sweep { json } => run_sweep(&vault, json),
        // printed before the vault is opened
        Commands::Config => {}
        Commands::Golden { action } => match action {
            GoldenCommands::Add {
                id,
                label,
                skip,
                json,
            } => run_golden_add(&vault, &id, &label, skip, json),
            GoldenCommands::List { json } => run_golden_list(&vault, json),
            GoldenCommands::Skip { id, unskip } => run_golden_skip(&vault, &id, !unskip),
            GoldenCommands::Run { json } => run_golden_run(&vault, json),
        },
    }
}

fn load_config(path: Option<&Path>, root: Option<&Path>) -> Result<EffectiveConfig, VaultError> {
    let path = path.unwrap_or_else(|| Path::new("vault.toml"));
    let overrides = root.map(|r| serde_json::json!({ "root": r.to_string_lossy() }));
    Ok(EffectiveConfig::build(Some(path), overrides)?)
}

fn init_tracing(fallback_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Report an error with its public message and exit
fn fail(err: &VaultError) -> ! {
    eprintln!("Error: {}", err.to_boundary());
    process::exit(err.exit_code());
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn parse_kind(kind: &str) -> ArtifactKind {
    match kind.parse() {
        Ok(k) => k,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(EXIT_USAGE);
        }
    }
}

fn read_payloads(files: &[PathBuf]) -> Result<Vec<Payload>, VaultError> {
    let mut payloads = Vec::with_capacity(files.len());
    for path in files {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| VaultError::Validation("payload file needs a UTF-8 name".to_string()))?;
        let bytes = fs::read(path)?;
        let document = serde_json::from_slice(&bytes).map_err(|e| {
            VaultError::Validation(format!("payload '{}' is not valid JSON: {}", name, e))
        })?;
        payloads.push(Payload::new(name, document));
    }
    Ok(payloads)
}

fn run_put(vault: &Vault, kind: &str, options: PutOptions, files: &[PathBuf], json_output: bool) {
    let kind = parse_kind(kind);
    let payloads = match read_payloads(files) {
        Ok(p) => p,
        Err(e) => fail(&e),
    };
    let outcome = match vault.store.put(kind, payloads, options) {
        Ok(o) => o,
        Err(e) => fail(&VaultError::from(e)),
    };

    for warning in &outcome.warnings {
        eprintln!("warning: {}", warning);
    }
    for error in &outcome.errors {
        eprintln!("cleanup error: {}", error);
    }

    if json_output {
        print_json(&outcome.manifest);
    } else {
        println!("{}", outcome.artifact_id);
    }
}

fn run_get(vault: &Vault, id: &str) {
    match vault.store.get(id) {
        Ok(Some(bundle)) => print_json(&bundle),
        Ok(None) => {
            eprintln!("Artifact '{}' not found.", id);
            process::exit(1);
        }
        Err(e) => fail(&VaultError::from(e)),
    }
}

fn run_list(
    vault: &Vault,
    kind: Option<&str>,
    tags: Vec<String>,
    learner: Option<String>,
    limit: Option<usize>,
    json_output: bool,
) {
    let filter = ListFilter {
        kind: kind.map(parse_kind),
        tags,
        learner_id: learner,
        limit,
    };
    let manifests = match vault.store.list(&filter) {
        Ok(m) => m,
        Err(e) => fail(&VaultError::from(e)),
    };

    if json_output {
        print_json(&manifests);
        return;
    }
    if manifests.is_empty() {
        println!("No artifacts found.");
        return;
    }
    for m in manifests {
        let tags = if m.tags.is_empty() {
            String::new()
        } else {
            format!("  [{}]", m.tags.join(", "))
        };
        println!(
            "{}  {}  {}  {} file(s){}",
            m.created_at.to_rfc3339(),
            m.kind,
            m.artifact_id,
            m.files.len(),
            tags
        );
    }
}

fn run_delete(vault: &Vault, id: &str) {
    match vault.store.delete(id) {
        Ok(true) => println!("Deleted {}", id),
        Ok(false) => println!("Artifact '{}' not found; nothing deleted.", id),
        Err(e) => fail(&VaultError::from(e)),
    }
}

fn run_exists(vault: &Vault, id: &str) {
    match vault.store.exists(id) {
        Ok(true) => process::exit(0),
        Ok(false) => process::exit(1),
        Err(e) => fail(&VaultError::from(e)),
    }
}

fn run_verify(vault: &Vault, id: &str, json_output: bool) {
    let report = match vault.store.verify(id) {
        Ok(Some(r)) => r,
        Ok(None) => {
            eprintln!("Artifact '{}' not found.", id);
            process::exit(1);
        }
        Err(e) => fail(&VaultError::from(e)),
    };

    if json_output {
        print_json(&report);
    } else if report.passed() {
        println!("{}: {} file(s) verified", id, report.files_checked);
    } else {
        println!("{}: {} problem(s)", id, report.problems.len());
        for problem in &report.problems {
            println!("  {:?}", problem);
        }
    }
    if !report.passed() {
        process::exit(1);
    }
}

fn run_sweep(vault: &Vault, json_output: bool) {
    let report = match vault.store.sweep_orphans() {
        Ok(r) => r,
        Err(e) => fail(&VaultError::from(e)),
    };
    if json_output {
        print_json(&report);
    } else {
        println!(
            "Removed {} orphaned generation(s) and {} temp file(s)",
            report.generations_removed, report.temp_files_removed
        );
        for error in &report.errors {
            eprintln!("  error: {}", error);
        }
    }
}

fn run_golden_add(vault: &Vault, id: &str, label: &str, skip: bool, json_output: bool) {
    let outcome = match vault.registry.register_current(id, label, skip) {
        Ok(o) => o,
        Err(e) => fail(&e),
    };
    if json_output {
        print_json(&outcome);
    } else {
        println!("{}", outcome.message);
        for warning in &outcome.warnings {
            eprintln!("warning: {}", warning);
        }
    }
    if !outcome.ok {
        process::exit(1);
    }
}

fn run_golden_list(vault: &Vault, json_output: bool) {
    let cases = match vault.registry.cases() {
        Ok(c) => c,
        Err(e) => fail(&e),
    };
    if json_output {
        print_json(&cases);
        return;
    }
    if cases.is_empty() {
        println!("No golden cases registered.");
        return;
    }
    for case in cases {
        let marker = if case.skip { " (skipped)" } else { "" };
        println!("  {}  {}{}", case.artifact_id, case.label, marker);
    }
}

fn run_golden_skip(vault: &Vault, id: &str, skip: bool) {
    match vault.registry.set_skip(id, skip) {
        Ok(true) => println!("{} {}", if skip { "Skipped" } else { "Activated" }, id),
        Ok(false) => {
            eprintln!("No golden case for '{}'.", id);
            process::exit(1);
        }
        Err(e) => fail(&e),
    }
}

fn run_golden_run(vault: &Vault, json_output: bool) {
    let report = match vault.run_suite() {
        Ok(r) => r,
        Err(e) => fail(&e),
    };

    if json_output {
        print_json(&report);
    } else {
        for case in &report.cases {
            if case.passed() {
                continue;
            }
            println!("{} ({})", case.label, case.artifact_id);
            for entry in &case.entries {
                println!(
                    "  [{}] {}: {} -> {}",
                    entry.severity, entry.path, entry.expected, entry.actual
                );
            }
        }
        println!("{}", report.human_summary());
    }

    if report.is_failing() {
        process::exit(1);
    }
}
