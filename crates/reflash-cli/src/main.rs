//! CLI for running device flash scripts.
//!
//! Discovers `*.fs.AFC` scripts in a directory and executes them with the
//! reflash engine, printing a per-line trace and a final verdict per script.
//!
//! # Usage
//!
//! ```bash
//! # Run every script found under a directory
//! reflash run ./flash_scripts
//!
//! # Run a single script file
//! reflash run ./flash_scripts/pixel.fs.AFC
//!
//! # Load extra commands from a declaration file first
//! reflash run ./flash_scripts --registry commands.reg
//!
//! # Shorter tool timeout, JSON trace
//! reflash run ./flash_scripts --timeout 30 --format json
//!
//! # Parse a script without touching a device
//! reflash check ./flash_scripts/pixel.fs.AFC
//!
//! # List the scripts that `run` would pick up
//! reflash list ./flash_scripts
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use reflash_core::builtins::BuiltinModules;
use reflash_core::config::ReflashConfig;
use reflash_core::engine::{LineResult, ScriptEngine, ScriptReport};
use reflash_core::parser::{self, Instruction};
use reflash_core::registry::CommandRegistry;
use reflash_core::tool::{Tool, ToolRunner};

/// Script file patterns recognized by discovery, checked top-level and
/// recursively.
const SCRIPT_PATTERNS: &[&str] = &["*.fs.AFC", "*.afc", "*.AFC"];

/// Run device flash scripts against fastboot/adb/SP Flash Tool.
#[derive(Parser)]
#[command(name = "reflash")]
#[command(about = "Run device flash scripts against fastboot/adb/SP Flash Tool")]
#[command(version)]
struct Cli {
    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Execute the scripts found at a path (directory or single file)
    Run {
        /// Script file or directory to search for scripts
        path: PathBuf,
        /// Command declaration file to load before running
        #[arg(short, long, env = "REFLASH_REGISTRY")]
        registry: Option<PathBuf>,
        /// Tool invocation timeout in seconds
        #[arg(short, long, env = "REFLASH_TIMEOUT")]
        timeout: Option<u64>,
        /// Skip the fastboot availability probe
        #[arg(long)]
        no_probe: bool,
    },

    /// Parse a script and report its instructions without executing anything
    Check {
        /// Script file to check
        path: PathBuf,
        /// Command declaration file to take into account
        #[arg(short, long, env = "REFLASH_REGISTRY")]
        registry: Option<PathBuf>,
    },

    /// List the script files that `run` would execute
    List {
        /// Directory to search
        path: PathBuf,
    },
}

#[derive(Debug)]
enum CliError {
    Read(PathBuf, std::io::Error),
    NoScripts(PathBuf),
    BadPath(PathBuf),
    FastbootMissing,
    Pattern(glob::PatternError),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Read(path, source) => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            CliError::NoScripts(dir) => write!(f, "no script files found in {}", dir.display()),
            CliError::BadPath(path) => {
                write!(f, "{} is neither a file nor a directory", path.display())
            }
            CliError::FastbootMissing => write!(
                f,
                "fastboot not found; install Android platform-tools or pass --no-probe"
            ),
            CliError::Pattern(e) => write!(f, "invalid glob pattern: {}", e),
        }
    }
}

impl From<glob::PatternError> for CliError {
    fn from(e: glob::PatternError) -> Self {
        CliError::Pattern(e)
    }
}

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| CliError::Read(path.to_path_buf(), e))
}

/// Finds script files under a directory, sorted and deduplicated.
fn find_script_files(dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    let mut files = Vec::new();
    for pattern in SCRIPT_PATTERNS {
        for prefix in ["", "**/"] {
            let full = dir.join(format!("{prefix}{pattern}"));
            for entry in glob::glob(&full.to_string_lossy())? {
                if let Ok(path) = entry {
                    files.push(path);
                }
            }
        }
    }
    files.sort();
    files.dedup();
    tracing::debug!(dir = %dir.display(), count = files.len(), "discovered script files");
    Ok(files)
}

/// Resolves `run`/`list` input to the list of scripts and the directory that
/// relative image paths resolve against.
fn resolve_scripts(path: &Path) -> Result<(Vec<PathBuf>, PathBuf), CliError> {
    if path.is_dir() {
        let scripts = find_script_files(path)?;
        if scripts.is_empty() {
            return Err(CliError::NoScripts(path.to_path_buf()));
        }
        Ok((scripts, path.to_path_buf()))
    } else if path.is_file() {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok((vec![path.to_path_buf()], dir))
    } else {
        Err(CliError::BadPath(path.to_path_buf()))
    }
}

fn load_registry_file(
    engine: &mut ScriptEngine,
    path: &Path,
    quiet: bool,
) -> Result<(), CliError> {
    let text = read_file(path)?;
    let n = engine
        .registry_mut()
        .load_declarations(&text, &BuiltinModules);
    if !quiet {
        eprintln!("loaded {} dynamic command(s) from {}", n, path.display());
    }
    Ok(())
}

fn print_report_text(script: &Path, report: &ScriptReport, quiet: bool) {
    if !quiet {
        for outcome in &report.outcomes {
            match &outcome.result {
                LineResult::Success => {
                    println!("[line {}] ok      {}", outcome.line, outcome.summary);
                }
                LineResult::Failure { detail, .. } => {
                    println!(
                        "[line {}] FAILED  {} -- {}",
                        outcome.line, outcome.summary, detail
                    );
                }
            }
        }
    }
    let failed = report.failures().count();
    if report.success {
        println!("script {}: ok ({} line(s))", script.display(), report.outcomes.len());
    } else {
        println!(
            "script {}: FAILED ({} of {} line(s) failed)",
            script.display(),
            failed,
            report.outcomes.len()
        );
    }
}

fn print_report_json(script: &Path, report: &ScriptReport) {
    let value = serde_json::json!({
        "script": script.display().to_string(),
        "success": report.success,
        "outcomes": report.outcomes,
    });
    println!("{value}");
}

fn cmd_run(
    cli: &Cli,
    path: &Path,
    registry: Option<&Path>,
    timeout: Option<u64>,
    no_probe: bool,
) -> Result<bool, CliError> {
    let (scripts, script_dir) = resolve_scripts(path)?;

    let config = ReflashConfig::load();
    let mut runner = ToolRunner::from_config(&script_dir, &config);
    if let Some(secs) = timeout {
        runner = runner.with_timeout(Duration::from_secs(secs));
    }
    if !no_probe && !runner.probe(Tool::Fastboot) {
        return Err(CliError::FastbootMissing);
    }

    let mut engine = ScriptEngine::new(Arc::new(runner));
    if let Some(reg) = registry {
        load_registry_file(&mut engine, reg, cli.quiet)?;
    }

    let mut all_ok = true;
    for script in &scripts {
        if !cli.quiet && cli.format == OutputFormat::Text {
            println!("== running {} ==", script.display());
        }
        let content = read_file(script)?;
        let report = engine.execute(&content);
        match cli.format {
            OutputFormat::Text => print_report_text(script, &report, cli.quiet),
            OutputFormat::Json => print_report_json(script, &report),
        }
        if !report.success {
            all_ok = false;
        }
    }
    Ok(all_ok)
}

fn cmd_check(cli: &Cli, path: &Path, registry: Option<&Path>) -> Result<bool, CliError> {
    let content = read_file(path)?;

    let mut names = CommandRegistry::new();
    reflash_core::builtins::register_builtins(&mut names);
    if let Some(reg) = registry {
        let text = read_file(reg)?;
        names.load_declarations(&text, &BuiltinModules);
    }

    let mut assignments = 0usize;
    let mut invocations = 0usize;
    let mut problems: Vec<(usize, String)> = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        match parser::parse_line(line) {
            Instruction::Skip => {}
            Instruction::Assign { .. } => assignments += 1,
            Instruction::Invoke { command, .. } => {
                invocations += 1;
                if !names.contains(&command) {
                    problems.push((idx + 1, format!("unknown command '{command}'")));
                }
            }
            Instruction::Unrecognized { line } => {
                problems.push((idx + 1, format!("unrecognized line: {line}")));
            }
        }
    }

    let clean = problems.is_empty();
    if cli.format == OutputFormat::Json {
        let value = serde_json::json!({
            "script": path.display().to_string(),
            "assignments": assignments,
            "invocations": invocations,
            "problems": problems
                .iter()
                .map(|(line, detail)| serde_json::json!({ "line": line, "detail": detail }))
                .collect::<Vec<_>>(),
        });
        println!("{value}");
    } else {
        for (line, detail) in &problems {
            println!("[line {line}] {detail}");
        }
        println!(
            "{}: {} assignment(s), {} invocation(s), {} problem(s)",
            path.display(),
            assignments,
            invocations,
            problems.len()
        );
    }
    Ok(clean)
}

fn cmd_list(cli: &Cli, path: &Path) -> Result<bool, CliError> {
    let (scripts, _) = resolve_scripts(path)?;
    if cli.format == OutputFormat::Json {
        let value = serde_json::json!({
            "scripts": scripts
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>(),
        });
        println!("{value}");
    } else {
        for script in &scripts {
            println!("{}", script.display());
        }
    }
    Ok(true)
}

fn run(cli: &Cli) -> Result<bool, CliError> {
    match &cli.command {
        Command::Run {
            path,
            registry,
            timeout,
            no_probe,
        } => cmd_run(cli, path, registry.as_deref(), *timeout, *no_probe),
        Command::Check { path, registry } => cmd_check(cli, path, registry.as_deref()),
        Command::List { path } => cmd_list(cli, path),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}
