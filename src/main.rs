mod ast;
mod catalog;
mod checker;
mod config;
mod diagnostic;
mod explorer;
mod interpreter;
mod lowering;
mod render;
mod scan;
mod state;
mod telemetry;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;

use crate::catalog::LockCatalog;
use crate::checker::FunctionChecker;
use crate::diagnostic::Diagnostic;

/// CLI arguments for lockbalance execution.
#[derive(Parser, Debug)]
#[command(
    name = "lockbalance",
    about = "Static analysis for lock-acquisition balance in C source files.",
    version
)]
struct Cli {
    #[arg(
        long,
        value_name = "PATH",
        required = true,
        num_args = 1..,
        help = "C source files or directories to analyze. Use @file to read paths (one per line)."
    )]
    input: Vec<String>,
    #[arg(
        long,
        value_name = "PATH",
        help = "Load the lock catalog from this TOML file instead of discovering lockbalance.toml."
    )]
    config: Option<PathBuf>,
    #[arg(
        long,
        value_name = "NAMES",
        value_delimiter = ',',
        help = "Restrict analysis to these lock families (comma-separated; default is every configured family)."
    )]
    families: Option<Vec<String>>,
    #[arg(long, help = "Suppress diagnostic output; only the exit code reflects the result.")]
    quiet: bool,
    #[arg(long, help = "Print a timing summary to stderr after the run.")]
    timing: bool,
}

fn main() -> std::process::ExitCode {
    telemetry::init_logging();
    let cli = Cli::parse();
    match run(cli) {
        Ok(RunOutcome::Clean) => std::process::ExitCode::SUCCESS,
        Ok(RunOutcome::DiagnosticsFound) => std::process::ExitCode::from(1),
        Err(err) => {
            eprintln!("{err:?}");
            std::process::ExitCode::from(2)
        }
    }
}

/// Whether a run found lock-balance diagnostics. Distinguished from an
/// operational failure (`Err`) so the two can map to distinct exit codes:
/// 1 for diagnostics found, 2 for a file that could not be read, lowered, or
/// a malformed catalog.
enum RunOutcome {
    Clean,
    DiagnosticsFound,
}

#[tracing::instrument(level = "info", skip_all)]
fn run(cli: Cli) -> Result<RunOutcome> {
    let started_at = Instant::now();
    let expanded = expand_input_args(&cli.input)?;
    let files = scan::collect_c_files(&expanded)?;
    if files.is_empty() {
        anyhow::bail!("no .c input files found among the given inputs");
    }

    let catalog = load_catalog(&cli)?;

    let outcomes: Vec<Result<Vec<Diagnostic>>> =
        files.par_iter().map(|path| analyze_file(path, &catalog)).collect();

    let mut diagnostics = Vec::new();
    let mut failures = Vec::new();
    for (path, outcome) in files.iter().zip(outcomes) {
        match outcome {
            Ok(mut found) => diagnostics.append(&mut found),
            Err(err) => failures.push((path.clone(), err)),
        }
    }
    diagnostics.sort();

    if !cli.quiet {
        for diagnostic in &diagnostics {
            println!("{diagnostic}");
        }
    }
    for (path, err) in &failures {
        eprintln!("{}: {err:?}", path.display());
    }

    if cli.timing && !cli.quiet {
        eprintln!(
            "timing: total_ms={} files={} diagnostics={}",
            started_at.elapsed().as_millis(),
            files.len(),
            diagnostics.len()
        );
    }

    if !failures.is_empty() {
        anyhow::bail!("{} of {} input files failed to parse or lower", failures.len(), files.len());
    }
    if diagnostics.is_empty() {
        Ok(RunOutcome::Clean)
    } else {
        Ok(RunOutcome::DiagnosticsFound)
    }
}

fn load_catalog(cli: &Cli) -> Result<LockCatalog> {
    let catalog = match &cli.config {
        Some(path) => config::load_catalog_from(path)?,
        None => {
            let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            config::load_catalog(&base_dir)?
        }
    };
    match &cli.families {
        Some(names) => catalog.restrict(names),
        None => Ok(catalog),
    }
}

#[tracing::instrument(level = "debug", skip_all, fields(file = %path.display()))]
fn analyze_file(path: &Path, catalog: &LockCatalog) -> Result<Vec<Diagnostic>> {
    let source = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let funcs = lowering::lower_source(&source).with_context(|| format!("lowering {}", path.display()))?;
    let checker = FunctionChecker::new(catalog, path.display().to_string());
    Ok(funcs.iter().flat_map(|func| checker.check(func)).collect())
}

/// Expands `--input` arguments, following `@listfile` references (one path
/// per line, blank and `#`-prefixed lines ignored, relative entries resolved
/// against the *list file's own* directory rather than the CLI's cwd) with a
/// cycle guard against a listfile that includes itself.
fn expand_input_args(args: &[String]) -> Result<Vec<PathBuf>> {
    let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut expanded = Vec::new();
    let mut stack = Vec::new();
    for arg in args {
        expanded.extend(expand_arg(arg, &base_dir, &mut stack)?);
    }
    Ok(expanded)
}

fn expand_arg(arg: &str, base_dir: &Path, stack: &mut Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let Some(path_str) = arg.strip_prefix('@') else {
        return Ok(vec![PathBuf::from(arg)]);
    };
    if path_str.is_empty() {
        anyhow::bail!("empty @file reference");
    }
    let file_path = PathBuf::from(path_str);
    let resolved = if file_path.is_absolute() { file_path } else { base_dir.join(file_path) };
    let canonical = resolved
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", resolved.display()))?;
    if stack.contains(&canonical) {
        anyhow::bail!("circular @file reference: {}", canonical.display());
    }
    let content = fs::read_to_string(&canonical).with_context(|| format!("failed to read {}", canonical.display()))?;
    stack.push(canonical.clone());
    let file_dir = canonical.parent().unwrap_or_else(|| Path::new(""));
    let mut paths = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('@') {
            paths.extend(expand_arg(line, file_dir, stack)?);
            continue;
        }
        let entry = PathBuf::from(line);
        let resolved_entry = if entry.is_absolute() { entry } else { file_dir.join(entry) };
        paths.push(resolved_entry);
    }
    stack.pop();
    Ok(paths)
}
