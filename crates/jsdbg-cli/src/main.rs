use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use jsdbg_breakpoints::{
    entry_breakpoint_pattern, BreakpointsPredictor, SetBreakpointsRequest, SourceBreakpoint,
    WorkspaceLocation,
};
use jsdbg_config::{init_tracing, BreakOnLoadStrategy, LaunchConfig};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "jsdbg", version, about = "jsdbg breakpoint tools (prediction, entry patterns)")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a project's compiled output and predict where source breakpoints bind
    Predict(PredictArgs),
    /// Print the entry breakpoint URL pattern used for a source file
    Pattern(PatternArgs),
    /// Validate a launch configuration and print it with defaults filled in
    Config(ConfigArgs),
}

#[derive(Args)]
struct PredictArgs {
    /// Launch configuration (`.toml` or `.json`)
    #[arg(long)]
    config: PathBuf,
    /// Source breakpoint as `path:line[:column]`; relative paths are resolved against `rootPath`
    #[arg(long = "breakpoint", short = 'b')]
    breakpoints: Vec<String>,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct PatternArgs {
    /// Source file paths or URLs
    #[arg(required = true)]
    files: Vec<String>,
}

#[derive(Args)]
struct ConfigArgs {
    /// Launch configuration (`.toml` or `.json`)
    path: PathBuf,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictionReport {
    root_path: PathBuf,
    strategy: BreakOnLoadStrategy,
    indexed_sources: usize,
    elapsed_ms: u64,
    breakpoints: Vec<BreakpointPrediction>,
}

#[derive(Debug, Serialize)]
struct BreakpointPrediction {
    source: WorkspaceLocation,
    compiled: Vec<WorkspaceLocation>,
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Predict(args) => predict(args),
        Command::Pattern(args) => {
            for file in &args.files {
                println!("{}", entry_breakpoint_pattern(file));
            }
            Ok(0)
        }
        Command::Config(args) => {
            let config = LaunchConfig::load_from_path(&args.path)
                .with_context(|| format!("invalid launch configuration {}", args.path.display()))?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(0)
        }
    }
}

fn predict(args: PredictArgs) -> Result<i32> {
    let config = LaunchConfig::load_from_path(&args.config)
        .with_context(|| format!("invalid launch configuration {}", args.config.display()))?;
    init_tracing(&config.logging);

    let requests = args
        .breakpoints
        .iter()
        .map(|spec| parse_breakpoint(spec, &config.root_path))
        .collect::<Result<Vec<_>>>()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    let report = runtime.block_on(async {
        let predictor = BreakpointsPredictor::from_config(&config)?;
        let started = Instant::now();
        predictor.prepare_to_predict().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            target = "jsdbg.cli",
            root = %config.root_path.display(),
            elapsed_ms,
            "workspace scan complete"
        );

        let mut breakpoints = Vec::with_capacity(requests.len());
        for (path, breakpoint) in requests {
            let source = WorkspaceLocation::new(&path, breakpoint.line, breakpoint.column.unwrap_or(1));
            predictor
                .predict_breakpoints(&SetBreakpointsRequest::new(&path, vec![breakpoint]))
                .await;
            breakpoints.push(BreakpointPrediction {
                compiled: predictor.predicted_resolved_locations(&source),
                source,
            });
        }

        anyhow::Ok(PredictionReport {
            root_path: config.root_path.clone(),
            strategy: config.break_on_load_strategy,
            indexed_sources: predictor.indexed_source_count().await,
            elapsed_ms,
            breakpoints,
        })
    })?;

    print_report(&report, args.json)?;
    let unresolved = report.breakpoints.iter().any(|bp| bp.compiled.is_empty());
    Ok(if unresolved { 1 } else { 0 })
}

/// `path:line[:column]`, split from the right so Windows drive letters survive.
fn parse_breakpoint(spec: &str, root: &Path) -> Result<(PathBuf, SourceBreakpoint)> {
    let (head, last) = spec
        .rsplit_once(':')
        .with_context(|| format!("breakpoint `{spec}` must look like path:line[:column]"))?;
    let last = parse_number(last, spec)?;
    let numbered_line = head
        .rsplit_once(':')
        .and_then(|(path, line)| Some((path, line.parse::<u32>().ok()?)));
    let (path, line, column) = match numbered_line {
        Some((path, line)) => (path, line, Some(last)),
        None => (head, last, None),
    };
    if line == 0 {
        bail!("breakpoint `{spec}` has line 0; lines are 1-based");
    }
    if column == Some(0) {
        bail!("breakpoint `{spec}` has column 0; columns are 1-based");
    }

    let path = PathBuf::from(path);
    let path = if path.is_absolute() { path } else { root.join(path) };
    Ok((path, SourceBreakpoint { line, column }))
}

fn parse_number(text: &str, spec: &str) -> Result<u32> {
    text.parse()
        .with_context(|| format!("breakpoint `{spec}` has a non-numeric position `{text}`"))
}

fn print_report(report: &PredictionReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("root: {}", report.root_path.display());
    println!("  strategy: {}", report.strategy);
    println!("  indexed_sources: {}", report.indexed_sources);
    println!("  elapsed_ms: {}", report.elapsed_ms);
    for prediction in &report.breakpoints {
        let source = &prediction.source;
        if prediction.compiled.is_empty() {
            println!(
                "{}:{}:{} -> (unresolved)",
                source.absolute_path.display(),
                source.line_number,
                source.column_number
            );
        }
        for compiled in &prediction.compiled {
            println!(
                "{}:{}:{} -> {}:{}:{}",
                source.absolute_path.display(),
                source.line_number,
                source.column_number,
                compiled.absolute_path.display(),
                compiled.line_number,
                compiled.column_number
            );
        }
    }
    Ok(())
}
