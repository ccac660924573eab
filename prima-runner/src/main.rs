mod progress;
mod util;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;

use prima_core::{
    ConfigurationRegistry, DEFAULT_DATASET, DEFAULT_PATTERN, DEFAULT_RESULTS, EngineOptions,
    Experiment, ExperimentSummary, RunnerOptions, parse_seed,
};
use progress::ConsoleProgress;
use util::{seconds, split_csv, timestamp};

#[derive(Debug, Parser)]
#[command(name = "prima-runner", version = "0.1.0")]
#[command(
    about = "Runs every configuration against every scenario and writes one CSV report per configuration"
)]
struct Args {
    /// Directory holding the scenario files and their .properties metadata
    #[arg(long, default_value = DEFAULT_DATASET)]
    dataset: PathBuf,

    /// Directory the per-configuration reports are written to
    #[arg(long, default_value = DEFAULT_RESULTS)]
    results: PathBuf,

    /// File-name glob selecting scenario files inside the dataset directory
    #[arg(long, default_value = DEFAULT_PATTERN)]
    pattern: String,

    /// Base seed for the whole batch (decimal or 0x-prefixed hex)
    #[arg(long, default_value = "123", value_parser = parse_seed_arg)]
    seed: u64,

    /// Runs per configuration and scenario
    #[arg(long, default_value_t = 1)]
    repeat: usize,

    /// Worker threads (defaults to the available parallelism)
    #[arg(long)]
    threads: Option<usize>,

    /// Configurations to run (comma-separated names, default: all)
    #[arg(long)]
    configs: Option<String>,

    /// Load the configuration registry from a JSON file instead of the built-in set
    #[arg(long)]
    configurations: Option<PathBuf>,

    /// List the available configurations and exit
    #[arg(long)]
    list_configs: bool,

    /// Simulated minutes after which the built-in engine reports a timeout
    #[arg(long, value_parser = parse_minutes_arg)]
    max_sim_minutes: Option<f64>,

    /// Summary format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["console", "json"])]
    report: String,

    /// Only print the final summary
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the summary to instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn parse_seed_arg(token: &str) -> std::result::Result<u64, String> {
    parse_seed(token).ok_or_else(|| format!("{token:?} is not a valid seed"))
}

fn parse_minutes_arg(token: &str) -> std::result::Result<f64, String> {
    match token.trim().parse::<f64>() {
        Ok(minutes) if minutes.is_finite() && minutes > 0.0 => Ok(minutes),
        Ok(_) => Err(format!("{token:?} must be a finite number of minutes above zero")),
        Err(e) => Err(format!("{token:?} is not a number: {e}")),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let registry = load_registry(&args)?;
    if args.list_configs {
        return list_configs(&args, &registry);
    }

    if !args.quiet {
        announce_banner(&args, &registry);
    }

    let experiment = build_experiment(&args, registry);
    let mut progress = ConsoleProgress::new(args.quiet);
    let summary = experiment
        .perform(&mut progress)
        .with_context(|| format!("experiment on {} failed", args.dataset.display()))?;

    write_summary(&args, &summary)
}

fn init_logging(args: &Args) {
    let level = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_registry(args: &Args) -> Result<ConfigurationRegistry> {
    let registry = match &args.configurations {
        Some(path) => ConfigurationRegistry::from_json_file(path)
            .with_context(|| format!("failed to load configurations from {}", path.display()))?,
        None => ConfigurationRegistry::defaults(),
    };
    let Some(selection) = &args.configs else {
        return Ok(registry);
    };
    let names = split_csv(selection);
    if names.is_empty() {
        bail!("--configs needs at least one configuration name");
    }
    registry
        .select(&names)
        .context("invalid --configs selection")
}

fn build_experiment(args: &Args, registry: ConfigurationRegistry) -> Experiment {
    let mut engine_options = EngineOptions::default();
    if let Some(limit) = args.max_sim_minutes {
        engine_options.max_sim_minutes = limit;
    }
    Experiment::new()
        .dataset(&args.dataset)
        .results(&args.results)
        .pattern(&args.pattern)
        .registry(registry)
        .options(RunnerOptions {
            base_seed: args.seed,
            repeats: args.repeat,
            threads: args.threads,
        })
        .engine_options(engine_options)
}

fn list_configs(args: &Args, registry: &ConfigurationRegistry) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available configurations:")?;
    for configuration in registry {
        writeln!(
            output_target.writer(),
            "  {:28} - {}",
            configuration.name,
            configuration.strategy
        )?;
    }
    output_target.flush_inner()?;
    Ok(())
}

fn announce_banner(args: &Args, registry: &ConfigurationRegistry) {
    println!("{}", "🚚 Prima Experiment Runner".bright_cyan().bold());
    println!("{}", "==========================".cyan());
    println!("Started:        {}", timestamp());
    println!("Dataset:        {}", args.dataset.display());
    println!("Results:        {}", args.results.display());
    println!("Configurations: {}", registry.names().join(", "));
    println!("Seed:           {}", args.seed);
    println!("Repeats:        {}", args.repeat);
}

fn write_summary(args: &Args, summary: &ExperimentSummary) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;
    if args.report == "json" {
        let reports: Vec<serde_json::Value> = summary
            .reports
            .iter()
            .map(|r| {
                serde_json::json!({
                    "configuration": r.configuration,
                    "path": r.path.display().to_string(),
                    "rows": r.rows,
                    "invalid": r.invalid,
                    "failed": r.failed,
                })
            })
            .collect();
        let value = serde_json::json!({
            "simulations": summary.simulations,
            "failed": summary.failed,
            "invalid": summary.invalid,
            "seconds": summary.elapsed.as_secs_f64(),
            "reports": reports,
        });
        serde_json::to_writer_pretty(&mut output_target, &value)?;
        writeln!(output_target)?;
    } else {
        writeln!(
            output_target,
            "Done, computed {} simulations in {}s",
            summary.simulations,
            seconds(summary.elapsed)
        )?;
        for report in &summary.reports {
            writeln!(
                output_target,
                "  📄 {}: {} row(s) -> {}",
                report.configuration,
                report.rows,
                report.path.display()
            )?;
        }
        if summary.invalid > 0 || summary.failed > 0 {
            writeln!(
                output_target,
                "⚠️  {} invalid result(s), {} failed run(s)",
                summary.invalid, summary.failed
            )?;
        }
    }
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
