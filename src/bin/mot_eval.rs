use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mot_eval::{fetch_dataset, load_model, RunConfig, RunReport, SequenceRunner};

#[derive(Parser)]
#[command(
    name = "mot-eval",
    about = "Run a tracking model over MOTChallenge sequences and score the results",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download and extract a benchmark archive
    Fetch(FetchArgs),
    /// Run inference on sequences, then evaluate them
    Run(RunArgs),
    /// Evaluate result files of an earlier run
    Eval(EvalArgs),
}

#[derive(Args)]
struct FetchArgs {
    /// Base URL the archive is served from
    #[arg(long, default_value = "https://motchallenge.net/data")]
    base_url: String,

    /// Archive file name, e.g. MOT17.zip
    #[arg(long)]
    archive: String,

    /// Directory the dataset is extracted into
    #[arg(long, default_value = "data")]
    dest: PathBuf,

    /// Download again even if the dataset is already extracted
    #[arg(long)]
    force: bool,
}

/// Options shared by `run` and `eval`; each overrides the config file.
#[derive(Args)]
struct SplitArgs {
    /// JSON run configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Split directory containing one directory per sequence
    #[arg(long)]
    data_root: Option<PathBuf>,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Experiment name; results go to <output-dir>/<exp>/
    #[arg(long)]
    exp: Option<String>,

    /// Sequence names, in processing order
    #[arg(long = "seq", num_args = 1..)]
    sequences: Vec<String>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    split: SplitArgs,

    /// Model checkpoint
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    #[arg(long)]
    conf_thres: Option<f64>,

    #[arg(long)]
    track_buffer: Option<u32>,

    /// Only write result files
    #[arg(long)]
    no_eval: bool,
}

#[derive(Args)]
struct EvalArgs {
    #[command(flatten)]
    split: SplitArgs,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match Cli::parse().command {
        Command::Fetch(args) => fetch(args),
        Command::Run(args) => run(args),
        Command::Eval(args) => eval(args),
    }
}

fn fetch(args: FetchArgs) -> anyhow::Result<()> {
    let layout = fetch_dataset(&args.base_url, &args.archive, &args.dest, !args.force)
        .with_context(|| format!("fetching {}", args.archive))?;
    println!("train: {}", layout.train_dir.display());
    println!("test:  {}", layout.test_dir.display());
    Ok(())
}

fn load_config(split: SplitArgs) -> anyhow::Result<RunConfig> {
    let mut config = match &split.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(data_root) = split.data_root {
        config.data_root = data_root;
    }
    if let Some(output_dir) = split.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(exp) = split.exp {
        config.exp_name = exp;
    }
    if !split.sequences.is_empty() {
        config.sequences = split.sequences;
    }
    Ok(config)
}

fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.split)?;
    if let Some(checkpoint) = args.checkpoint {
        config.checkpoint = Some(checkpoint);
    }
    if let Some(conf_thres) = args.conf_thres {
        config.conf_thres = conf_thres;
    }
    if let Some(track_buffer) = args.track_buffer {
        config.track_buffer = track_buffer;
    }
    if args.no_eval {
        config.run_eval = false;
    }
    config.validate()?;

    let Some(checkpoint) = config.checkpoint.as_ref() else {
        bail!("no checkpoint given (--checkpoint or \"checkpoint\" in the config file)");
    };
    let mut model = load_model(checkpoint)
        .with_context(|| format!("loading model from {}", checkpoint.display()))?;

    let runner = config.runner()?;
    let report = runner.run(model.as_mut(), &config.sequences);
    for path in report.result_files() {
        info!(path = %path.display(), "result file");
    }

    if config.run_eval {
        report_summary(&runner, &report)?;
    }
    Ok(())
}

fn eval(args: EvalArgs) -> anyhow::Result<()> {
    let config = load_config(args.split)?;
    config.validate()?;

    let runner = config.runner()?;
    let report = runner.evaluate(&config.sequences);
    report_summary(&runner, &report)
}

fn report_summary(runner: &SequenceRunner, report: &RunReport) -> anyhow::Result<()> {
    let failed: Vec<&str> = report.failed().map(|(name, _)| name).collect();
    if !failed.is_empty() {
        warn!(sequences = ?failed, "sequences without results");
    }

    let summary = report.summary();
    print!("{}", summary);
    let path = runner
        .save_summary(&summary)
        .context("saving summary")?;
    info!(path = %path.display(), "summary saved");
    Ok(())
}
