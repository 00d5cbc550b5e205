//! CLI entry point for polysplit
//!
//! Parses command line arguments, fills in missing ones interactively when
//! attached to a terminal, and runs one split session.

use anyhow::{bail, Context};
use clap::Parser;
use polysplit::{
    Config, LayoutMode, ReconcileAction, ReconcileMode, Session, SessionOptions, SessionReport,
    TerminalConfirmer,
};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Name of the label file looked up when --channels is not given
const DEFAULT_LABEL_FILE: &str = "channels.txt";

/// polysplit - split multi-channel WAV/AIFF recordings into labelled mono files
#[derive(Parser, Debug)]
#[command(name = "polysplit")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory searched recursively for .wav/.aif/.aiff files
    #[arg(long)]
    src: Option<PathBuf>,

    /// Output folder (default: sibling of --src named by today's date)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Label file with one channel name per line
    #[arg(long)]
    channels: Option<PathBuf>,

    /// Output layout: flat or folders
    #[arg(long)]
    layout: Option<String>,

    /// What to do with an existing output folder: backup, overwrite, new or resume
    #[arg(long)]
    mode: Option<ReconcileMode>,

    /// Number of files processed at once (default: half the CPUs, at most 8)
    #[arg(long)]
    workers: Option<usize>,

    /// Skip the confirmation before deleting an existing folder in overwrite mode
    #[arg(long)]
    yes: bool,

    /// Log every action without writing, moving or deleting anything
    #[arg(long)]
    dry_run: bool,

    /// Zero-pad width of the channel index in output names
    #[arg(long)]
    pad: Option<usize>,

    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "polysplit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn interactive() -> bool {
    io::stdin().is_terminal()
}

/// Ask for a path on the terminal; an empty answer takes `default`
fn prompt_path(question: &str, default: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    match default {
        Some(default) => eprint!("{} [{}]: ", question, default.display()),
        None => eprint!("{}: ", question),
    }
    io::stderr().flush()?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read from terminal")?;

    let answer = answer.trim();
    if answer.is_empty() {
        Ok(default.map(Path::to_path_buf))
    } else {
        Ok(Some(PathBuf::from(answer)))
    }
}

/// Sibling of `src` named after today's date
fn default_out_dir(src: &Path) -> PathBuf {
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    // `.` and `dir/..` have no usable parent until made absolute
    let src = std::fs::canonicalize(src)
        .or_else(|_| std::path::absolute(src))
        .unwrap_or_else(|_| src.to_path_buf());
    match src.parent() {
        Some(parent) => parent.join(today),
        None => src.join(today),
    }
}

/// `./channels.txt` if present, otherwise `{src}/channels.txt`
fn default_label_file(src: &Path) -> PathBuf {
    let local = PathBuf::from(DEFAULT_LABEL_FILE);
    if local.is_file() {
        local
    } else {
        src.join(DEFAULT_LABEL_FILE)
    }
}

fn parse_layout(value: &str) -> LayoutMode {
    value.parse().unwrap_or_else(|_| {
        warn!("Unknown layout '{}', using {}", value, LayoutMode::Flat);
        LayoutMode::Flat
    })
}

/// Merge config file, environment and flags into session options
fn resolve_options(args: &Args, config: &Config) -> anyhow::Result<SessionOptions> {
    let interactive = interactive();

    let src = match &args.src {
        Some(src) => src.clone(),
        None if interactive => match prompt_path("Source folder", None)? {
            Some(src) => src,
            None => bail!("no source folder given"),
        },
        None => bail!("--src is required when not running in a terminal"),
    };

    let out = match &args.out {
        Some(out) => out.clone(),
        None => {
            let default = default_out_dir(&src);
            if interactive {
                prompt_path("Output folder", Some(&default))?.unwrap_or(default)
            } else {
                default
            }
        }
    };

    let labels_path = match &args.channels {
        Some(channels) => channels.clone(),
        None => {
            let default = default_label_file(&src);
            if interactive {
                prompt_path("Channel label file", Some(&default))?.unwrap_or(default)
            } else {
                default
            }
        }
    };

    let mut options = SessionOptions::from_config(config, src, out, labels_path);
    if let Some(layout) = &args.layout {
        options.layout = parse_layout(layout);
    }
    if let Some(mode) = args.mode {
        options.mode = mode;
    }
    if let Some(workers) = args.workers {
        options.workers = Some(workers);
    }
    if let Some(pad) = args.pad {
        options.pad_width = pad;
    }
    options.assume_yes = args.yes;
    options.dry_run = args.dry_run;

    Ok(options)
}

async fn run(args: Args) -> anyhow::Result<SessionReport> {
    let config = Config::load_or_default(args.config.as_ref())
        .context("failed to load configuration")?;
    let options = resolve_options(&args, &config)?;

    let session = Session::new(options, &config.tools)?;
    let report = session.run(&TerminalConfirmer).await?;
    Ok(report)
}

fn print_summary(report: &SessionReport, dry_run: bool) {
    let result = &report.result;

    match &report.action {
        ReconcileAction::RelocateExisting { backup } => {
            println!("Previous output moved to {}", backup.display())
        }
        ReconcileAction::RenameToUnique { requested } => {
            println!("{} already existed", requested.display())
        }
        ReconcileAction::DeleteExisting => println!("Previous output deleted"),
        ReconcileAction::KeepAsIs => {}
    }

    let verb = if dry_run { "Would write to" } else { "Output" };
    println!("{}: {}", verb, report.root.display());
    println!(
        "Files: {} planned, {} skipped, {} failed ({} channel files written, {} workers)",
        result.planned, result.skipped, result.failed, result.outputs_written, report.workers
    );

    for failure in &result.failures {
        eprintln!("  FAILED {}: {}", failure.file.display(), failure.message);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    let dry_run = args.dry_run;

    match run(args).await {
        Ok(report) => {
            print_summary(&report, dry_run);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
