//! nbtex CLI - Jupyter notebooks to PDF lecture notes.

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::Parser;
use nbtex::{BuildOutcome, Options, UnknownTokens};

#[derive(Parser)]
#[command(name = "nbtex")]
#[command(about = "Converts Jupyter notebooks to PDF through LaTeX")]
#[command(version)]
struct Cli {
    /// Notebook to convert
    notebook: PathBuf,

    /// Show compiler output and let it stop on errors
    #[arg(short, long)]
    interactive: bool,

    /// Reuse the build directory between runs
    #[arg(long)]
    cache: bool,

    /// Destination of the PDF (an existing directory gets the file inside it)
    #[arg(short)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    let mut options = Options {
        interactive: cli.interactive,
        use_cache: cli.cache,
        ..Options::default()
    };
    if cli.interactive {
        options.render.unknown_tokens = UnknownTokens::Prompt;
    }

    let destination = nbtex::output_path(&cli.notebook, cli.output.as_deref())
        .context("Could not prepare the output location")?;
    let outcome = nbtex::convert(&cli.notebook, &destination, &options)
        .with_context(|| format!("Could not convert {}", cli.notebook.display()))?;

    Ok(match outcome {
        BuildOutcome::Built(path) => {
            tracing::info!(path = %path.display(), "Done");
            ExitCode::SUCCESS
        }
        BuildOutcome::Failed { .. } => ExitCode::FAILURE,
    })
}
