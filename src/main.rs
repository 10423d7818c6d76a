use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use flate2::read::GzDecoder;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use proguard_retrace::{Retrace, RetraceOptions};

/// Retrace obfuscated Java stack traces using a proguard mapping file.
#[derive(Debug, Parser)]
#[command(name = "proguard-retrace", version, about)]
struct Args {
    /// Print field types and full method signatures.
    #[arg(long)]
    verbose: bool,

    /// Replace every obfuscated class name, also outside of stack frames.
    #[arg(long)]
    all_class_names: bool,

    /// Custom line template, using placeholders like `%c` and `%m`.
    #[arg(long, value_name = "TEMPLATE")]
    regex: Option<String>,

    /// The mapping file, optionally gzip compressed (`.gz`).
    mapping: PathBuf,

    /// The obfuscated stack trace, optionally gzip compressed (`.gz`).
    stacktrace: PathBuf,
}

impl Args {
    fn options(&self) -> RetraceOptions {
        RetraceOptions {
            verbose: self.verbose,
            all_class_names: self.all_class_names,
            regex: self.regex.clone(),
        }
    }
}

fn open(path: &Path) -> anyhow::Result<Box<dyn BufRead>> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;

    if path.extension().map_or(false, |ext| ext == "gz") {
        debug!(path = %path.display(), "reading gzip compressed input");
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let mapping = open(&args.mapping)?;
    let retrace = Retrace::from_mapping(mapping, &args.options())
        .with_context(|| format!("failed to load mapping {}", args.mapping.display()))?;

    let stacktrace = open(&args.stacktrace)?;
    retrace
        .retrace(stacktrace, io::stdout().lock())
        .with_context(|| format!("failed to retrace {}", args.stacktrace.display()))?;

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}
