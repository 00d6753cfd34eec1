// ABOUTME: Entry point for the isadoc binary.
// ABOUTME: Parses CLI arguments, initializes tracing, and runs emit, header or batch commands.

mod config;

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use isadoc_core::{EmitError, InstructionRecord, emit_yaml};
use isadoc_loader::{BatchOptions, convert_dir, load_record_file, write_header};

use crate::config::IsadocConfig;

#[derive(Parser, Debug)]
#[command(name = "isadoc")]
#[command(
    version,
    about = "Emit schema-conformant YAML for ISA instruction records",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Emit one instruction record (.yaml, .yml, .json or .h) as YAML
    Emit {
        /// Input record file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Write one instruction record as a C header of #define macros
    Header {
        /// Input record file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Convert every instruction record in a directory
    Batch {
        /// Directory holding record files
        #[arg(value_name = "DIR")]
        input: PathBuf,

        /// Output directory (default: ISADOC_OUTPUT_DIR or ./out)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Replace existing output files
        #[arg(long)]
        overwrite: bool,
    },
}

/// What a single-record command writes.
#[derive(Debug, Clone, Copy)]
enum Rendering {
    Yaml,
    Header,
}

impl Rendering {
    fn write<W: Write>(self, record: &InstructionRecord, sink: &mut W) -> Result<(), EmitError> {
        match self {
            Rendering::Yaml => emit_yaml(record, sink),
            Rendering::Header => write_header(record, sink),
        }
    }
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("isadoc=info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Emit { input, output } => write_one(&input, output.as_deref(), Rendering::Yaml),
        Command::Header { input, output } => {
            write_one(&input, output.as_deref(), Rendering::Header)
        }
        Command::Batch {
            input,
            output,
            overwrite,
        } => {
            let config = IsadocConfig::from_env().context("invalid configuration")?;
            let output = output.unwrap_or(config.output_dir);
            let options = BatchOptions {
                overwrite: overwrite || config.overwrite,
            };
            let report = convert_dir(&input, &output, &options)
                .with_context(|| format!("batch conversion of {}", input.display()))?;

            for (path, message) in &report.failed {
                tracing::error!(input = %path.display(), "{message}");
            }
            if !report.is_success() {
                bail!(
                    "{} of {} inputs failed",
                    report.failed.len(),
                    report.failed.len() + report.converted.len() + report.skipped.len()
                );
            }
            Ok(())
        }
    }
}

fn write_one(input: &Path, output: Option<&Path>, rendering: Rendering) -> Result<()> {
    let record = load_record_file(input)?;

    let Some(path) = output else {
        let stdout = io::stdout();
        let mut sink = stdout.lock();
        rendering.write(&record, &mut sink).context("writing to stdout")?;
        sink.flush()?;
        return Ok(());
    };

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut sink = BufWriter::new(file);
    let result = rendering
        .write(&record, &mut sink)
        .map_err(anyhow::Error::from)
        .and_then(|()| sink.flush().map_err(anyhow::Error::from));
    drop(sink);
    if let Err(err) = result {
        let _ = fs::remove_file(path);
        return Err(err.context(format!("writing {}", path.display())));
    }

    tracing::info!(name = %record.name, output = %path.display(), ?rendering, "wrote instruction");
    Ok(())
}
