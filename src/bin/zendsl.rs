//! ZenDSL command line interface.
//!
//! # Usage
//!
//! ```bash
//! # Bind a script without running it
//! zendsl parse --file script.zen
//!
//! # Run a script against host documents
//! zendsl run --file script.zen -a data.json -k keys.json
//!
//! # Scripts can also arrive on stdin
//! echo "Scenario 'eddsa'..." | zendsl run
//! ```
//!
//! On success exactly one JSON document is written to stdout; on any
//! failure the traceback goes to stderr and the exit code is non-zero.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use zendsl::{Engine, EngineError};

#[derive(Parser)]
#[command(name = "zendsl")]
#[command(version = "0.1.0")]
#[command(about = "Parse and run ZenDSL scripts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Failure diagnostics format
    #[arg(long, short = 'o', global = true, default_value = "text", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and bind a script without executing it
    Parse {
        /// Script file (reads stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Parse and execute a script
    Run {
        /// Script file (reads stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Input JSON document (DATA)
        #[arg(short = 'a', long)]
        data: Option<PathBuf>,

        /// Key-material JSON document (KEYS)
        #[arg(short = 'k', long)]
        keys: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match dispatch(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_failure(&err, cli.format);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Parse { file } => {
            let source = read_source(file.as_ref())?;
            let mut engine = Engine::new();
            let script = engine.parse(&source)?;
            eprintln!("bound {} steps", script.len());
            Ok(())
        }
        Commands::Run { file, data, keys } => {
            let source = read_source(file.as_ref())?;
            let data = read_optional(data.as_ref())?;
            let keys = read_optional(keys.as_ref())?;
            let mut engine = Engine::new();
            let script = engine.parse(&source)?;
            let out = engine.run(&script, data.as_deref(), keys.as_deref())?;
            if let Some(doc) = out {
                println!("{doc}");
            }
            Ok(())
        }
    }
}

fn read_source(file: Option<&PathBuf>) -> anyhow::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("could not read script {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("could not read script from stdin")?;
            Ok(buf)
        }
    }
}

fn read_optional(file: Option<&PathBuf>) -> anyhow::Result<Option<String>> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .map(Some)
            .with_context(|| format!("could not read document {}", path.display())),
        None => Ok(None),
    }
}

fn report_failure(err: &anyhow::Error, format: OutputFormat) {
    let engine_err = err.downcast_ref::<EngineError>();
    match format {
        OutputFormat::Text => {
            if let Some(report) = engine_err.and_then(EngineError::report) {
                eprint!("{report}");
            }
            eprintln!("error: {err:#}");
        }
        OutputFormat::Json => {
            let dump = engine_err
                .and_then(EngineError::debug_dump)
                .cloned()
                .unwrap_or_else(|| serde_json::json!({ "error": format!("{err:#}") }));
            eprintln!("{dump}");
        }
    }
}
