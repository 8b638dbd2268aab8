//! gridlink command-line client
//!
//! Runs entity queries and mutations against the live tracking service, or
//! against an in-memory emulation seeded from schema files.
//!
//! Usage:
//!   gridlink find Shot --filters '[["code", "is", "sh010"]]' --fields code
//!   gridlink --schema-dir fixtures/ create Shot '{"code": "sh010"}'
//!
//! Live mode reads SHOTGRID_URL, SHOTGRID_SCRIPT_NAME and SHOTGRID_SCRIPT_KEY.

use anyhow::{Context, Result};
use clap::Parser;
use gridlink_cli::{Command, run, select_factory};
use std::path::PathBuf;
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "gridlink")]
#[command(about = "Query and edit production-tracking entities")]
struct Args {
    /// Directory holding schema.json and schema_entity.json; selects the
    /// in-memory emulation instead of the live service
    #[arg(short, long)]
    schema_dir: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let factory = select_factory(args.schema_dir.as_deref())?;
    let output = run(factory.as_ref(), &args.command)?;
    debug!("Command finished");

    let rendered = serde_json::to_string_pretty(&output).context("Failed to render output")?;
    println!("{rendered}");
    Ok(())
}
