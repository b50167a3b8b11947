//! # reqz-cli
//!
//! Command-line interface for the reqz request language.
//!
//! Loads the request file, merges the `.reqzrc` configuration with the
//! variables given after the file, and runs the request once or, with
//! `--play`, once per row of a CSV file.

mod errors;
mod vars;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use reqz_eval::config::parse_delimiter;
use reqz_eval::{Config, QuietLogger, RequestModule, Services, StdinPrompter, play_file};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use errors::enhance_error;
use vars::parse_vars;

#[derive(Parser)]
#[command(name = "reqz")]
#[command(about = "Run HTTP requests described in .req files", long_about = None)]
#[command(version)]
struct Cli {
    /// The request file to run
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Do not print anything
    #[arg(short, long)]
    quiet: bool,

    /// Log every request of the chain, not only the main one
    #[arg(short, long)]
    all: bool,

    /// Log switches separated by commas: req,reqh,reqb,resh,resb
    #[arg(short, long, value_name = "SPEC")]
    log: Option<String>,

    /// Run the request once per row of a CSV file whose header names the variables
    #[arg(short, long, value_name = "CSV")]
    play: Option<PathBuf>,

    /// Column delimiter of the --play file
    #[arg(short, long = "col-delimiter", value_name = "CHAR")]
    col_delimiter: Option<String>,

    /// Print internal diagnostics
    #[arg(short, long)]
    verbose: bool,

    /// Variables as --name value pairs
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "VARS")]
    vars: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file = cli.file.display().to_string();
    if let Err(err) = run(cli) {
        enhance_error(err, &file).display();
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("REQZ_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let dir = cli
        .file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut config = Config::load(dir).unwrap_or_else(|e| {
        eprintln!("{} Failed to load config: {:#}", "⚠".yellow().bold(), e);
        Config::default()
    });

    if let Some(log) = &cli.log {
        config = config.with_log(log.clone());
    }
    if cli.all {
        config = config.with_all(true);
    }
    if let Some(delimiter) = &cli.col_delimiter {
        config = config.with_col_delimiter(parse_delimiter(delimiter)?);
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let cli_vars = parse_vars(&cli.vars)?;
    let config = load_config(&cli)?;

    let mut vars = config.default_vars();
    vars.extend(cli_vars);
    let delimiter = config.col_delimiter;

    let mut services = Services::from_config(config)?.with_prompter(StdinPrompter);
    if cli.quiet {
        services = services.with_logger(QuietLogger);
    }

    let module = RequestModule::new(services).load_file(&cli.file)?;
    debug!(file = %cli.file.display(), vars = vars.len(), "request file loaded");

    match &cli.play {
        Some(csv) => {
            let responses = play_file(&module, csv, &vars, delimiter)
                .with_context(|| format!("Failed to play {}", csv.display()))?;
            debug!(rows = responses.len(), "batch finished");
        }
        None => {
            module.exec(vars)?;
        }
    }
    Ok(())
}
