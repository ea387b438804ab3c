mod cli;

use std::fs;
use std::io::{self, Read};
use std::process;

use anyhow::{bail, Context, Result};
use log::debug;
use qengine_core::{QEngineConfig, QueryEngine, RawFilter};
use serde::Serialize;

use crate::cli::{parse_args, parse_param, Cli, Commands, FilterArgs};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = parse_args();
    setup_logging(&args);

    let mut config = QEngineConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    args.apply_to(&mut config);
    debug!("Using backend '{}'", config.default_backend);

    let engine = QueryEngine::with_config(config)?;
    let input = read_filter(args.command.filter_args())?;

    let output = execute(&engine, &args.command, input, args.compact)?;
    println!("{output}");
    Ok(())
}

/// Run `command` and render what it prints
fn execute(engine: &QueryEngine, command: &Commands, input: RawFilter, compact: bool) -> Result<String> {
    match command {
        Commands::Compile(_) => render_json(&engine.compile(input)?, compact),
        Commands::Ast(_) => render_json(&engine.process_filter(input)?, compact),
        Commands::Check(_) => {
            engine.check(input)?;
            Ok("OK".to_string())
        }
    }
}

fn setup_logging(args: &Cli) {
    env_logger::Builder::new()
        .filter_level(args.log_level())
        .init();
}

fn read_filter(args: &FilterArgs) -> Result<RawFilter> {
    if !args.params.is_empty() {
        let mut pairs = Vec::with_capacity(args.params.len());
        for param in &args.params {
            let Some((key, value)) = parse_param(param) else {
                bail!("Invalid parameter '{param}', expected KEY=VALUE");
            };
            pairs.push((key, value));
        }
        return Ok(pairs.into_iter().collect());
    }

    if let Some(path) = &args.file {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read filter file {}", path.display()))?;
        return Ok(RawFilter::from(text));
    }

    match args.filter.as_deref() {
        Some(text) if text != "-" => Ok(RawFilter::from(text)),
        _ => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read filter from stdin")?;
            Ok(RawFilter::from(text))
        }
    }
}

fn render_json<T: Serialize>(value: &T, compact: bool) -> Result<String> {
    let rendered = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    Ok(rendered)
}
