//! Command-line interface for qengine
//!
//! Argument parsing and the mapping from flags onto engine configuration.

use clap::{Args, Parser, Subcommand};
use qengine_core::QEngineConfig;
use std::path::PathBuf;

/// qengine - parse, validate, optimize and compile query filters
///
/// Filters are accepted as JSON text or as bracket-notation parameters
/// (`filter[where][price][$gt]=50`) and turned into a backend-neutral AST.
#[derive(Parser, Debug)]
#[command(name = "qengine")]
#[command(author, version, about)]
#[command(after_help = "EXAMPLES:\n  \
    # Compile a JSON filter for the default backend\n  \
    qengine compile '{\"where\": {\"price\": {\"$gt\": 50}}, \"order\": \"-price\"}'\n\n  \
    # Use bracket-notation parameters\n  \
    qengine ast -p 'filter[where][category]=books' -p 'filter[order]=name'\n\n  \
    # Validate a filter read from stdin\n  \
    echo '{\"where\": {\"age\": {\"$gte\": 18}}}' | qengine check\n\n  \
    # Strict parsing with a config file\n  \
    qengine --config qengine.toml --strict check -f filter.json")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Reject mixed input shapes and unknown clauses
    #[arg(long, global = true)]
    pub strict: bool,

    /// Skip the optimizer
    #[arg(long, global = true)]
    pub no_optimize: bool,

    /// Backend to compile for (overrides the configured default)
    #[arg(short, long, value_name = "NAME", global = true)]
    pub backend: Option<String>,

    /// Use compact output (no pretty-printing)
    #[arg(short, long, global = true)]
    pub compact: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline and print the compiled backend query
    #[command(after_help = "EXAMPLES:\n  \
        qengine compile '{\"where\": {\"$or\": [{\"a\": 1}, {\"b\": 2}]}}'\n  \
        qengine compile --backend document -p 'filter[where][price][$lt]=20'")]
    Compile(FilterArgs),

    /// Run the pipeline and print the optimized AST
    Ast(FilterArgs),

    /// Parse, normalize and validate only
    Check(FilterArgs),
}

/// Where the filter comes from
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Filter as JSON text (stdin if omitted or `-`)
    #[arg(value_name = "FILTER")]
    pub filter: Option<String>,

    /// Bracket-notation parameter `key=value` (repeatable)
    #[arg(short, long = "param", value_name = "KEY=VALUE", action = clap::ArgAction::Append, conflicts_with_all = ["filter", "file"])]
    pub params: Vec<String>,

    /// Read the JSON filter from a file
    #[arg(short, long, value_name = "FILE", conflicts_with = "filter")]
    pub file: Option<PathBuf>,
}

impl Commands {
    /// Filter source of any subcommand
    pub fn filter_args(&self) -> &FilterArgs {
        match self {
            Commands::Compile(args) | Commands::Ast(args) | Commands::Check(args) => args,
        }
    }
}

impl Cli {
    /// Overlay command-line flags onto a loaded configuration
    pub fn apply_to(&self, config: &mut QEngineConfig) {
        if self.strict {
            config.parser.strict_mode = true;
        }
        if self.no_optimize {
            config.optimizer.enabled = false;
        }
        if let Some(backend) = &self.backend {
            config.default_backend.clone_from(backend);
        }
    }

    /// Log level selected by `-v`
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

/// Split a `key=value` parameter at the first `=`
pub fn parse_param(param: &str) -> Option<(&str, &str)> {
    param.split_once('=').filter(|(key, _)| !key.is_empty())
}

/// Parse command-line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Parse command-line arguments from a vector (for testing)
#[allow(dead_code)]
pub fn parse_args_from<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}
