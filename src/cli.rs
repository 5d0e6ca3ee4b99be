//! CLI argument parsing for hbload

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hbl")]
#[command(author, version, about = "Handlebars template module loader", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Base URL to fetch templates from
    #[arg(long = "base-url", global = true, conflicts_with = "root_dir")]
    pub base_url: Option<String>,

    /// Root directory to read templates from
    #[arg(long = "root-dir", global = true)]
    pub root_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch, compile, and render a template module
    Render {
        /// Module name, e.g. widgets/button
        #[arg(required = true)]
        module: String,

        /// Inline JSON data for rendering
        #[arg(short, long, conflicts_with = "data_file")]
        data: Option<String>,

        /// JSON file with data for rendering
        #[arg(long = "data-file")]
        data_file: Option<PathBuf>,
    },

    /// Load modules in build mode and emit loader-ready wrapper modules
    Build {
        /// Module names to build
        #[arg(required = true)]
        modules: Vec<String>,

        /// Bundle file for emitted modules (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Plugin id prefixed to emitted module ids
        #[arg(short = 'p', long = "plugin-name")]
        plugin_name: Option<String>,

        /// Output format for the build report
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Fetch and compile modules without rendering, reporting failures
    Check {
        /// Module names to check
        #[arg(required = true)]
        modules: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for build/check reports
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
