//! hbl - Handlebars template module loader CLI
//!
//! Fetches template modules from a configured source, compiles them, and
//! either renders them directly or emits loader-ready wrapper modules.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use futures::future::join_all;
use tracing::debug;
use uuid::Uuid;

use hbload::cli::{Cli, Command, OutputFormat};
use hbload::config::Config;
use hbload::fetch::{BaseUrlResolver, FileFetcher, HttpFetcher, IdentityResolver, TextFetcher, UrlResolver};
use hbload::{FileSink, HbPlugin, LoadMode, LoaderPlugin, ModuleSink, OnLoad, StringSink};

fn setup_logging(cli_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log here since logging isn't initialized yet
    let upper = cli_log_level.map(str::to_uppercase);
    let level = match upper.as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some("INFO") | None => tracing::Level::INFO,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // A template source given on the command line replaces the configured one
    if cli.base_url.is_some() || cli.root_dir.is_some() {
        config.fetch.base_url = cli.base_url.clone();
        config.fetch.root_dir = cli.root_dir.clone();
    }
    config.validate().context("Invalid configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Render { module, data, data_file } => {
            cmd_render(&config, &module, data.as_deref(), data_file.as_deref()).await
        }
        Command::Build {
            modules,
            output,
            plugin_name,
            format,
        } => cmd_build(&config, &modules, output, plugin_name, format).await,
        Command::Check { modules, format } => cmd_check(&config, &modules, format).await,
    }
}

/// Pick fetcher and resolver from the configured template source
fn make_source(config: &Config) -> (Arc<dyn TextFetcher>, Box<dyn UrlResolver>) {
    debug!("make_source: called");
    if let Some(base_url) = &config.fetch.base_url {
        let fetcher = HttpFetcher::new(Duration::from_millis(config.fetch.timeout_ms));
        (Arc::new(fetcher), Box::new(BaseUrlResolver::new(base_url)))
    } else {
        let root = config.fetch.root_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        (Arc::new(FileFetcher::new(root)), Box::new(IdentityResolver))
    }
}

async fn cmd_render(config: &Config, module: &str, data: Option<&str>, data_file: Option<&Path>) -> Result<()> {
    debug!(%module, "cmd_render: called");
    let json: serde_json::Value = match (data, data_file) {
        (Some(inline), _) => serde_json::from_str(inline).context("Invalid JSON in --data")?,
        (None, Some(path)) => {
            let text = fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&text).context(format!("Invalid JSON in {}", path.display()))?
        }
        (None, None) => serde_json::Value::Object(serde_json::Map::new()),
    };

    let (fetcher, resolver) = make_source(config);
    let plugin = HbPlugin::new(fetcher);
    let plugin_config = config.plugin_config(LoadMode::Runtime);

    let (tx, rx) = tokio::sync::oneshot::channel();
    let on_load: OnLoad = Box::new(move |template| {
        let _ = tx.send(template);
    });
    plugin.load(module, &*resolver, on_load, &plugin_config).await?;
    let template = rx.await.context("Load completed without delivering a template")?;

    let html = template.render(&json)?;
    println!("{}", html);
    Ok(())
}

async fn cmd_build(
    config: &Config,
    modules: &[String],
    output: Option<PathBuf>,
    plugin_name: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let build_id = Uuid::now_v7();
    let plugin_name = plugin_name.unwrap_or_else(|| config.build.plugin_name.clone());
    let output = output.or_else(|| config.build.output.clone());
    debug!(%build_id, %plugin_name, module_count = modules.len(), "cmd_build: called");

    if matches!(format, OutputFormat::Json) && output.is_none() {
        return Err(eyre::eyre!(
            "--format json requires --output so the report does not share stdout with the bundle"
        ));
    }

    let (fetcher, resolver) = make_source(config);
    let plugin = HbPlugin::new(fetcher);
    let plugin_config = config.plugin_config(LoadMode::Build);

    let loads = modules.iter().map(|module| {
        let plugin = &plugin;
        let resolver = &*resolver;
        let plugin_config = &plugin_config;
        async move {
            let result = plugin.load(module, resolver, Box::new(|_| {}), plugin_config).await;
            (module.as_str(), result)
        }
    });
    let failures: Vec<(String, String)> = join_all(loads)
        .await
        .into_iter()
        .filter_map(|(module, result)| result.err().map(|e| (module.to_string(), e.to_string())))
        .collect();

    let mut bundle = StringSink::new();
    for module in modules {
        if failures.iter().any(|(failed, _)| failed == module) {
            continue;
        }
        plugin
            .write(&plugin_name, module, &mut bundle)
            .context(format!("Failed to emit module {}", module))?;
    }

    match &output {
        Some(path) => {
            let mut sink = FileSink::new(path);
            for source in bundle.modules() {
                sink.emit(source)
                    .context(format!("Failed to write bundle to {}", path.display()))?;
            }
        }
        None => {
            for source in bundle.modules() {
                print!("{}", source);
            }
        }
    }

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "build-id": build_id,
                "requested": modules.len(),
                "emitted": bundle.emit_count(),
                "output": &output,
                "failures": failures
                    .iter()
                    .map(|(module, error)| serde_json::json!({"module": module, "error": error}))
                    .collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            for (module, error) in &failures {
                eprintln!("{} {}: {}", "✗".red(), module, error);
            }
            if let Some(path) = &output {
                println!(
                    "{} Wrote {} of {} modules to {}",
                    "✓".green(),
                    bundle.emit_count(),
                    modules.len(),
                    path.display().to_string().cyan()
                );
            }
        }
    }

    if !failures.is_empty() {
        return Err(eyre::eyre!("{} of {} modules failed to build", failures.len(), modules.len()));
    }
    Ok(())
}

async fn cmd_check(config: &Config, modules: &[String], format: OutputFormat) -> Result<()> {
    debug!(module_count = modules.len(), "cmd_check: called");
    let (fetcher, resolver) = make_source(config);
    let plugin = HbPlugin::new(fetcher);
    let plugin_config = config.plugin_config(LoadMode::Runtime);

    let checks = modules.iter().map(|module| {
        let plugin = &plugin;
        let resolver = &*resolver;
        let plugin_config = &plugin_config;
        async move {
            let result = plugin.load(module, resolver, Box::new(|_| {}), plugin_config).await;
            (module.as_str(), result.err().map(|e| e.to_string()))
        }
    });
    let results = join_all(checks).await;
    let failed = results.iter().filter(|(_, error)| error.is_some()).count();

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "checked": modules.len(),
                "ok": modules.len() - failed,
                "failures": results
                    .iter()
                    .filter_map(|(module, error)| {
                        error.as_ref().map(|error| serde_json::json!({"module": module, "error": error}))
                    })
                    .collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            // Failure lines go to stderr, same stream contract as cmd_build
            for (module, error) in &results {
                match error {
                    None => println!("{} {}", "✓".green(), module),
                    Some(error) => eprintln!("{} {}: {}", "✗".red(), module, error),
                }
            }
        }
    }

    if failed > 0 {
        return Err(eyre::eyre!("{} of {} modules failed check", failed, modules.len()));
    }
    Ok(())
}
