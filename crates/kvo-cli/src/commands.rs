use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use kvo_sdk::{InMemoryBackend, ManagerConfig, StorageBackend};
use kvo_store::{flatten_key, StorageCall};
use tracing::debug;

use crate::cli::*;
use crate::demo::{self, DemoReport};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Capabilities(args) => cmd_capabilities(&args, cli.format),
        Command::Demo(args) => cmd_demo(&args, config, cli.format),
        Command::Config => cmd_config(&config, cli.format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ManagerConfig> {
    match path {
        Some(path) => ManagerConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display())),
        None => {
            debug!("no configuration file given, using defaults");
            Ok(ManagerConfig::default())
        }
    }
}

fn cmd_capabilities(args: &BackendArgs, format: OutputFormat) -> anyhow::Result<()> {
    let backend = InMemoryBackend::with_capabilities(demo::capabilities(args));
    let capabilities = backend.capabilities();
    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({
                "backend": backend.name(),
                "capabilities": capabilities,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("Backend {}", backend.name().bold());
            println!("  partial updates:          {}", flag(capabilities.partial_updates));
            println!("  composite primary keys:   {}", flag(capabilities.composite_primary_keys));
            println!(
                "  requires composite keys:  {}",
                flag(capabilities.requires_composite_primary_keys)
            );
        }
    }
    Ok(())
}

fn cmd_demo(args: &DemoArgs, config: ManagerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let report = demo::run(args, config)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report)?,
    }
    Ok(())
}

fn print_report(report: &DemoReport) -> anyhow::Result<()> {
    println!(
        "{} backend {} (partial updates: {}, composite keys: {})",
        "✓".green().bold(),
        report.backend.bold(),
        flag(report.capabilities.partial_updates),
        flag(report.capabilities.composite_primary_keys),
    );
    for step in &report.steps {
        println!("{}", step.step.yellow().bold());
        if step.calls.is_empty() {
            println!("  {}", "no storage calls".dimmed());
        }
        for call in &step.calls {
            println!("  {}", render_call(call)?);
        }
    }
    Ok(())
}

fn render_call(call: &StorageCall) -> anyhow::Result<String> {
    let key = flatten_key(call.storage(), call.id()).cyan();
    Ok(match call {
        StorageCall::Insert { data, .. } => {
            format!("{} {key} {}", "insert".green(), serde_json::to_string(data)?)
        }
        StorageCall::Update { data, .. } => {
            format!("{} {key} {}", "update".blue(), serde_json::to_string(data)?)
        }
        StorageCall::Delete { .. } => format!("{} {key}", "delete".red()),
        StorageCall::Find { .. } => format!("{} {key}", "find".dimmed()),
    })
}

fn cmd_config(config: &ManagerConfig, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text => print!("{}", config.to_toml_string()?),
    }
    Ok(())
}

fn flag(on: bool) -> colored::ColoredString {
    if on {
        "yes".green()
    } else {
        "no".dimmed()
    }
}
