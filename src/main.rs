//! toolgate: serve an OpenAPI 3.x API as callable tools.

mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Command, Transport, engine_options};
use serde::Serialize;
use std::sync::Arc;
use toolgate_core::GateConfig;
use toolgate_openapi::{OperationExtractor, ToolRegistry, load};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env is fine
    dotenvy::dotenv().ok();

    let mut config =
        GateConfig::load_from(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut config);
    toolgate_telemetry::init_telemetry(&config.logging);

    let location = config.spec_path()?.to_string();
    let spec = load(&location)
        .await
        .with_context(|| format!("Failed to load OpenAPI spec from {location}"))?;

    if let Command::Validate = cli.command {
        return validate(&spec);
    }

    let registry = ToolRegistry::from_spec(&spec, engine_options(&config)?)
        .context("Failed to register tools")?;

    match cli.command {
        Command::Validate => Ok(()),
        Command::List => print_json(&registry.list()),
        Command::Describe { tool } => match registry.describe(tool.as_deref()) {
            Some(descriptions) => print_json(&descriptions),
            None => bail!("Unknown tool '{}'", tool.unwrap_or_default()),
        },
        Command::Call { tool, args } => {
            let arguments: serde_json::Value =
                serde_json::from_str(&args).context("--args must be valid JSON")?;
            let envelope = registry.call(&tool, arguments).await;
            print_json(&envelope)?;
            if envelope.is_error() {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Serve { transport, .. } => {
            let registry = Arc::new(registry);
            match transport {
                Transport::Http => {
                    let addr = format!("{}:{}", config.server.host, config.server.port);
                    toolgate_server::serve_http(registry, &addr).await
                }
                Transport::Stdio => toolgate_server::serve_stdio(registry).await,
            }
        }
    }
}

/// Report every defect strict extraction would reject.
fn validate(spec: &openapiv3::OpenAPI) -> Result<()> {
    let extractor = OperationExtractor::lenient(spec);
    let operations = extractor.extract()?;
    let defects = extractor.defects();

    println!(
        "{} {}: {} operations",
        spec.info.title,
        spec.info.version,
        operations.len()
    );
    for defect in &defects {
        println!("  - {defect}");
    }

    if defects.is_empty() {
        info!(operations = operations.len(), "Spec is valid");
        println!("No defects found");
        Ok(())
    } else {
        bail!("{} defect(s) found", defects.len())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
