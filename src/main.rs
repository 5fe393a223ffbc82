use anyhow::Result;
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use memu_bridge::commands::{Command, Context, Request};
use memu_bridge::config::BridgeConfig;
use memu_bridge::error::BridgeError;

#[derive(Parser)]
#[command(name = "memu-bridge", version, about = "Memory service adapter for agent plugins")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("{}", serde_json::json!({ "error": format!("{e:#}") }));
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<serde_json::Value> {
    let command = parse_args()?.ok_or(BridgeError::NoCommand)?;

    // Validate arguments before any database or provider is touched.
    let request = Request::try_from(command)?;

    let config = BridgeConfig::load()?;

    // Log to stderr so stdout carries only the JSON result.
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::from_config(config)?;
    request.run(&ctx).await
}

/// Parse argv. Help and version print as usual; every other parse failure
/// becomes a JSON error.
fn parse_args() -> Result<Option<Command>> {
    match Cli::try_parse() {
        Ok(cli) => Ok(cli.command),
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => e.exit(),
            ErrorKind::InvalidSubcommand => {
                let name = match e.get(ContextKind::InvalidSubcommand) {
                    Some(ContextValue::String(name)) => name.clone(),
                    _ => String::new(),
                };
                Err(BridgeError::UnknownCommand(name).into())
            }
            _ => {
                let rendered = e.to_string();
                let message = rendered.lines().next().unwrap_or_default();
                Err(anyhow::anyhow!(message.trim_start_matches("error: ").to_string()))
            }
        },
    }
}
