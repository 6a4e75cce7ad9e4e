mod cli;
mod ui;

use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use ml_executor::agent::{AgentClient, ResourceRequest};
use ml_executor::documents::DocumentAnalyzer;
use ml_executor::executor::ExecutorSettings;
use ml_executor::{Config, ExecutionMode, MlExecutor};
use ui::CallProgress;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(mode) = cli.mode {
        config.execution_mode = ExecutionMode::from(mode).to_string();
    }

    match cli.command {
        Command::Invoke {
            operation,
            payload,
            file,
        } => {
            let payload = read_payload(payload, file.as_deref())?;
            let executor = MlExecutor::from_config(&config)?;
            let progress = CallProgress::start(&format!("{operation} ({})", executor.mode()));
            let result = executor.invoke(&operation, &payload).await;
            progress.dispatch(&operation, &result);
            Ok(if result.is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Health => {
            let executor = MlExecutor::from_config(&config)?;
            let progress = CallProgress::start("checking ML service health");
            let healthy = executor.health_check().await;
            progress.health(healthy);
            Ok(if healthy {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Operations => {
            let settings = ExecutorSettings::from_config(&config)?;
            println!("mode: {}", settings.mode);
            println!("service: {}", settings.base_url);
            for name in settings.endpoints.names() {
                let path = settings.endpoints.get(name).unwrap_or("-");
                println!("  {name:<24} {path}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Resources {
            student,
            subject,
            grade,
            risk,
            need,
        } => {
            let client = AgentClient::from_config(&config.agent)?;
            let req = ResourceRequest::new(student, subject, grade, risk.into(), need.as_deref());
            let progress = CallProgress::start(&format!("fetching resources for {}", req.subject));
            let bundle = client.resources_for_topic(&req).await;
            progress.resources(&bundle);
            Ok(ExitCode::SUCCESS)
        }
        Command::Analyze { path } => {
            let analyzer = DocumentAnalyzer::from_config(&config.documents)?;
            let progress = CallProgress::start(&format!("analyzing {}", path.display()));
            let analysis = analyzer
                .analyze_path(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            progress.analysis(&analysis);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Payload from `--payload`, `--file`, or an empty object.
fn read_payload(inline: Option<String>, file: Option<&std::path::Path>) -> Result<Value> {
    let raw = match (inline, file) {
        (Some(json), _) => json,
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read payload file {}", path.display()))?,
        (None, None) => return Ok(Value::Object(Default::default())),
    };

    let value: Value = serde_json::from_str(&raw).context("payload is not valid JSON")?;
    if !value.is_object() {
        bail!("payload must be a JSON object");
    }
    Ok(value)
}
