//! Stepchain agent entry point.
//!
//! Composition root: loads configuration, wires observability, builds the
//! OpenAI provider and chain executor, then runs the consumer loop alongside
//! the relay transport until Ctrl-C or the relay hangs up.
//!
//! ```bash
//! OPENAI_API_KEY=sk-... RUST_LOG=info stepchain-agent --steps configs/agent_steps.json
//! ```

mod config;
mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use listener::{RelayConfig, RelayTransport};
use llm::{OpenAiConfig, OpenAiProvider, TiktokenEstimator};
use nodes::{Agent, ChainExecutor};
use pipeline::{InboundSink, StepDefinitionSet};

use crate::config::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let telemetry = telemetry::init(cli.log_format)?;

    let outcome = run(cli).await;
    if let Err(err) = &outcome {
        error!(error = %format!("{err:#}"), "agent stopped");
    }
    telemetry.shutdown();
    outcome
}

async fn run(cli: Cli) -> Result<()> {
    let text = tokio::fs::read_to_string(&cli.steps)
        .await
        .with_context(|| format!("reading step configuration {}", cli.steps.display()))?;
    let steps = StepDefinitionSet::from_json_str(&text, cli.model)
        .with_context(|| format!("loading step configuration {}", cli.steps.display()))?;
    info!(
        path = %cli.steps.display(),
        steps = steps.len(),
        output_agents = steps.output_agents().map_or(0, <[_]>::len),
        "step configuration loaded"
    );

    let mut provider_config = OpenAiConfig::new(cli.api_key.clone());
    if let Some(base_url) = &cli.api_base {
        provider_config.base_url = base_url.clone();
    }
    provider_config.timeout = cli.request_timeout();
    let provider = OpenAiProvider::new(provider_config)?;

    let executor = ChainExecutor::new(
        steps,
        cli.limits(),
        Arc::new(provider),
        Arc::new(TiktokenEstimator::new()?),
    );
    let agent = Arc::new(Agent::new(executor).with_poll_interval(cli.poll_interval()));

    let shutdown = CancellationToken::new();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let consumer = tokio::spawn({
        let agent = Arc::clone(&agent);
        let shutdown = shutdown.clone();
        async move { agent.run(outbound_tx, shutdown).await }
    });

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received; shutting down");
            }
            shutdown.cancel();
        }
    });

    let transport = RelayTransport::new(RelayConfig {
        host: cli.host.clone(),
        port: cli.port,
        agent_id: cli.agent_id.clone(),
    });
    let sink: Arc<dyn InboundSink> = agent.buffer();
    let transport_result = transport.run(sink, outbound_rx, shutdown.clone()).await;

    shutdown.cancel();
    consumer.await.context("consumer task panicked")?;
    info!(stats = ?agent.stats(), "agent exited");

    transport_result.context("relay transport failed")
}
