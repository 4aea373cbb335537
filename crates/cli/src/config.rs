//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use pipeline::{AgentId, ChainLimits, Model};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "stepchain-agent",
    version = env!("CARGO_PKG_VERSION"),
    about = "Runs a configured chain of LLM calls over every payload received from a relay server"
)]
pub struct Cli {
    /// Step configuration file.
    #[arg(long, default_value = "configs/agent_steps.json")]
    pub steps: PathBuf,

    /// Relay server host.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Relay server port.
    #[arg(long, default_value_t = 8888)]
    pub port: u16,

    /// Sender id attached to every outbound message.
    #[arg(long, default_value = "minimal_agent", value_parser = parse_agent_id)]
    pub agent_id: AgentId,

    /// Model used by steps that do not name one. Unsupported names run as gpt-4o-mini.
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini", value_parser = parse_model)]
    pub model: Model,

    /// Maximum number of steps run per payload.
    #[arg(long, env = "MAX_OPENAI_CALLS", default_value_t = ChainLimits::DEFAULT_MAX_CALLS)]
    pub max_calls: usize,

    /// Chat-completions base URL, up to and including the API version.
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub api_base: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    #[arg(long, default_value_t = 60)]
    pub request_timeout_secs: u64,

    /// How long the consumer sleeps when the inbound buffer is empty.
    #[arg(long, default_value_t = 50)]
    pub poll_interval_ms: u64,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn limits(&self) -> ChainLimits {
        ChainLimits::with_max_calls(self.max_calls)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_model(name: &str) -> Result<Model, String> {
    Ok(Model::sanitize_name(name))
}

fn parse_agent_id(id: &str) -> Result<AgentId, String> {
    AgentId::new(id).ok_or_else(|| "agent id must not be empty".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        let mut argv = vec!["stepchain-agent", "--api-key", "sk-test"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv)
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&[
            "--steps",
            "other.json",
            "--port",
            "9000",
            "--agent-id",
            "summariser",
            "--model",
            "gpt-4o",
            "--max-calls",
            "2",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.steps, PathBuf::from("other.json"));
        assert_eq!(cli.port, 9000);
        assert_eq!(cli.agent_id.as_str(), "summariser");
        assert_eq!(cli.model, Model::Gpt4o);
        assert_eq!(cli.limits().max_calls, 2);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn unknown_models_run_as_mini() {
        let cli = parse(&["--model", "gpt-2"]).unwrap();
        assert_eq!(cli.model, Model::Gpt4oMini);
    }

    #[test]
    fn empty_agent_id_is_rejected() {
        assert!(parse(&["--agent-id", ""]).is_err());
    }

    #[test]
    fn derived_durations() {
        let cli = parse(&["--request-timeout-secs", "5", "--poll-interval-ms", "10"]).unwrap();
        assert_eq!(cli.request_timeout(), Duration::from_secs(5));
        assert_eq!(cli.poll_interval(), Duration::from_millis(10));
    }
}
