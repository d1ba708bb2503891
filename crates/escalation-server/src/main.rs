use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use escalation_server::{AppState, ServerConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "escalation-server", about = "Phone-call escalation webhook server")]
struct Args {
    /// Optional TOML config file
    #[arg(short, long, env = "ESCALATION_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address (overrides config and environment)
    #[arg(long)]
    bind: Option<String>,

    /// Externally reachable base URL (overrides config and environment)
    #[arg(long)]
    public_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = ServerConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(public_url) = args.public_url {
        config.public_url = public_url;
    }
    config.validate().context("Invalid configuration")?;

    info!(
        bind = %config.bind_addr,
        public_url = %config.public_url,
        twilio = %config.twilio.api_base,
        "Escalation server starting"
    );

    let state = Arc::new(AppState::from_config(&config)?);
    escalation_server::serve(&config.bind_addr, state).await
}
