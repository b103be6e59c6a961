use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fnroute_dispatch::{Dispatcher, DispatcherConfig, Target};
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fnroute")]
#[command(about = "Hedged, latency-aware dispatcher for a function gateway", long_about = None)]
pub struct Cli {
    /// Dispatcher config file (.toml or .json). Defaults apply when absent.
    #[arg(short, long, env = "FNROUTE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Overrides the gateway base URL.
    #[arg(short, long, env = "FNROUTE_GATEWAY")]
    pub gateway: Option<String>,

    /// Overrides the target pool; repeat for each target.
    #[arg(short, long = "target")]
    pub targets: Vec<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Dispatch a payload and print each result as a JSON line.
    Invoke {
        /// JSON payload sent to the chosen function.
        #[arg(short, long)]
        payload: String,
        /// Number of sequential invocations.
        #[arg(short, long, default_value = "1")]
        repeat: usize,
    },
    /// Send one request to every target to wake cold functions.
    Prewarm {
        #[arg(short, long, default_value = r#"{"arg":"warm"}"#)]
        payload: String,
    },
    /// Print the effective configuration as TOML.
    ShowConfig,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = self.load_config()?;
        match self.command {
            Command::Invoke { ref payload, repeat } => invoke(config, payload, repeat).await,
            Command::Prewarm { ref payload } => prewarm(config, payload).await,
            Command::ShowConfig => {
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
        }
    }

    fn load_config(&self) -> Result<DispatcherConfig> {
        let mut config = match &self.config {
            Some(path) if path.exists() => DispatcherConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            Some(path) => {
                tracing::warn!("Config file not found, using defaults: {}", path.display());
                DispatcherConfig::default()
            }
            None => DispatcherConfig::default(),
        };
        if let Some(gateway) = &self.gateway {
            config.gateway_base_url = gateway.clone();
        }
        if !self.targets.is_empty() {
            config.targets = self.targets.iter().map(Target::new).collect();
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_payload(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("payload is not valid JSON: {}", raw))
}

async fn invoke(config: DispatcherConfig, payload: &str, repeat: usize) -> Result<()> {
    let payload = parse_payload(payload)?;
    let dispatcher = Dispatcher::new(config)?;

    for _ in 0..repeat {
        let record = dispatcher.invoke(payload.clone()).await;
        println!("{}", serde_json::to_string(&record)?);
    }

    let summary = json!({
        "metrics": dispatcher.metrics(),
        "targets": dispatcher.target_snapshots(),
    });
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

async fn prewarm(config: DispatcherConfig, payload: &str) -> Result<()> {
    let payload = parse_payload(payload)?;
    let dispatcher = Dispatcher::new(config)?;
    let warmed = dispatcher.prewarm(&payload).await;
    tracing::info!("Prewarmed {}/{} targets", warmed, dispatcher.targets().len());
    println!(
        "{}",
        json!({ "warmed": warmed, "targets": dispatcher.targets().len() })
    );
    Ok(())
}
