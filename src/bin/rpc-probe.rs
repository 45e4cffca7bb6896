use std::path::PathBuf;

use clap::Parser;
use foundation_rpc::config::loader::load_config;
use foundation_rpc::observability::logging::init_logging;
use foundation_rpc::{FoundationConfig, ResilientClient};
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

#[derive(Parser)]
#[command(name = "rpc-probe")]
#[command(about = "Health-check a gRPC service through a resilient client", long_about = None)]
struct Cli {
    /// Target address (host:port or URI)
    #[arg(default_value = "127.0.0.1:50051")]
    target: String,

    /// Service name to check; empty checks the whole server
    #[arg(short, long, default_value = "")]
    service: String,

    /// TOML configuration whose `[client]` section shapes the dial
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `client.connect_timeout_ms`
    #[arg(long)]
    connect_timeout_ms: Option<u64>,

    /// Overrides `client.request_timeout_ms`
    #[arg(long)]
    request_timeout_ms: Option<u64>,

    /// Overrides `observability.log_level` (used when RUST_LOG is unset)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => FoundationConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    init_logging(&config.observability)?;

    if let Some(ms) = cli.connect_timeout_ms {
        config.client.connect_timeout_ms = ms;
    }
    if let Some(ms) = cli.request_timeout_ms {
        config.client.request_timeout_ms = ms;
    }
    let target = config.client.dial_target(cli.target);

    let mut client = ResilientClient::connect(target, HealthClient::new)
        .await?
        .named("rpc-probe");

    let service = cli.service;
    let response = client
        .call_with_recovery(|mut stub| {
            let request = HealthCheckRequest { service: service.clone() };
            async move { stub.check(request).await }
        })
        .await?;

    let status = response.into_inner().status();
    println!("{}", status.as_str_name());
    client.close();

    if status != ServingStatus::Serving {
        std::process::exit(1);
    }
    Ok(())
}
