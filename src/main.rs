//! foundation-host daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────┐
//!                  │               DualProtocolHost               │
//!   gRPC client    │  ┌──────────┐    ┌───────────────────────┐   │
//!   ───────────────┼─▶│ primary  │───▶│                       │   │
//!                  │  │ listener │    │   ServiceRegistry     │   │
//!                  │  └──────────┘    │   (tonic Routes)      │   │
//!   browser        │  ┌──────────┐    │                       │   │
//!   ───────────────┼─▶│  bridge  │───▶│                       │   │
//!   (gRPC-Web)     │  │ listener │    └───────────────────────┘   │
//!                  │  └────▲─────┘                                │
//!                  │       │ ListenerGuard (sys_conf allow-list)  │
//!                  └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "foundation-host")]
#[command(about = "Serve gRPC and gRPC-Web for a foundation service", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// sys_conf.json holding the microservice registry
    #[arg(short, long)]
    system_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    foundation_rpc::lifecycle::launch(cli.config.as_deref(), cli.system_config.as_deref()).await?;
    Ok(())
}
