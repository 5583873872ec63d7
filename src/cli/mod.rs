//! CLI module for paygate
//!
//! # Commands
//!
//! - `serve` - Start a gateway node
//! - `proxy` - Start the load balancer in front of gateway replicas
//!
//! # Example
//!
//! ```bash
//! # Start a decision-authority gateway node
//! MASTER=true USE_FALLBACK=true paygate serve
//!
//! # Start the load balancer
//! BACKENDS=http://api-1:8080,http://api-2:8080 paygate proxy
//! ```

pub mod proxy;
pub mod serve;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Paygate - resilient payment-intermediary gateway
#[derive(Parser, Debug)]
#[command(
    name = "paygate",
    version,
    about = "Resilient payment-intermediary gateway"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a gateway node
    Serve(ServeArgs),
    /// Start the load balancer
    Proxy(ProxyArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "paygate.toml")]
    pub config: PathBuf,

    /// Override server port
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Override server host
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,
}

#[derive(Args, Debug)]
pub struct ProxyArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "paygate.toml")]
    pub config: PathBuf,

    /// Override listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Comma-separated backend URLs (overrides config and BACKENDS)
    #[arg(short, long)]
    pub backends: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,
}
