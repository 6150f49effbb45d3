//! CLI command definitions and dispatch for the `milkbot` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod bench;
pub mod config;
pub mod relay;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use milkbot_core::config::load_router_config;
use milkbot_types::config::RouterConfig;

/// Exercise an in-process milkbot router.
#[derive(Parser)]
#[command(name = "milkbot", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit log events as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    /// Path to a router.toml.
    #[arg(long, global = true, env = "MILKBOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the hop budget from the config file.
    #[arg(long, global = true)]
    pub ttl: Option<u8>,

    /// Override the queue capacity from the config file.
    #[arg(long, global = true)]
    pub queue_capacity: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register routes that all broadcast concurrently and count deliveries.
    Bench {
        /// Number of routes to register.
        #[arg(long, default_value_t = 10)]
        routes: usize,

        /// Broadcasts sent by each route.
        #[arg(long, default_value_t = 8)]
        broadcasts: usize,
    },

    /// Pass one packet down a chain of forwarding routes and report how far
    /// it gets before its hop budget runs out.
    Relay {
        /// Number of forwarding routes after the origin.
        #[arg(long, default_value_t = 8)]
        hops: usize,
    },

    /// Inspect router configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the resolved configuration.
    Show,
}

/// Load the config file (if any) and apply command-line overrides.
pub async fn resolve_config(cli: &Cli) -> anyhow::Result<RouterConfig> {
    let mut config = match &cli.config {
        Some(path) => load_router_config(path)
            .await
            .with_context(|| format!("loading router config from {}", path.display()))?,
        None => RouterConfig::default(),
    };

    if let Some(ttl) = cli.ttl {
        config.default_ttl = ttl;
    }
    if let Some(capacity) = cli.queue_capacity {
        config.queue_capacity = capacity;
    }
    Ok(config.normalized())
}
