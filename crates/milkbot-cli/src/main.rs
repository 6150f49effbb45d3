//! milkbot router CLI entry point.
//!
//! Binary name: `milkbot`
//!
//! Parses CLI arguments, initializes tracing, resolves the router
//! configuration, then dispatches to the requested command.

mod cli;

use clap::Parser;
use clap_complete::generate;
use milkbot_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands, ConfigAction};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need tracing or config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "milkbot", &mut std::io::stdout());
        return Ok(());
    }

    // Set up tracing based on verbosity; RUST_LOG still wins when set
    let fallback_directive = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,milkbot_core=debug",
        _ => "trace",
    };
    init_tracing(TracingOptions {
        fallback_directive: fallback_directive.to_string(),
        json: cli.log_json,
        otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let config = cli::resolve_config(&cli).await?;

    let result = match cli.command {
        Commands::Bench {
            routes,
            broadcasts,
        } => cli::bench::run_bench(config, routes, broadcasts, cli.json).await,

        Commands::Relay { hops } => cli::relay::run_relay(config, hops, cli.json).await,

        Commands::Config { action } => match action {
            ConfigAction::Show => cli::config::show_config(&config, cli.json),
        },

        Commands::Completions { .. } => unreachable!("handled above"),
    };

    shutdown_tracing();
    result
}
