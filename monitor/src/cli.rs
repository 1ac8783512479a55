//! # CLI Interface
//!
//! Defines the command-line argument structure for `headlight-monitor`
//! using `clap` derive. Three subcommands: `run`, `status`, and `version`.

use clap::{Parser, Subcommand};

/// Headlight light-client monitor.
///
/// Connects one session to the light-client engine, tracks its status,
/// block height, and recent head changes, and serves that read model over
/// a read-only HTTP/WebSocket API with Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "headlight-monitor",
    about = "Light-client status monitor",
    version,
    propagate_version = true
)]
pub struct MonitorCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the monitor binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the monitor.
    Run(RunArgs),
    /// Query the status endpoint of a running monitor.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Engine network to connect to: mainalbatross, testalbatross, or
    /// devalbatross.
    #[arg(long, env = "HEADLIGHT_NETWORK", default_value = "testalbatross")]
    pub network: String,

    /// Port for the read-only HTTP/WebSocket API.
    #[arg(long, env = "HEADLIGHT_API_PORT", default_value_t = headlight_client::config::DEFAULT_API_PORT)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "HEADLIGHT_METRICS_PORT", default_value_t = headlight_client::config::DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Height poll interval in seconds.
    #[arg(long, env = "HEADLIGHT_POLL_INTERVAL", default_value_t = 10)]
    pub poll_interval_secs: u64,

    /// Log output format: pretty or json.
    #[arg(long, env = "HEADLIGHT_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// API endpoint of the running monitor.
    #[arg(long, default_value = "http://127.0.0.1:8640")]
    pub api_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        MonitorCli::command().debug_assert();
    }

    #[test]
    fn run_defaults_to_the_test_network() {
        let cli = MonitorCli::parse_from(["headlight-monitor", "run"]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.network, "testalbatross");
                assert_eq!(args.poll_interval_secs, 10);
            }
            other => panic!("expected run, got {:?}", other),
        }
    }
}
