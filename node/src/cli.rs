//! # CLI Interface
//!
//! Command-line arguments for `goody-node`, via `clap` derive. Every `run`
//! option can also come from a `GOODY_*` environment variable.

use clap::{Parser, Subcommand};
use std::time::Duration;

use crate::logging::LogFormat;

/// Goody ledger node.
///
/// Hosts one party over an in-process vault, key store and notary, and
/// serves issue / transfer / exit / balance requests over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "goody-node",
    about = "Goody ledger node",
    version,
    propagate_version = true
)]
pub struct GoodyNodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Name of the party this node acts for.
    #[arg(long, env = "GOODY_PARTY", default_value = "Bank")]
    pub party: String,

    /// Port for the REST API.
    #[arg(long, env = "GOODY_PORT", default_value_t = 10050)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "GOODY_METRICS_PORT", default_value_t = 10051)]
    pub metrics_port: u16,

    /// Other parties known to this node, comma separated. They can be
    /// named as transfer recipients.
    #[arg(
        long,
        env = "GOODY_COUNTERPARTIES",
        value_delimiter = ',',
        default_value = "Alice,Bob"
    )]
    pub counterparties: Vec<String>,

    /// Name of the notary guarding newly issued goodies.
    #[arg(long, env = "GOODY_NOTARY", default_value = "Notary")]
    pub notary: String,

    /// How long to wait on the notary before reporting an indeterminate
    /// outcome, in milliseconds.
    #[arg(long, env = "GOODY_FINALITY_TIMEOUT_MS", default_value_t = 30_000)]
    pub finality_timeout_ms: u64,

    /// Log output format.
    #[arg(long, env = "GOODY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl RunArgs {
    pub fn finality_timeout(&self) -> Duration {
        Duration::from_millis(self.finality_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        GoodyNodeCli::command().debug_assert();
    }

    #[test]
    fn counterparties_are_comma_separated() {
        let cli = GoodyNodeCli::parse_from([
            "goody-node",
            "run",
            "--party",
            "Shop",
            "--counterparties",
            "Alice,Bob,Carol",
            "--finality-timeout-ms",
            "250",
            "--log-format",
            "json",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.party, "Shop");
        assert_eq!(args.counterparties, vec!["Alice", "Bob", "Carol"]);
        assert_eq!(args.finality_timeout(), Duration::from_millis(250));
        assert_eq!(args.log_format, LogFormat::Json);
    }
}
