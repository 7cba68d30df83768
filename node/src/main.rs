// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Goody Node
//!
//! Entry point for the `goody-node` binary. Parses CLI arguments,
//! initializes logging and metrics, wires the hosted party's flows to an
//! in-process vault, key store and notary, and serves the HTTP API.
//!
//! Subcommands:
//!
//! - `run`: start the node
//! - `version`: print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use goody_protocol::config::FlowConfig;
use goody_protocol::crypto::Keypair;
use goody_protocol::flows::GoodyFlows;
use goody_protocol::identity::Party;
use goody_protocol::services::{LocalKeyStore, LocalNotary};
use goody_protocol::vault::InMemoryVault;

use cli::{Commands, GoodyNodeCli};
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = GoodyNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the node: API server plus metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "goody_node=info,goody_protocol=info,tower_http=debug",
        args.log_format,
    );

    tracing::info!(
        party = %args.party,
        port = args.port,
        metrics_port = args.metrics_port,
        notary = %args.notary,
        "starting goody-node"
    );

    // --- Ledger collaborators ---
    let vault = Arc::new(InMemoryVault::new());
    let keys = Arc::new(LocalKeyStore::new());

    let me = Party::new(args.party.clone(), keys.insert(Keypair::generate()));
    let notary_party = Party::new(args.notary.clone(), Keypair::generate().public_key());
    let notary = Arc::new(LocalNotary::new(notary_party.clone(), vault.clone()));

    let mut known = vec![me.clone(), notary_party.clone()];
    for name in args.counterparties.iter().filter(|n| !n.is_empty()) {
        let party = Party::new(name.clone(), keys.insert(Keypair::generate()));
        tracing::info!(party = %party, id = %party.id(), "counterparty registered");
        known.push(party);
    }
    tracing::info!(party = %me, id = %me.id(), "hosting party");

    let config = FlowConfig::default().with_finality_timeout(args.finality_timeout());
    let flows = GoodyFlows::new(me, vault, keys, notary, config);

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            goody_protocol::config::PROTOCOL_VERSION,
        ),
        flows: Arc::new(flows),
        directory: Arc::new(api::Directory::new(known)),
        default_notary: notary_party,
        metrics: Arc::clone(&node_metrics),
    };
    tracing::info!(version = %app_state.version, "node ready");

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    tracing::info!("goody-node stopped");
    Ok(())
}

fn print_version() {
    println!("goody-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol   {}", goody_protocol::config::PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
