#![forbid(unsafe_code)]

//! `agent-warden` — MCP session supervisor binary.
//!
//! Bootstraps configuration, the approval callback bridge, and the stdio
//! MCP transport, then supervises agent CLI sessions until shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use rmcp::service::ServiceExt;
use rmcp::transport::io::stdio;

use agent_warden::agent::policy::policy_for;
use agent_warden::approval::bridge;
use agent_warden::config::WardenConfig;
use agent_warden::mcp::handler::WardenServer;
use agent_warden::orchestrator::manager::SessionManager;
use agent_warden::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "agent-warden", about = "MCP session supervisor for coding-agent CLIs", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// A missing file is not an error; defaults plus `WARDEN_*` environment
    /// overrides apply.
    #[arg(long, default_value = "warden.toml")]
    config: PathBuf,

    /// Log output format (text or json).
    ///
    /// Logs go to stderr; stdout belongs to the MCP transport.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("agent-warden bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let config = Arc::new(WardenConfig::load_from_path(&args.config)?);
    info!(family = ?config.agent_family, cli = %config.cli_path, "configuration loaded");

    // ── Build the supervisor core ───────────────────────
    let policy = policy_for(config.agent_family);
    let manager = SessionManager::new(Arc::clone(&config), policy);
    let ct = manager.shutdown_token();

    // ── Start the approval bridge ───────────────────────
    let bridge = bridge::start(Arc::clone(&manager), ct.clone()).await?;
    manager.set_bridge_endpoint(bridge.endpoint.clone());

    // ── Start the stdio MCP transport ───────────────────
    // stdout belongs to the protocol stream. The control plane hanging up
    // (stdin EOF) winds the whole supervisor down; there is nothing to
    // serve once the only operator is gone.
    let stdio_manager = Arc::clone(&manager);
    let stdio_ct = ct.clone();
    let stdio_shutdown_ct = ct.clone();
    let stdio_handle = tokio::spawn(async move {
        match WardenServer::new(stdio_manager)
            .serve_with_ct(stdio(), stdio_ct)
            .await
        {
            Ok(service) => {
                if let Err(err) = service.waiting().await {
                    error!(%err, "MCP connection ended with an error");
                } else {
                    info!("control plane disconnected");
                }
            }
            Err(err) => error!(%err, "could not bring up the stdio MCP transport"),
        }
        stdio_shutdown_ct.cancel();
    });

    info!("supervisor ready");

    // ── Wait for shutdown ───────────────────────────────
    tokio::select! {
        () = shutdown_signal() => {
            info!("shutdown signal received, starting graceful shutdown");
        }
        () = ct.cancelled() => {
            info!("transport closed, starting graceful shutdown");
        }
    }
    manager.shutdown().await;

    // Spawn a background listener for a second signal (force-exit).
    tokio::spawn(async {
        shutdown_signal().await;
        error!("second shutdown signal received, forcing exit");
        std::process::exit(1);
    });

    // ── Bounded drain ───────────────────────────────────
    let drain = async {
        let _ = stdio_handle.await;
        bridge.join().await;
    };
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
        error!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "graceful shutdown timed out, exiting"
        );
    }

    info!("agent-warden shut down");
    Ok(())
}

/// Maximum time to wait for graceful shutdown before giving up.
const SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the MCP stream; all diagnostics go to stderr.
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
