//! Inference gateway
//!
//! A streaming reverse proxy for an LLM inference backend, built with Tokio
//! and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                 INFERENCE GATEWAY                 │
//!                        │                                                   │
//!     Caller Request     │  ┌─────────┐    ┌─────────┐    ┌──────────────┐  │
//!     ───────────────────┼─▶│  http   │───▶│ request │───▶│   routing    │  │
//!                        │  │ server  │    │ capture │    │ (body shape) │  │
//!                        │  └─────────┘    └─────────┘    └──────┬───────┘  │
//!                        │                                       │          │
//!                        │                                       ▼          │
//!                        │                               ┌──────────────┐   │
//!                        │                               │   upstream   │   │
//!                        │                               │ client + pool│   │
//!                        │                               └──────┬───────┘   │
//!                        │                                       │          │
//!     Caller Response    │  ┌─────────┐    ┌─────────┐           ▼          │
//!     ◀──────────────────┼──│response │◀───│  relay  │◀──── Inference ◀─────┼── Backend
//!                        │  │ / fault │    │ (chunks)│      backend         │
//!                        │  └─────────┘    └─────────┘                      │
//!                        │                                                   │
//!                        │  config · lifecycle · observability               │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use inference_gateway::config::{self, GatewayConfig};
use inference_gateway::lifecycle::{spawn_signal_listener, Shutdown};
use inference_gateway::observability::{init_logging, init_metrics};
use inference_gateway::{GatewayError, HttpServer};

#[derive(Parser, Debug)]
#[command(name = "inference-gateway")]
#[command(about = "Streaming gateway for an LLM inference backend", long_about = None)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::resolve(cli.config.as_deref(), |key| std::env::var(key).ok()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("inference-gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("inference-gateway: failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.listener.effective_workers())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(config)) {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: GatewayConfig) -> Result<(), GatewayError> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address(),
        upstream = %config.upstream.base_url,
        workers = config.listener.effective_workers(),
        max_connections = config.pool.max_connections,
        max_idle_connections = config.pool.max_idle_connections,
        connect_ms = config.timeouts.connect_ms,
        total_ms = config.timeouts.total_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(config)?;
    let listener = TcpListener::bind(server.config().listener.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    let _signals = spawn_signal_listener(shutdown);

    server.run(listener, stop).await
}
