//! site-gateway
//!
//! Security gateway in front of the company website's renderer.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ listener (TCP or TLS)
//!                         │
//!                         ▼
//!                     pipeline ──▶ static / public / csrf / api key / rate limit / auth
//!                         │                       │
//!                         │                       └──▶ 302 / 401 / 403 / 413 / 429
//!                         ▼
//!              gateway endpoints (/api/csrf, /api/auth/*)
//!                 or upstream site renderer
//!                         │
//!     Client Response     ▼
//!     ◀────────────── security headers (CSP nonce, HSTS, frame options, ...)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use site_gateway::config::{read_config, validate_config, ConfigError};
use site_gateway::lifecycle::{wait_for_signal, Shutdown};
use site_gateway::observability::{logging, metrics};
use site_gateway::security::auth::JwtAuthority;
use site_gateway::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "site-gateway", version, about = "Security gateway for the company website")]
struct Cli {
    /// Path to a TOML config file. Defaults plus environment when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the gateway (default).
    Serve,
    /// Print a signed bearer token for the configured JWT secret.
    MintToken {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        role: Option<String>,
        #[arg(long, default_value_t = 3600)]
        ttl_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = read_config(cli.config.as_deref())?;

    if let Some(Command::MintToken {
        user_id,
        role,
        ttl_secs,
    }) = cli.command
    {
        let authority = JwtAuthority::new(&config.security.jwt_secret);
        println!("{}", authority.issue(&user_id, role.as_deref(), ttl_secs)?);
        return Ok(());
    }

    logging::init_logging(&config.observability);
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::info!("site-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        mode = ?config.security.mode,
        rate_limit_enabled = config.rate_limit.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config);
    let server_shutdown = shutdown.subscribe();

    let mut server_task = tokio::spawn(async move {
        match tls {
            Some(tls) => {
                let addr: SocketAddr = bind_address.parse()?;
                server.run_tls(addr, &tls, server_shutdown).await?;
            }
            None => {
                let listener = TcpListener::bind(&bind_address).await?;
                server.run(listener, server_shutdown).await?;
            }
        }
        Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
    });

    let finished = tokio::select! {
        _ = wait_for_signal() => None,
        result = &mut server_task => Some(result),
    };
    let result = match finished {
        Some(result) => result?,
        None => {
            shutdown.trigger();
            server_task.await?
        }
    };
    result.map_err(|e| -> Box<dyn std::error::Error> { e })?;

    tracing::info!("Shutdown complete");
    Ok(())
}
