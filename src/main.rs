//! gci-proxy binary
//!
//! Front a managed-runtime backend with the GC-interceptor proxy: flags
//! select the upstream, the control endpoint and the collection tuning.

use std::{sync::Arc, time::Duration};

use clap::{ArgAction, Parser};
use gci_proxy::{
    agent::AgentClient,
    config::ProxyConfig,
    engine::{ControlEngine, EngineOptions},
    error::{ProxyError, Result},
    metrics::ProxyMetrics,
    proxy::{create_router, AppState},
    upstream::UpstreamClient,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// GC-aware reverse HTTP proxy
#[derive(Parser)]
#[command(name = "gci-proxy", version, about, long_about = None)]
struct Cli {
    /// TCP port the front server binds
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Upstream base URL
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    target: String,

    /// Size of the backend's young generation, in bytes
    #[arg(long)]
    ygen: i64,

    /// Whether to print per-cycle diagnostics to stdout
    #[arg(long = "print_gc", default_value_t = true, action = ArgAction::Set)]
    print_gc: bool,

    /// Control endpoint address, when distinct from the target
    #[arg(long = "gci_target")]
    gci_target: Option<String>,

    /// URL path appended to the control endpoint for protocol requests
    #[arg(long = "gci_path", default_value = "")]
    gci_path: String,

    /// Disable sampling, shedding and control calls (pure pass-through)
    #[arg(long = "disable_gci", action = ArgAction::SetTrue)]
    disable_gci: bool,

    /// Read/write timeout for the upstream and control clients, in seconds
    #[arg(long = "client_timeout_secs", default_value_t = 120)]
    client_timeout_secs: u64,
}

impl Cli {
    fn into_config(self) -> ProxyConfig {
        ProxyConfig {
            port: self.port,
            target: self.target,
            ygen: self.ygen,
            print_gc: self.print_gc,
            gci_target: self.gci_target,
            gci_path: self.gci_path,
            disable_gci: self.disable_gci,
            client_timeout_secs: self.client_timeout_secs,
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn startup_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_config();
    config.validate()?;

    let timeout = Duration::from_secs(config.client_timeout_secs);
    let metrics = Arc::new(ProxyMetrics::new());
    let agent = AgentClient::new(config.control_endpoint(), timeout)?;
    let options = EngineOptions {
        gen_size: config.ygen,
        seed: startup_seed(),
        print_gc: config.print_gc,
        enabled: !config.disable_gci,
    };
    let engine = Arc::new(ControlEngine::new(agent, &options, Arc::clone(&metrics)));
    let upstream = Arc::new(UpstreamClient::new(&config.target, timeout)?);
    let app = create_router(AppState {
        engine,
        upstream,
        metrics,
    });

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ProxyError::Bind {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;
    info!(
        %addr,
        target = %config.target,
        control = %config.control_endpoint(),
        gci = !config.disable_gci,
        "gci-proxy listening"
    );
    axum::serve(listener, app)
        .await
        .map_err(|e| ProxyError::Bind {
            addr,
            reason: e.to_string(),
        })?;
    Ok(())
}
