mod config_file;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use routecodex_core::{Runtime, RuntimeConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "routecodex")]
struct Cli {
    /// Path to the provider/route/template config file. Omit to start with
    /// no providers configured.
    #[arg(long, env = "ROUTECODEX_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    runtime: RuntimeConfig,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let runtime = tokio::runtime::Runtime::new().expect("failed to build tokio runtime");
    runtime.block_on(run())
}

async fn run() -> ExitCode {
    let cli = Cli::parse();

    let snapshot = match config_file::load_snapshot(cli.config.as_deref()) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::error!(error = %err, "failed to load config file");
            return ExitCode::from(2);
        }
    };

    let core = match Runtime::bootstrap(cli.runtime, snapshot).await {
        Ok(core) => core,
        Err(err) => {
            tracing::error!(error = %err, "bootstrap failed");
            return ExitCode::from(err.exit_code() as u8);
        }
    };

    let bind = format!("{}:{}", core.config.host, core.config.port);
    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %bind, "failed to bind gateway listener");
            return ExitCode::from(2);
        }
    };

    tracing::info!(%bind, "routecodex gateway listening");
    let app = routecodex_gateway::build_router(core.gateway_state());

    let shutdown_signal = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    if let Err(err) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal).await {
        tracing::error!(error = %err, "server error");
    }

    core.shutdown().await;
    ExitCode::from(0)
}
