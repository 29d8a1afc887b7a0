// Standalone MCP server binary

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use nefino_mcp::health::{self, HealthState};
use nefino_mcp::{default_registry, AppConfig, McpServer};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nefino-mcp", version)]
#[command(about = "MCP server for the Nefino renewable-energy news API", long_about = None)]
struct Args {
    /// Path to configuration file (optional)
    #[arg(short, long, env = "NEFINO_CONFIG", default_value = "nefino.toml")]
    config: PathBuf,

    /// Address for the HTTP health endpoint, e.g. 127.0.0.1:8080
    #[arg(long, env = "NEFINO_HEALTH_ADDR")]
    health_addr: Option<String>,

    /// Log output format (logs always go to stderr)
    #[arg(long, env = "NEFINO_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

fn init_tracing(format: LogFormat) {
    // stdout carries the protocol
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "nefino=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Grace period for tasks still running after the server stops
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn main() -> ExitCode {
    // Must run before clap reads env-backed arguments
    let dotenv = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(args.log_format);

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let code = match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    };

    // The stdin reader sits in a blocking read that never returns on its own
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    code
}

/// Resolves on ctrl-c, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Interrupted, shutting down"),
        _ = terminate => tracing::info!("Terminated, shutting down"),
    }
}

async fn run(args: Args) -> Result<()> {
    tracing::info!("Nefino MCP server starting");

    let config = AppConfig::load(&args.config)?;
    let client = config.client()?;
    let credential = client.credential_status().await;
    tracing::info!(
        base_url = %client.config().base_url,
        news_path = %client.config().news_path,
        credential = %credential.source,
        "Upstream configured"
    );

    let registry = default_registry(client.clone());
    let tool_names: Vec<String> = registry.list_schemas().into_iter().map(|t| t.name).collect();
    tracing::info!(tools = ?tool_names, "Registered {} tools", tool_names.len());

    let health_addr = args.health_addr.or(config.health.addr.clone());
    let health_task = match health_addr {
        Some(addr) => {
            let listener = health::bind(&addr).await?;
            let state = HealthState {
                client,
                tools: tool_names,
            };
            Some(tokio::spawn(async move {
                if let Err(e) = health::serve(listener, state).await {
                    tracing::error!(error = %e, "Health endpoint stopped");
                }
            }))
        }
        None => None,
    };

    let server = McpServer::new(registry);
    server
        .run_stdio_until(shutdown_signal())
        .await
        .context("MCP transport failed")?;

    if let Some(task) = health_task {
        task.abort();
    }

    tracing::info!("Nefino MCP server stopped");
    Ok(())
}
