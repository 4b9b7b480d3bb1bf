mod config;
mod routes;
mod session;
mod tokens;

use clap::Parser;
use config::BrokerConfig;
use routes::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const REAP_INTERVAL: Duration = Duration::from_secs(30);

/// Issue console tokens and serve PTY consoles over WebSocket.
#[derive(Debug, Parser)]
#[command(name = "console-broker", version)]
struct Args {
    /// Path to the server and application inventory
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, short, env = "PORT", default_value_t = 3000)]
    port: u16,
}

fn load_config(path: Option<PathBuf>) -> Result<BrokerConfig, config::ConfigError> {
    if let Some(path) = path {
        return BrokerConfig::load(&path);
    }
    match BrokerConfig::default_path() {
        Some(path) if path.exists() => BrokerConfig::load(&path),
        _ => {
            tracing::warn!("No configuration found, serving no consoles");
            Ok(BrokerConfig::default())
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "console_broker=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = match load_config(args.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };
    tracing::info!(
        "Loaded {} server(s) and {} application(s)",
        config.servers.len(),
        config.applications.len()
    );

    let state = AppState::new(config);

    let tokens = state.tokens.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REAP_INTERVAL);
        loop {
            interval.tick().await;
            tokens.reap_expired();
        }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Cannot listen on {addr}: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!("Console broker listening on http://{addr}");

    if let Err(e) = axum::serve(listener, routes::router(state)).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}
