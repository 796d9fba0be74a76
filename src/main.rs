use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use polinpin::api::{self, AppState};
use polinpin::config::Config;

/// How often expired sessions and idle rate-limit entries are swept.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "polinpin")]
#[command(about = "Tree-test study server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port for HTTP API (overrides POLINPIN_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Interface to bind (overrides POLINPIN_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Start without the demo study
        #[arg(long)]
        no_seed: bool,
    },
    /// Print the configuration the server would start with
    Config,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "polinpin=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = Config::from_env();

    match cli.command {
        Some(Commands::Serve {
            port,
            host,
            no_seed,
        }) => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }
            if no_seed {
                config.seed_demo = false;
            }
            serve(config).await?;
        }
        Some(Commands::Config) => {
            println!("{:#?}", config);
        }
        None => serve(config).await?,
    }

    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    tracing::info!("Starting polinpin server on {}", addr);

    let state = AppState::new(config);
    spawn_maintenance(state.clone());

    let app = api::create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("polinpin server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("polinpin server stopped");
    Ok(())
}

fn spawn_maintenance(state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = state.auth.sessions().purge_expired();
            if purged > 0 {
                tracing::debug!("purged {} expired sessions", purged);
            }
            if let Some(limiter) = &state.auth_limiter {
                limiter.cleanup();
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
