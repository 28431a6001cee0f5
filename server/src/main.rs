use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use spring83_server::board::{self, index::BoardIndex, signature::Ed25519Verifier, store::BoardStore};
use spring83_server::config::{generate_config_template, Config};
use spring83_server::{routes, state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("spring83_server=info"));
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
    }

    tracing::info!("Spring '83 server v{} starting", env!("CARGO_PKG_VERSION"));

    let boards_config = config.boards();

    // Load persisted boards; the on-disk pair is authoritative across restarts
    let store = BoardStore::open(&config.content_dir)?;
    let index = Arc::new(BoardIndex::new());
    for (key, board) in store.load_all()? {
        index.upsert(&key, board);
    }
    tracing::info!(
        "Loaded {} boards from {}",
        index.len(),
        store.root().display()
    );

    let app_state = state::AppState {
        index,
        store,
        verifier: Arc::new(Ed25519Verifier),
        fqdn: config.fqdn.clone(),
        contact_email: config.contact_email.clone(),
        io_timeout: Duration::from_secs(boards_config.io_timeout_secs),
    };

    // The first sweep also evicts boards that expired while the server was down
    let sweeper = board::sweeper::spawn_ttl_sweeper(
        app_state.clone(),
        Duration::from_secs(boards_config.sweep_interval_secs),
    );

    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {} as {}", addr, config.fqdn);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    tracing::info!("Server stopped");

    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
