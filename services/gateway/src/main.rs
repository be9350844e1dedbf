use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gateway::collector::{spawn_collectors, CollectorContext, Supervisor};
use gateway::config::{load_dotenv, AppConfig};
use gateway::history::HistoryService;
use gateway::markets::MarketRegistry;
use gateway::notify::Notifier;
use gateway::router::create_router;
use gateway::rpc::{HttpFillSource, RpcAccountSource};
use gateway::state::AppState;
use market_data::metrics::IngestMetrics;
use persistence::list::system_clock;
use persistence::open_store;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Delay before a crashed collector loop is restarted.
const RESTART_BACKOFF: Duration = Duration::from_secs(5);

/// How long collectors get to finish after the server stops.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let dotenv = load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Some(path) = dotenv {
        tracing::info!(path = %path.display(), "Loaded environment file");
    }
    tracing::info!(version = market_data::SERVICE_VERSION, "Starting trade history service");

    let config = AppConfig::from_env()?;
    let markets = Arc::new(MarketRegistry::load(&config.markets_file)?);
    tracing::info!(
        markets = markets.len(),
        file = %config.markets_file.display(),
        "Markets loaded"
    );

    let store = open_store(&config.store)?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let notifier = Arc::new(Notifier::new(client.clone(), config.webhook_url.clone()));
    let metrics = Arc::new(IngestMetrics::new());
    let clock = system_clock();

    let shutdown_token = CancellationToken::new();
    let mut supervisor = Supervisor::new(shutdown_token.clone(), Arc::clone(&metrics), RESTART_BACKOFF);

    if config.web_only {
        tracing::warn!("ROLE=web, trade collection disabled");
    } else {
        let ctx = CollectorContext {
            store: Arc::clone(&store),
            notifier: Arc::clone(&notifier),
            metrics: Arc::clone(&metrics),
            clock: Arc::clone(&clock),
            interval: config.interval,
        };
        let started = spawn_collectors(
            &mut supervisor,
            &markets,
            Arc::new(RpcAccountSource::new(client.clone(), config.rpc_url.clone())),
            Arc::new(HttpFillSource::new(client.clone())),
            &ctx,
        );
        tracing::info!(
            collectors = started,
            interval_secs = config.interval.as_secs(),
            rpc = %config.rpc_url,
            "Collectors started"
        );
    }

    let history = Arc::new(HistoryService::new(
        store,
        Arc::clone(&markets),
        config.max_candles,
        config.recent_trades_limit,
        clock,
    ));
    let state = AppState {
        history,
        markets,
        metrics,
        notifier,
        collecting: !config.web_only,
    };
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    tokio::spawn(await_shutdown(shutdown_token.clone()));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_token.clone().cancelled_owned())
        .await?;

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, supervisor.shutdown())
        .await
        .is_err()
    {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Collectors did not stop in time"
        );
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM, then cancel everything.
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }

    shutdown_token.cancel();
}
