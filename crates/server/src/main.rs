//! Farmhand Server
//!
//! Main entry point for the farmhand assistant.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use farmhand_agent::AgentServices;
use farmhand_config::{load_settings, Settings};
use farmhand_llm::{create_semantic_services, SemanticServices};
use farmhand_persistence::{open_store, RetryQueue};
use farmhand_server::{
    create_router, init_metrics, record_queue_pass, AppState, HttpActionExecutor,
    HttpConnectivityProbe,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("FARMHAND_ENV").ok();
    // Missing files fall back to defaults; invalid values are fatal
    let config = load_settings(env.as_deref())?;

    init_tracing(&config);

    tracing::info!("Starting farmhand server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?config.environment,
        config_path = env.as_deref().unwrap_or("default"),
        "Configuration loaded"
    );

    let metrics = if config.observability.metrics_enabled {
        init_metrics()
    } else {
        None
    };

    let store = open_store(&config.persistence)?;
    let retry_queue = Arc::new(
        RetryQueue::open(Arc::clone(&store), &config.retry_queue, config.executor.timeout()).await?,
    );
    tracing::info!(
        pending = retry_queue.len().await,
        capacity = retry_queue.capacity(),
        "Retry queue loaded"
    );

    let semantic = match create_semantic_services(&config.semantic) {
        Ok(services) => services,
        Err(e) => {
            tracing::warn!(error = %e, "Semantic helpers unavailable, continuing rule-based only");
            SemanticServices::disabled()
        }
    };

    let executor = Arc::new(HttpActionExecutor::new(&config.executor)?);
    let probe = Arc::new(HttpConnectivityProbe::new(&config.executor)?);
    tracing::info!(endpoint = %config.executor.endpoint, "Action executor configured");

    let services = AgentServices {
        executor,
        classifier: semantic.classifier,
        extractor: semantic.extractor,
        retry_queue,
        store,
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let queue_interval = Duration::from_secs(config.retry_queue.process_interval_secs);

    let state = AppState::new(config, services, probe, metrics);
    let cleanup_shutdown = state.sessions.start_cleanup_task();
    let queue_shutdown = spawn_queue_processor(state.clone(), queue_interval);

    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = cleanup_shutdown.send(true);
    let _ = queue_shutdown.send(true);
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Replay the retry queue on a fixed interval
fn spawn_queue_processor(state: AppState, period: Duration) -> tokio::sync::watch::Sender<bool> {
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let queue = state.retry_queue();
                    if queue.is_empty().await {
                        continue;
                    }
                    let report = queue
                        .process_queue(state.services.executor.as_ref(), state.probe.as_ref())
                        .await;
                    record_queue_pass(&report);
                    tracing::debug!(?report, "Retry pass finished");
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Retry queue processor shutting down");
                        break;
                    }
                }
            }
        }
    });

    shutdown_tx
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("farmhand={},tower_http=debug", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
