use callflow::application::processors::{ActivityProcessorFactory, EventLedger, ReflexDispatcher};
use callflow::application::workflow::InboundCallWorkflow;
use callflow::application::StaticActionDecider;
use callflow::config::{Config, StorageBackend, StorageConfig};
use callflow::domain::checkpoint::CheckpointStore;
use callflow::domain::switch::SwitchClient;
use callflow::infrastructure::esl::EslSwitchClient;
use callflow::infrastructure::persistence::MemoryCheckpointStore;
use callflow::interface::api::{build_router, init_metrics, AppState};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "postgres")]
use callflow::infrastructure::persistence::{create_pool, run_migrations, PgCheckpointStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration; the first argument names an optional config file
    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting callflow");
    info!("Configuration loaded: {:?}", config.engine);

    // Initialize metrics exporter
    info!("Initializing Prometheus metrics exporter");
    let prometheus_handle = init_metrics()?;

    // Checkpoint store
    let store = open_store(&config.storage).await?;

    // Switch connection
    let (esl, events) = EslSwitchClient::connect(&config.switch).await?;
    let client: Arc<dyn SwitchClient> = Arc::new(esl);
    info!("Connected to switch at {}", config.switch.address());

    // Durable inbound workflow
    let decider = Arc::new(StaticActionDecider::new(config.routing.metadata()));
    let workflow = Arc::new(InboundCallWorkflow::new(
        client.clone(),
        decider,
        store,
        config.engine.options(),
    ));

    {
        let workflow = workflow.clone();
        tokio::spawn(async move {
            match workflow.resume_pending().await {
                Ok(results) => {
                    for (id, result) in results {
                        match result {
                            Ok(output) => info!("Resumed workflow {} finished (success: {})", id, output.success),
                            Err(e) => warn!("Resumed workflow {} failed: {}", id, e),
                        }
                    }
                }
                Err(e) => error!("Failed to list unfinished workflows: {}", e),
            }
        });
    }

    // Reflex path
    let ledger = Arc::new(EventLedger::new(config.engine.event_ledger_capacity));
    let dispatcher = Arc::new(ReflexDispatcher::new(ActivityProcessorFactory::new(client, ledger)));
    tokio::spawn(dispatcher.run(events));

    // REST API server
    let address = format!("{}:{}", config.server.host, config.server.port);
    let app = build_router(AppState::new(workflow), prometheus_handle);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("REST API server listening on {}", address);

    let api_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("API server failed: {}", e);
        }
    });

    // Keep the server running
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    api_handle.abort();

    info!("Callflow stopped");
    Ok(())
}

async fn open_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn CheckpointStore>> {
    match config.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory checkpoint store; unfinished workflows are lost on restart");
            Ok(Arc::new(MemoryCheckpointStore::new()))
        }
        #[cfg(feature = "postgres")]
        StorageBackend::Postgres => {
            info!("Initializing database connection...");
            let pool = create_pool(config).await?;
            run_migrations(&pool).await?;
            info!("Checkpoint store initialized");
            Ok(Arc::new(PgCheckpointStore::new(pool)))
        }
        #[cfg(not(feature = "postgres"))]
        StorageBackend::Postgres => {
            anyhow::bail!("postgres storage requested but the postgres feature is disabled")
        }
    }
}
