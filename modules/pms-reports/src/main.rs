use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use pms_reports::{
    config::{Config, StrategyKind},
    db::init_pool,
    definitions::DefinitionResolver,
    metrics::Metrics,
    repos::{PgQueryExecutor, QueryExecutor},
    routes::{self, metrics::MetricsState, ReportsState},
    services::{ReportEngine, ReportStrategy},
    store::{ReportStore, PURGE_INTERVAL},
};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    tracing::info!("Starting PMS reports service...");

    let config = Config::from_env().expect("Failed to load configuration from environment");

    let strategy = match config.strategy {
        StrategyKind::Builtin => ReportStrategy::Builtin,
        StrategyKind::Definition => {
            ReportStrategy::Definition(DefinitionResolver::new(config.install_path.clone()))
        }
    };
    let error_policy = config
        .error_policy
        .unwrap_or_else(|| strategy.default_error_policy());

    tracing::info!(
        "Configuration loaded: host={}, port={}, strategy={}, error_policy={}, install_path={}",
        config.host,
        config.port,
        config.strategy,
        error_policy,
        config.install_path.display()
    );

    tracing::info!("Connecting to database...");
    let pool = init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    let executor: Arc<dyn QueryExecutor> =
        Arc::new(PgQueryExecutor::new(pool).with_timeout(config.query_timeout));

    let metrics = Metrics::new();
    let engine = ReportEngine::new(executor, strategy)
        .with_error_policy(error_policy)
        .with_metrics(metrics.clone());

    let store = ReportStore::new(config.store_ttl, config.store_capacity);
    store.spawn_purge_task(PURGE_INTERVAL);

    let app = routes::app(
        Arc::new(ReportsState {
            engine: Arc::new(engine),
            store,
        }),
        Arc::new(MetricsState { metrics }),
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("HOST and PORT must form a valid socket address");
    tracing::info!("PMS reports service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
