use axum::middleware::from_fn_with_state;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use storefront_payments::config::AppConfig;
use storefront_payments::gateways::AdapterRegistry;
use storefront_payments::http::middleware::rate_limit;
use storefront_payments::http::router::router;
use storefront_payments::repo::pg_store::PgPaymentStore;
use storefront_payments::repo::store::PaymentStore;
use storefront_payments::service::gateway_admin::GatewayAdmin;
use storefront_payments::service::orchestrator::PaymentOrchestrator;
use storefront_payments::service::webhook_router::WebhookRouter;
use storefront_payments::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let store: Arc<dyn PaymentStore> = Arc::new(PgPaymentStore { pool: pool.clone() });
    let adapters = AdapterRegistry::with_defaults(&cfg.endpoints(), reqwest::Client::new());
    let orchestrator = PaymentOrchestrator::new(store.clone(), adapters, cfg.call_cap());

    let state = AppState {
        webhook_router: WebhookRouter::new(orchestrator.clone()),
        gateway_admin: GatewayAdmin { store },
        orchestrator,
    };

    let limiter = from_fn_with_state(
        rate_limit::RateLimitState {
            redis_client: redis::Client::open(cfg.redis_url.clone())?,
            max_per_minute: cfg.rate_limit_per_minute,
        },
        rate_limit::enforce,
    );
    let app = router(state, cfg.internal_api_key.clone(), limiter);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
