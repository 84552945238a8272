//! Entry point for the BOM enrichment workflow gateway: an axum binary
//! exposing progress queries and pause/resume/cancel signal relay over the
//! `WorkflowEngine` built from C2-C6, plus health/readiness probes.

mod auth;
mod handlers;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use bomenrich_audit::{AuditFinalizer, AuditSink};
use bomenrich_catalog::{CatalogStore, RedisSnapshotStore};
use bomenrich_core::{init_tracing, OrchestratorConfig};
use bomenrich_locks::RedisLockStore;
use bomenrich_suppliers::adapters::{DigiKeyAdapter, Element14Adapter, MouserAdapter};
use bomenrich_suppliers::{BackoffConfig, CircuitBreakerConfig, GatewayConfig, SupplierGateway, SupplierRegistry};
use bomenrich_workflow::{DefaultQualityScorer, EnrichmentEventStore, LineItemStore, WorkflowEngine, WorkflowRegistry};

use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Arc::new(OrchestratorConfig::load()?);

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await?;

    let redis_url = std::env::var("REDIS_URL").expect("REDIS_URL must be set");
    let redis_cfg = deadpool_redis::Config::from_url(redis_url);
    let redis = redis_cfg.create_pool(Some(deadpool_redis::Runtime::Tokio1))?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let s3_client = aws_sdk_s3::Client::new(&aws_config);
    let audit_bucket = std::env::var("AUDIT_BUCKET").unwrap_or_else(|_| "bomenrich-audit".to_string());

    let mut supplier_registry = SupplierRegistry::new();
    if let Ok(token) = std::env::var("DIGIKEY_ACCESS_TOKEN") {
        let client_id = std::env::var("DIGIKEY_CLIENT_ID").unwrap_or_default();
        supplier_registry.register(Arc::new(DigiKeyAdapter::new(client_id, token)), 0);
    }
    if let Ok(key) = std::env::var("MOUSER_API_KEY") {
        supplier_registry.register(Arc::new(MouserAdapter::new(key)), 1);
    }
    if let Ok(key) = std::env::var("ELEMENT14_API_KEY") {
        let store = std::env::var("ELEMENT14_STORE").unwrap_or_else(|_| "us.farnell.com".to_string());
        supplier_registry.register(Arc::new(Element14Adapter::new(key, store)), 2);
    }

    let gateway_config = GatewayConfig {
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: config.circuit_failure_threshold,
            success_threshold: config.circuit_success_threshold,
            timeout: config.circuit_timeout(),
        },
        backoff: BackoffConfig { max_attempts: config.retry_max_attempts, ..Default::default() },
        supplier_confidence_threshold: config.supplier_confidence_threshold,
        call_deadline: Duration::from_secs(10),
    };

    let engine = Arc::new(WorkflowEngine {
            locks: Arc::new(RedisLockStore::new(redis.clone())),
            gateway: Arc::new(SupplierGateway::new(supplier_registry, gateway_config)),
            catalog: Arc::new(CatalogStore::new(db.clone())),
            snapshot: Arc::new(RedisSnapshotStore::new(redis.clone(), db.clone())),
            audit: Arc::new(AuditSink::new(s3_client.clone(), audit_bucket.clone())),
            finalizer: Arc::new(AuditFinalizer::new(s3_client, audit_bucket)),
            scorer: Arc::new(DefaultQualityScorer),
            config,
            registry: Arc::new(WorkflowRegistry::new()),
            events: Arc::new(EnrichmentEventStore::new(db.clone())),
            lines: Arc::new(LineItemStore::new(db.clone())),
        });

    let app_state = AppState { engine, db };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/workflows/:workflow_id/progress", get(handlers::get_progress))
        .route("/workflows/:workflow_id/signal", post(handlers::signal_workflow))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    let bind_addr = std::env::var("GATEWAY_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "bomenrich-gateway listening");
    axum::serve(listener, app).await?;

    Ok(())
}
