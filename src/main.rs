mod config;
mod db;
mod engine;
mod models;
mod responses;
mod routes;
mod services;
mod state;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::http::Method;
use axum::{
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use config::Config;
use db::postgres_lead_repository::PostgresLeadRepository;
use db::postgres_webhook_log_repository::PostgresWebhookLogRepository;
use db::postgres_workflow_repository::PostgresWorkflowRepository;
use reqwest::Client;
use responses::JsonResponse;
use routes::events::ingest_event;
use routes::webhook_logs::list_webhook_logs;
use routes::workflows::{
    create_workflow, delete_workflow, execute_workflow_now, get_workflow, list_executions,
    list_workflows, update_workflow,
};
use services::webhook::WebhookService;
use services::whatsapp::HttpWhatsAppGateway;
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::db::lead_repository::LeadRepository;
use crate::db::webhook_log_repository::WebhookLogRepository;
use crate::db::workflow_repository::WorkflowRepository;
use crate::services::whatsapp::WhatsAppGateway;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let rate_limit_ms: u64 = std::env::var("RATE_LIMITER_MILLISECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        // Default: 200ms/token (~5 req/sec)
        .unwrap_or(200);
    let rate_limit_burst: u32 = std::env::var("RATE_LIMITER_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(20);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(rate_limit_ms)
            .burst_size(rate_limit_burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .unwrap(),
    );

    // Background cleanup of the rate-limiter's per-IP map
    let governor_limiter = governor_conf.limiter().clone();
    std::thread::spawn(move || {
        let interval = std::time::Duration::from_secs(60);
        loop {
            std::thread::sleep(interval);
            governor_limiter.retain_recent();
        }
    });

    let config = Arc::new(Config::from_env());

    let pg_pool = establish_connection(&config.database_url).await;
    let workflow_repo = Arc::new(PostgresWorkflowRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn WorkflowRepository>;
    let leads = Arc::new(PostgresLeadRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn LeadRepository>;
    let webhook_log_repo = Arc::new(PostgresWebhookLogRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn WebhookLogRepository>;

    let http_client = Arc::new(Client::new());

    let webhooks = WebhookService::new(
        webhook_log_repo,
        http_client.clone(),
        config.webhook_base_url.clone(),
        config.webhook_secret.clone(),
        config.webhook_max_retries,
    );
    let whatsapp = Arc::new(HttpWhatsAppGateway {
        client: http_client,
        base_url: config.whatsapp_api_base_url.clone(),
        api_key: config.whatsapp_api_key.clone(),
    }) as Arc<dyn WhatsAppGateway>;

    let state = AppState {
        workflow_repo,
        leads,
        whatsapp,
        webhooks,
        config: config.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_origin.parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    let tenant_routes = Router::new()
        .route("/workflows", post(create_workflow).get(list_workflows))
        .route(
            "/workflows/{workflow_id}",
            get(get_workflow)
                .put(update_workflow)
                .delete(delete_workflow),
        )
        .route("/events/{trigger_type}", post(ingest_event))
        .route("/webhook-logs", get(list_webhook_logs));

    let workflow_routes = Router::new()
        .route("/{workflow_id}/execute", post(execute_workflow_now))
        .route("/{workflow_id}/executions", get(list_executions));

    let app = Router::new()
        .route("/", get(root))
        .nest("/api/tenants/{tenant_id}", tenant_routes)
        .nest("/api/workflows", workflow_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer {
            config: governor_conf.clone(),
        })
        .layer(cors);

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));

    let listener = TcpListener::bind(addr).await.unwrap();
    println!("Running at http://{}", addr);
    axum::serve(listener, make_service).await.unwrap();
}

/// A simple root route.
async fn root() -> Response {
    JsonResponse::success("Hello, LeadFlow!").into_response()
}

/// Establish a connection to the database and verify it.
async fn establish_connection(database_url: &str) -> PgPool {
    let pool = PgPool::connect(database_url)
        .await
        .expect("Failed to connect to the database");

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .expect("Failed to verify database connection");

    info!("✅ Successfully connected to the database");
    pool
}
