use axum::{routing::get, routing::post, routing::put, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use calosnap::app_state::AppState;
use calosnap::config::AppConfig;
use calosnap::db;
use calosnap::routes;
use calosnap::services::analysis::{GeminiProvider, OpenAiProvider, ProviderRegistry};
use calosnap::services::classifier::FoodGate;
use calosnap::services::connectivity::{NetworkState, SysfsNetworkState};
use calosnap::services::drain::OfflineAnalysisJob;
use calosnap::services::notifier::{LogNotifier, Notifier, WebhookNotifier};
use calosnap::services::scheduler::{DeferredJobScheduler, SchedulerOptions};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing calosnap server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_histogram!("analysis_seconds", "Time spent in a cloud analysis call");
    metrics::describe_counter!("meals_analyzed_total", "Meals analyzed on the interactive path");
    metrics::describe_counter!(
        "meals_rejected_total",
        "Uploads rejected by the food screen"
    );
    metrics::describe_counter!(
        "offline_requests_enqueued_total",
        "Analysis requests queued while offline"
    );
    metrics::describe_counter!(
        "offline_requests_drained_total",
        "Queued requests analyzed and logged"
    );
    metrics::describe_counter!(
        "offline_drain_retries_total",
        "Drain runs that ended in a scheduler retry"
    );
    metrics::describe_gauge!(
        "offline_queue_depth",
        "Requests currently waiting for connectivity"
    );

    // Initialize database
    tracing::info!("Opening SQLite database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to open database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Analysis backends, selected at runtime
    let providers = Arc::new(ProviderRegistry::new(
        Arc::new(OpenAiProvider::new(&config.openai_api_key, &config.openai_model)),
        Arc::new(GeminiProvider::new(&config.gemini_api_key, &config.gemini_model)),
        config.cloud_provider,
    ));
    tracing::info!(provider = %config.cloud_provider, "analysis provider selected");

    // Food/non-food screen (optional)
    let food_gate = config.classifier_model_path.as_deref().map(|path| {
        tracing::info!(path = %path.display(), "Loading food screen model");
        Arc::new(FoodGate::load(path).expect("Failed to load food screen model"))
    });

    // Notification surface
    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url)),
        None => Arc::new(LogNotifier),
    };

    // Connectivity probe and deferred-job scheduler
    let network: Arc<dyn NetworkState> = Arc::new(SysfsNetworkState::new());
    let drain_job = Arc::new(OfflineAnalysisJob::new(
        db_pool.clone(),
        providers.clone(),
        notifier,
    ));
    let scheduler = Arc::new(DeferredJobScheduler::spawn(
        network.clone(),
        drain_job,
        SchedulerOptions {
            poll_interval: Duration::from_millis(config.connectivity_poll_ms),
            initial_backoff: Duration::from_millis(config.drain_backoff_ms),
            max_backoff: Duration::from_millis(config.drain_backoff_max_ms),
        },
    ));

    // Create shared application state
    let state = AppState::new(db_pool, providers, network, scheduler, food_gate);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/meals/analyze", post(routes::meals::analyze_meal))
        .route("/api/v1/meals", get(routes::meals::list_meals))
        .route(
            "/api/v1/meals/summary/today",
            get(routes::meals::today_summary),
        )
        .route(
            "/api/v1/meals/summary/weekly",
            get(routes::meals::weekly_summary),
        )
        .route("/api/v1/recommendation", get(routes::meals::recommendation))
        .route("/api/v1/provider", put(routes::meals::switch_provider))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024)); // 10 MB limit

    tracing::info!("Starting calosnap on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
