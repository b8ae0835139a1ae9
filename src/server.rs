use crate::config::{Config, DataSource};
use crate::handlers::{self, AppState};
use crate::hubspot_cli::HubSpotCliService;
use crate::services::{MockRecordService, RecordProvider};
use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

/// Builds the record provider selected by `DATA_SOURCE`.
pub fn build_provider(config: &Config) -> Arc<dyn RecordProvider> {
    match config.data_source {
        DataSource::Mock => Arc::new(MockRecordService::new()),
        DataSource::Hubspot => Arc::new(HubSpotCliService::from_config(config)),
    }
}

/// Builds the full application router.
///
/// `/` and `/index.html` serve the configured dashboard page, `/api/*` the
/// JSON endpoints, and everything else falls through to `PUBLIC_DIR`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let public_dir = state.config.public_dir.clone();
    let index_page = public_dir.join(&state.config.index_page);

    let api = Router::new()
        .route("/journey/:deal_id", get(handlers::get_journey))
        .route("/deals", get(handlers::list_deals))
        .route("/contacts", get(handlers::list_contacts))
        .route("/status", get(handlers::provider_status))
        .route("/stages", get(handlers::list_stages))
        .route("/hubspot/:object_type", get(handlers::list_crm_objects))
        .route(
            "/hubspot/:object_type/:object_id",
            get(handlers::get_crm_object),
        )
        .fallback(handlers::api_not_found);

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .route_service("/", ServeFile::new(&index_page))
        .route_service("/index.html", ServeFile::new(&index_page))
        .fallback_service(ServeDir::new(&public_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Creates `PUBLIC_DIR` when missing and reports whether the index page exists.
pub async fn prepare_public_dir(config: &Config) -> anyhow::Result<bool> {
    if !tokio::fs::try_exists(&config.public_dir).await? {
        tokio::fs::create_dir_all(&config.public_dir).await?;
        tracing::info!("Created directory '{}'", config.public_dir.display());
    }

    let index_page = config.public_dir.join(&config.index_page);
    Ok(tokio::fs::try_exists(&index_page).await?)
}

/// Opens `url` in the default browser after `delay`, without blocking startup.
pub fn spawn_browser_opener(url: String, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let target = url.clone();
        match tokio::task::spawn_blocking(move || webbrowser::open(&target)).await {
            Ok(Ok(())) => tracing::info!("Opened browser at {}", url),
            Ok(Err(e)) => tracing::warn!("Could not open browser at {}: {}", url, e),
            Err(e) => tracing::warn!("Browser task failed: {}", e),
        }
    });
}

/// Resolves when Ctrl+C is received.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Shutdown signal received, stopping server");
}
