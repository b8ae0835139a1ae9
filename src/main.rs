use journey_board::config::{Config, DataSource};
use journey_board::handlers::AppState;
use journey_board::server;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the journey board server.
///
/// This function initializes:
/// - Logging and tracing.
/// - Configuration loading.
/// - The record provider (mock data or HubSpot CLI), verifying the CLI first.
/// - The public directory and HTTP routes.
///
/// It then serves until Ctrl+C, opening the dashboard in the browser once the
/// listener is bound.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "journey_board=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let provider = server::build_provider(&config);

    if config.data_source == DataSource::Hubspot {
        let status = provider.status().await;
        if !status.is_ok() {
            tracing::error!("❌ HubSpot CLI check failed: {}", status.message);
            tracing::error!("Run the following commands:");
            tracing::error!("1. npm install -g @hubspot/cli");
            tracing::error!("2. hs auth");
            tracing::error!("3. hs account  # to verify");
            anyhow::bail!("HubSpot CLI unavailable: {}", status.message);
        }
        tracing::info!(
            "✅ HubSpot CLI ready ({})",
            status.version.as_deref().unwrap_or("unknown version")
        );
    }

    let has_index = server::prepare_public_dir(&config).await?;
    if !has_index {
        tracing::warn!(
            "⚠️  Index page '{}' not found in '{}'",
            config.index_page,
            config.public_dir.display()
        );
    }

    let app_state = Arc::new(AppState {
        config: config.clone(),
        provider,
    });
    let app = server::build_router(app_state);

    let addr = SocketAddr::new(config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let base_url = config.local_url();

    tracing::info!(
        "🚀 Journey board listening on {} ({} data)",
        addr,
        config.data_source.as_str()
    );
    tracing::info!("📍 Dashboard: {}", base_url);
    tracing::info!("📍 API Journey: {}/api/journey/DEAL_ID", base_url);
    tracing::info!("📍 API Deals: {}/api/deals", base_url);
    tracing::info!("📍 API Contacts: {}/api/contacts", base_url);
    tracing::info!("📍 API Status: {}/api/status", base_url);
    tracing::info!("📂 Static files: {}/", config.public_dir.display());

    if has_index && config.open_browser {
        server::spawn_browser_opener(base_url, config.browser_delay);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
