use std::sync::Arc;

use headlines::client::NewsClient;
use headlines::config::Config;
use headlines::db::BookmarkStore;
use headlines::feed::FeedCoordinator;
use headlines::routes::{self, AppState};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "headlines=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("HEADLINES_CONFIG").unwrap_or_else(|_| "headlines.toml".to_string());
    let mut config = Config::load(&config_path)?;
    if let Ok(key) = std::env::var("NEWSAPI_KEY") {
        config.api_key = key;
    }
    if config.api_key.is_empty() {
        warn!("No NewsAPI key configured; requests will be rejected upstream");
    }
    info!("Loaded configuration from {}", config_path);

    // Initialize bookmark database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:headlines.db?mode=rwc".to_string());
    let bookmarks = BookmarkStore::new(&database_url).await?;
    bookmarks.initialize().await?;
    info!("Bookmark database initialized");

    // Create feed coordinator
    let client = NewsClient::new(&config)?;
    let feed = Arc::new(FeedCoordinator::new(client, config.failed_page_policy));

    // Initial load in the background so the server comes up immediately
    let initial_feed = feed.clone();
    let default_sources = config.default_sources.clone();
    tokio::spawn(async move {
        let result = initial_feed.load_initial_data(&default_sources).await;
        if let Err(e) = result.articles {
            warn!("Initial article load failed: {}", e);
        }
        if let Err(e) = result.sources {
            warn!("Initial source load failed: {}", e);
        }
    });

    let state = Arc::new(AppState {
        feed,
        bookmarks: Arc::new(bookmarks),
    });
    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Server starting on http://{}", config.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
