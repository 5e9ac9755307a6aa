use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelmind_api::{
    api::{create_router, AppState, Dependencies},
    config::Config,
    db::{create_redis_client, Cache, LocalStorage},
    services::{
        catalog::{GoogleBooksClient, TmdbClient},
        IpApiLocator, OpenAiClient, RetryPolicy,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reelmind_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let redis_client = create_redis_client(&config.redis_url)?;
    let (cache, cache_writer) = Cache::new(redis_client);

    let storage = LocalStorage::open(&config.data_dir)?;

    let deps = Dependencies {
        chat_client: Arc::new(OpenAiClient::new(
            config.openai_api_key.clone(),
            config.openai_api_url.clone(),
            config.openai_model.clone(),
        )),
        movies: Arc::new(TmdbClient::new(
            cache,
            config.tmdb_api_key.clone(),
            config.tmdb_api_url.clone(),
            config.tmdb_image_url.clone(),
        )),
        books: Arc::new(GoogleBooksClient::new(
            config.google_books_api_key.clone(),
            config.google_books_api_url.clone(),
        )),
        locator: Arc::new(IpApiLocator::new(config.geo_api_url.clone())),
        storage,
        retry: RetryPolicy::fixed(config.retry_attempts, config.retry_delay()),
        fallback_region: config.fallback_region.clone(),
    };

    let app = create_router(AppState::new(deps));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, model = %config.openai_model, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cache_writer.shutdown().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
