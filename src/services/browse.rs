use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{CatalogTitle, MediaType, WatchProviders},
    services::{catalog::MovieCatalog, history::SearchHistory},
};

/// Longest browse query accepted
pub const MAX_QUERY_CHARS: usize = 200;

/// Trending lists, title search and watch-provider lookups for movies and TV
///
/// Every successful search term is recorded in [`SearchHistory`].
pub struct BrowseService {
    catalog: Arc<dyn MovieCatalog>,
    history: Arc<SearchHistory>,
}

impl BrowseService {
    pub fn new(catalog: Arc<dyn MovieCatalog>, history: Arc<SearchHistory>) -> Self {
        Self { catalog, history }
    }

    pub fn history(&self) -> &Arc<SearchHistory> {
        &self.history
    }

    pub async fn trending(&self, media_type: MediaType) -> AppResult<Vec<CatalogTitle>> {
        require_screen(media_type)?;
        self.catalog.trending(media_type).await
    }

    pub async fn search(&self, query: &str, media_type: MediaType) -> AppResult<Vec<CatalogTitle>> {
        require_screen(media_type)?;

        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput("Search query cannot be empty".to_string()));
        }
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(AppError::InvalidInput(format!(
                "Search query cannot exceed {} characters",
                MAX_QUERY_CHARS
            )));
        }

        let titles = self.catalog.search_titles(query, media_type).await?;
        self.history.record(query).await;

        tracing::debug!(
            query = %query,
            results = titles.len(),
            catalog = self.catalog.name(),
            "Browse search completed"
        );

        Ok(titles)
    }

    pub async fn watch_providers(
        &self,
        id: u64,
        media_type: MediaType,
        region: &str,
    ) -> AppResult<WatchProviders> {
        require_screen(media_type)?;

        let region = region.trim();
        if region.len() != 2 || !region.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(AppError::InvalidInput(format!("Invalid region code: {}", region)));
        }

        self.catalog
            .watch_providers(id, media_type, &region.to_uppercase())
            .await
    }
}

fn require_screen(media_type: MediaType) -> AppResult<()> {
    if media_type.is_screen() {
        Ok(())
    } else {
        Err(AppError::InvalidInput(
            "Browsing is available for movies and TV shows".to_string(),
        ))
    }
}
