use std::sync::Arc;

use crate::{
    db::LocalStorage,
    services::{
        catalog::{BookCatalog, MovieCatalog},
        BingoService, BrowseService, ChatClient, ChatService, Enricher, RecommendationGenerator,
        RecommendationService, RecommendationStore, RegionLocator, RegionService, RetryPolicy,
        SearchHistory,
    },
};

/// Upstream clients and storage the application is assembled from
pub struct Dependencies {
    pub chat_client: Arc<dyn ChatClient>,
    pub movies: Arc<dyn MovieCatalog>,
    pub books: Arc<dyn BookCatalog>,
    pub locator: Arc<dyn RegionLocator>,
    pub storage: LocalStorage,
    pub retry: RetryPolicy,
    pub fallback_region: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub recommendations: Arc<RecommendationService>,
    pub chat: Arc<ChatService>,
    pub browse: Arc<BrowseService>,
    pub region: Arc<RegionService>,
    pub bingo: Arc<BingoService>,
}

impl AppState {
    pub fn new(deps: Dependencies) -> Self {
        let generator = RecommendationGenerator::new(deps.chat_client, deps.retry);
        let enricher = Enricher::new(deps.movies.clone(), deps.books);
        let store = Arc::new(RecommendationStore::load(deps.storage.clone()));
        let recommendations = Arc::new(RecommendationService::new(generator, enricher, store));

        let history = Arc::new(SearchHistory::load(deps.storage.clone()));

        Self {
            chat: Arc::new(ChatService::load(deps.storage.clone(), recommendations.clone())),
            browse: Arc::new(BrowseService::new(deps.movies, history)),
            region: Arc::new(RegionService::new(deps.locator, deps.fallback_region)),
            bingo: Arc::new(BingoService::load(deps.storage)),
            recommendations,
        }
    }
}
