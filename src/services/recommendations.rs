use std::sync::Arc;
use std::time::Instant;

use crate::{
    error::{AppError, AppResult},
    models::{HistoryEntry, RecommendationRequest},
    services::{enrichment::Enricher, history::RecommendationStore, recommender::RecommendationGenerator},
};

/// Longest free-text prompt accepted
pub const MAX_PROMPT_CHARS: usize = 500;

/// Generates recommendations for a request
///
/// Pipeline:
/// 1. Ask the language model for raw recommendations (with retries)
/// 2. Enrich each one with catalog ids and posters, in parallel
/// 3. Record the result in the history store
pub struct RecommendationService {
    generator: RecommendationGenerator,
    enricher: Enricher,
    store: Arc<RecommendationStore>,
}

impl RecommendationService {
    pub fn new(
        generator: RecommendationGenerator,
        enricher: Enricher,
        store: Arc<RecommendationStore>,
    ) -> Self {
        Self {
            generator,
            enricher,
            store,
        }
    }

    pub fn generator(&self) -> &RecommendationGenerator {
        &self.generator
    }

    pub fn store(&self) -> &Arc<RecommendationStore> {
        &self.store
    }

    pub async fn recommend(&self, request: RecommendationRequest) -> AppResult<HistoryEntry> {
        let request = validate(request)?;
        self.run(request).await
    }

    /// Same pipeline for prompts assembled from chat selections, which have
    /// no free-text length limit
    pub async fn recommend_composed(&self, request: RecommendationRequest) -> AppResult<HistoryEntry> {
        let request = normalize(request)?;
        self.run(request).await
    }

    async fn run(&self, request: RecommendationRequest) -> AppResult<HistoryEntry> {
        let start = Instant::now();

        tracing::info!(
            media_type = %request.media_type,
            genres = request.genres.len(),
            "Starting recommendation generation"
        );

        let raw = self
            .generator
            .generate(&request.prompt, request.media_type, &request.genres)
            .await
            .map_err(|e| {
                tracing::warn!(kind = ?e.kind, error = %e.message, "Recommendation generation failed");
                AppError::Generation(e)
            })?;

        let enriched = self.enricher.enrich(raw, request.media_type).await;

        let entry = HistoryEntry::new(request.prompt, request.media_type, enriched);
        self.store.add(entry.clone()).await;

        tracing::info!(
            entry_id = %entry.id,
            results = entry.results.len(),
            processing_time_ms = start.elapsed().as_millis() as u64,
            "Recommendations ready"
        );

        Ok(entry)
    }
}

/// Normalizes a user request, rejecting oversized prompts
fn validate(request: RecommendationRequest) -> AppResult<RecommendationRequest> {
    let request = normalize(request)?;

    if request.prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(AppError::InvalidInput(format!(
            "Prompt cannot exceed {} characters",
            MAX_PROMPT_CHARS
        )));
    }

    Ok(request)
}

/// Trims the prompt and genres, rejecting blank prompts
fn normalize(request: RecommendationRequest) -> AppResult<RecommendationRequest> {
    let prompt = request.prompt.trim().to_string();

    if prompt.is_empty() {
        return Err(AppError::InvalidInput("Prompt cannot be empty".to_string()));
    }

    let mut genres: Vec<String> = Vec::with_capacity(request.genres.len());
    for genre in request.genres {
        let genre = genre.trim().to_string();
        if !genre.is_empty() && !genres.iter().any(|g| g.eq_ignore_ascii_case(&genre)) {
            genres.push(genre);
        }
    }

    Ok(RecommendationRequest {
        prompt,
        media_type: request.media_type,
        genres,
    })
}
