/// Catalog enrichment fan-out
///
/// Every recommendation is looked up in its own task. Results are collected
/// positionally, so output order always mirrors input order. A failed lookup
/// degrades its own card to "no poster" and never fails the batch.
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{CatalogId, EnrichedRecommendation, MediaType, RawRecommendation},
    services::catalog::{best_thumbnail, normalize_isbn, slugify, BookCatalog, MovieCatalog},
};

#[derive(Clone)]
pub struct Enricher {
    movies: Arc<dyn MovieCatalog>,
    books: Arc<dyn BookCatalog>,
}

impl Enricher {
    pub fn new(movies: Arc<dyn MovieCatalog>, books: Arc<dyn BookCatalog>) -> Self {
        Self { movies, books }
    }

    /// Attaches catalog ids and poster URLs to each recommendation
    pub async fn enrich(
        &self,
        recommendations: Vec<RawRecommendation>,
        media_type: MediaType,
    ) -> Vec<EnrichedRecommendation> {
        let mut tasks = Vec::with_capacity(recommendations.len());

        for recommendation in &recommendations {
            let enricher = self.clone();
            let recommendation = recommendation.clone();
            let task = tokio::spawn(async move {
                enricher.enrich_one(recommendation, media_type).await
            });
            tasks.push(task);
        }

        let mut enriched = Vec::with_capacity(tasks.len());
        let mut misses = 0usize;

        for (task, original) in tasks.into_iter().zip(recommendations) {
            let item = match task.await {
                Ok(item) => item,
                Err(e) => {
                    tracing::error!(error = %e, title = %original.title, "Enrichment task failed");
                    fallback(original, media_type)
                }
            };

            if item.poster_url.is_none() {
                misses += 1;
            }
            enriched.push(item);
        }

        tracing::info!(
            media_type = %media_type,
            total = enriched.len(),
            without_poster = misses,
            "Enrichment completed"
        );

        enriched
    }

    async fn enrich_one(
        &self,
        recommendation: RawRecommendation,
        media_type: MediaType,
    ) -> EnrichedRecommendation {
        match media_type {
            MediaType::Movie | MediaType::Tv => self.enrich_screen(recommendation, media_type).await,
            MediaType::Book => self.enrich_book(recommendation).await,
        }
    }

    async fn enrich_screen(
        &self,
        recommendation: RawRecommendation,
        media_type: MediaType,
    ) -> EnrichedRecommendation {
        let lookup = self
            .movies
            .find_title(&recommendation.title, media_type, recommendation.year)
            .await;

        match lookup {
            Ok(Some(found)) => EnrichedRecommendation {
                recommendation,
                catalog_id: Some(CatalogId::Tmdb(found.id)),
                poster_url: found.poster_url,
            },
            Ok(None) => {
                tracing::debug!(title = %recommendation.title, "No catalog match");
                EnrichedRecommendation::unmatched(recommendation)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    title = %recommendation.title,
                    catalog = self.movies.name(),
                    "Catalog lookup failed"
                );
                EnrichedRecommendation::unmatched(recommendation)
            }
        }
    }

    async fn enrich_book(&self, recommendation: RawRecommendation) -> EnrichedRecommendation {
        let poster_url = match self.find_book_cover(&recommendation).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    title = %recommendation.title,
                    catalog = self.books.name(),
                    "Book lookup failed"
                );
                None
            }
        };

        EnrichedRecommendation {
            catalog_id: Some(book_id(&recommendation)),
            poster_url,
            recommendation,
        }
    }

    /// ISBN lookup first, then title and author
    async fn find_book_cover(&self, recommendation: &RawRecommendation) -> AppResult<Option<String>> {
        let mut volume = None;

        if let Some(isbn) = recommendation.isbn.as_deref().and_then(normalize_isbn) {
            volume = self.books.search_by_isbn(&isbn).await?;
        }

        if volume.is_none() {
            volume = self
                .books
                .search_by_title_author(&recommendation.title, recommendation.author.as_deref())
                .await?;
        }

        Ok(volume
            .and_then(|v| v.volume_info.image_links)
            .and_then(|links| best_thumbnail(&links)))
    }
}

/// Book ids come from the ISBN, or the title slug when there is none
pub fn book_id(recommendation: &RawRecommendation) -> CatalogId {
    let id = recommendation
        .isbn
        .as_deref()
        .and_then(normalize_isbn)
        .unwrap_or_else(|| slugify(&recommendation.title));
    CatalogId::Book(id)
}

fn fallback(recommendation: RawRecommendation, media_type: MediaType) -> EnrichedRecommendation {
    match media_type {
        MediaType::Book => EnrichedRecommendation {
            catalog_id: Some(book_id(&recommendation)),
            poster_url: None,
            recommendation,
        },
        _ => EnrichedRecommendation::unmatched(recommendation),
    }
}
