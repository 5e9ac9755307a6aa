/// TMDB movie and TV catalog
///
/// API Flow:
/// 1. Match: /search/{movie|tv} with the title (and year when known)
/// 2. Browse: /trending/{movie|tv}/week and /search/{movie|tv}
/// 3. Providers: /{movie|tv}/{id}/watch/providers, filtered to one region
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{
        CatalogMatch, CatalogTitle, MediaType, TmdbPage, TmdbProvider, TmdbResult,
        TmdbWatchProvidersResponse, WatchProvider, WatchProviders,
    },
    services::catalog::{image_url, MovieCatalog, PosterSize},
};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;

const TRENDING_CACHE_TTL: u64 = 600; // 10 minutes
const TRENDING_FALLBACK_TTL: u64 = 86400; // 1 day
const SEARCH_CACHE_TTL: u64 = 3600; // 1 hour
const PROVIDERS_CACHE_TTL: u64 = 21600; // 6 hours

#[derive(Clone)]
pub struct TmdbClient {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    image_base_url: String,
    cache: Cache,
}

impl TmdbClient {
    pub fn new(cache: Cache, api_key: String, api_url: String, image_base_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
            image_base_url,
            cache,
        }
    }

    fn path_segment(media_type: MediaType) -> AppResult<&'static str> {
        match media_type {
            MediaType::Movie => Ok("movie"),
            MediaType::Tv => Ok("tv"),
            MediaType::Book => Err(AppError::InvalidInput(
                "Books are not available in the movie catalog".to_string(),
            )),
        }
    }

    fn poster_url(&self, path: Option<&str>) -> Option<String> {
        path.filter(|p| !p.is_empty())
            .map(|p| image_url(&self.image_base_url, p, PosterSize::Large))
    }

    fn to_catalog_title(&self, result: TmdbResult, media_type: MediaType) -> CatalogTitle {
        CatalogTitle {
            id: result.id,
            title: result.display_title(),
            media_type,
            release_year: result.year(),
            rating: result.vote_average,
            poster_url: self.poster_url(result.poster_path.as_deref()),
            overview: result.overview,
        }
    }

    fn to_watch_provider(&self, provider: &TmdbProvider) -> WatchProvider {
        WatchProvider {
            id: provider.provider_id,
            name: provider.provider_name.clone(),
            logo_url: provider
                .logo_path
                .as_deref()
                .map(|p| image_url(&self.image_base_url, p, PosterSize::Small)),
        }
    }

    /// Picks the requested region out of the all-regions provider payload
    fn convert_providers(&self, response: TmdbWatchProvidersResponse, region: &str) -> WatchProviders {
        let region = region.to_uppercase();
        match response.results.get(&region) {
            Some(options) => WatchProviders {
                link: options.link.clone(),
                flatrate: options.flatrate.iter().map(|p| self.to_watch_provider(p)).collect(),
                rent: options.rent.iter().map(|p| self.to_watch_provider(p)).collect(),
                buy: options.buy.iter().map(|p| self.to_watch_provider(p)).collect(),
                region,
            },
            None => WatchProviders {
                region,
                ..Default::default()
            },
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> AppResult<T> {
        let url = format!("{}/{}", self.api_url.trim_end_matches('/'), path);

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(AppError::from_transport)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("TMDB resource {}", path)));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "TMDB API returned status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }

    async fn search_page(
        &self,
        query: &str,
        media_type: MediaType,
        year: Option<i32>,
    ) -> AppResult<Vec<TmdbResult>> {
        let segment = Self::path_segment(media_type)?;
        let mut params = vec![
            ("query", query.to_string()),
            ("include_adult", "false".to_string()),
        ];

        if let Some(year) = year {
            let year_param = match media_type {
                MediaType::Tv => "first_air_date_year",
                _ => "primary_release_year",
            };
            params.push((year_param, year.to_string()));
        }

        let page: TmdbPage = self.get_json(&format!("search/{}", segment), &params).await?;
        Ok(page.results)
    }

    async fn fetch_trending(&self, media_type: MediaType) -> AppResult<Vec<CatalogTitle>> {
        let segment = Self::path_segment(media_type)?;
        let page: TmdbPage = self
            .get_json(&format!("trending/{}/week", segment), &[])
            .await?;

        let titles: Vec<CatalogTitle> = page
            .results
            .into_iter()
            .map(|r| self.to_catalog_title(r, media_type))
            .collect();

        self.cache.set_in_background(
            &CacheKey::TrendingFallback(media_type),
            &titles,
            TRENDING_FALLBACK_TTL,
        );

        tracing::info!(
            media_type = %media_type,
            results = titles.len(),
            provider = "tmdb",
            "Trending fetched"
        );

        Ok(titles)
    }
}

#[async_trait::async_trait]
impl MovieCatalog for TmdbClient {
    async fn find_title(
        &self,
        title: &str,
        media_type: MediaType,
        year: Option<i32>,
    ) -> AppResult<Option<CatalogMatch>> {
        let mut results = self.search_page(title, media_type, year).await?;

        // Model-provided years are sometimes off by one; retry unconstrained
        if results.is_empty() && year.is_some() {
            results = self.search_page(title, media_type, None).await?;
        }

        let best = results.into_iter().next().map(|r| CatalogMatch {
            id: r.id,
            poster_url: self.poster_url(r.poster_path.as_deref()),
        });

        tracing::debug!(
            title = %title,
            media_type = %media_type,
            matched = best.is_some(),
            "Catalog lookup completed"
        );

        Ok(best)
    }

    async fn search_titles(&self, query: &str, media_type: MediaType) -> AppResult<Vec<CatalogTitle>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Search query cannot be empty".to_string(),
            ));
        }

        cached!(
            self.cache,
            CacheKey::TitleSearch(media_type, query.to_string()),
            SEARCH_CACHE_TTL,
            async move {
                let results = self.search_page(query.trim(), media_type, None).await?;
                let titles: Vec<CatalogTitle> = results
                    .into_iter()
                    .map(|r| self.to_catalog_title(r, media_type))
                    .collect();

                tracing::info!(
                    query = %query,
                    results = titles.len(),
                    provider = "tmdb",
                    "Title search completed"
                );

                Ok::<_, AppError>(titles)
            }
        )
    }

    async fn trending(&self, media_type: MediaType) -> AppResult<Vec<CatalogTitle>> {
        Self::path_segment(media_type)?;

        let fresh: AppResult<Vec<CatalogTitle>> = cached!(
            self.cache,
            CacheKey::Trending(media_type),
            TRENDING_CACHE_TTL,
            self.fetch_trending(media_type)
        );

        match fresh {
            Err(e) if e.is_offline() => {
                let key = CacheKey::TrendingFallback(media_type);
                match self.cache.get_from_cache::<Vec<CatalogTitle>>(&key).await {
                    Ok(Some(stale)) => {
                        tracing::warn!(
                            media_type = %media_type,
                            "Catalog unreachable, serving last known trending list"
                        );
                        Ok(stale)
                    }
                    _ => Err(e),
                }
            }
            other => other,
        }
    }

    async fn watch_providers(
        &self,
        id: u64,
        media_type: MediaType,
        region: &str,
    ) -> AppResult<WatchProviders> {
        let segment = Self::path_segment(media_type)?;

        cached!(
            self.cache,
            CacheKey::WatchProviders(media_type, id, region.to_string()),
            PROVIDERS_CACHE_TTL,
            async move {
                let response: TmdbWatchProvidersResponse = self
                    .get_json(&format!("{}/{}/watch/providers", segment, id), &[])
                    .await?;
                Ok::<_, AppError>(self.convert_providers(response, region))
            }
        )
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}
