/// Third-party catalog abstraction
///
/// Catalogs are used only to attach ids and artwork to recommendations and
/// to power browsing. Movie/TV data comes from a [`MovieCatalog`]; book data
/// from a [`BookCatalog`].
use crate::{
    error::AppResult,
    models::{BookImageLinks, BookVolume, CatalogMatch, CatalogTitle, MediaType, WatchProviders},
};

pub mod google_books;
pub mod tmdb;

pub use google_books::GoogleBooksClient;
pub use tmdb::TmdbClient;

/// Poster widths served by the image CDN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosterSize {
    Small,
    Medium,
    Large,
    Original,
}

impl PosterSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            PosterSize::Small => "w185",
            PosterSize::Medium => "w342",
            PosterSize::Large => "w500",
            PosterSize::Original => "original",
        }
    }
}

/// Builds a CDN URL for an image path such as `/abc.jpg`
pub fn image_url(base: &str, path: &str, size: PosterSize) -> String {
    format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        size.as_str(),
        path.trim_start_matches('/')
    )
}

/// Trait for movie and TV catalogs
#[async_trait::async_trait]
pub trait MovieCatalog: Send + Sync {
    /// Best match for a title, optionally narrowed by release year
    ///
    /// `Ok(None)` is a miss, not an error.
    async fn find_title(
        &self,
        title: &str,
        media_type: MediaType,
        year: Option<i32>,
    ) -> AppResult<Option<CatalogMatch>>;

    /// Titles matching a free-text query, for browsing
    async fn search_titles(&self, query: &str, media_type: MediaType) -> AppResult<Vec<CatalogTitle>>;

    /// Currently trending titles, most popular first
    async fn trending(&self, media_type: MediaType) -> AppResult<Vec<CatalogTitle>>;

    /// Streaming, rental and purchase options for a title in a region
    async fn watch_providers(
        &self,
        id: u64,
        media_type: MediaType,
        region: &str,
    ) -> AppResult<WatchProviders>;

    /// Catalog name for logging
    fn name(&self) -> &'static str;
}

/// Trait for book catalogs
#[async_trait::async_trait]
pub trait BookCatalog: Send + Sync {
    async fn search_by_isbn(&self, isbn: &str) -> AppResult<Option<BookVolume>>;

    async fn search_by_title_author(
        &self,
        title: &str,
        author: Option<&str>,
    ) -> AppResult<Option<BookVolume>>;

    fn name(&self) -> &'static str;
}

/// Strips hyphens and whitespace from an ISBN, `None` when nothing is left
pub fn normalize_isbn(isbn: &str) -> Option<String> {
    let normalized: String = isbn
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect();

    if normalized.is_empty() {
        None
    } else {
        Some(normalized.to_uppercase())
    }
}

/// Lowercase, ASCII-alphanumeric words joined by single hyphens
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Picks the larger thumbnail variant, forcing HTTPS
pub fn best_thumbnail(links: &BookImageLinks) -> Option<String> {
    links
        .thumbnail
        .as_deref()
        .or(links.small_thumbnail.as_deref())
        .filter(|url| !url.is_empty())
        .map(|url| match url.strip_prefix("http://") {
            Some(rest) => format!("https://{}", rest),
            None => url.to_string(),
        })
}
