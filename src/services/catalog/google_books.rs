/// Google Books catalog
///
/// Lookups use `/volumes?q=isbn:{isbn}` or `/volumes?q=intitle:{title} inauthor:{author}`
/// and keep only the first volume. Multi-word values are quoted.
use crate::{
    error::{AppError, AppResult},
    models::{BookVolume, BooksVolumesResponse},
    services::catalog::{normalize_isbn, BookCatalog},
};
use reqwest::Client as HttpClient;

#[derive(Clone)]
pub struct GoogleBooksClient {
    http_client: HttpClient,
    api_key: Option<String>,
    api_url: String,
}

impl GoogleBooksClient {
    pub fn new(api_key: Option<String>, api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url,
        }
    }

    fn title_author_query(title: &str, author: Option<&str>) -> String {
        let mut query = field_term("intitle", title);
        if let Some(author) = author.map(str::trim).filter(|a| !a.is_empty()) {
            query.push(' ');
            query.push_str(&field_term("inauthor", author));
        }
        query
    }

    fn volumes_request(&self, query: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/volumes", self.api_url.trim_end_matches('/'));

        let request = self
            .http_client
            .get(&url)
            .query(&[("q", query), ("maxResults", "1"), ("printType", "books")]);

        match &self.api_key {
            Some(key) => request.query(&[("key", key.as_str())]),
            None => request,
        }
    }

    async fn first_volume(&self, query: &str) -> AppResult<Option<BookVolume>> {
        let request = self.volumes_request(query);

        let response = request.send().await.map_err(AppError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Google Books API returned status {}: {}",
                status, body
            )));
        }

        let volumes: BooksVolumesResponse = response.json().await?;

        tracing::debug!(
            query = %query,
            total_items = volumes.total_items,
            provider = "google_books",
            "Book lookup completed"
        );

        Ok(volumes.items.into_iter().next())
    }
}

/// `field:value`, quoting values that contain whitespace
fn field_term(field: &str, value: &str) -> String {
    let value = value.trim().replace('"', "");
    if value.contains(char::is_whitespace) {
        format!("{}:\"{}\"", field, value)
    } else {
        format!("{}:{}", field, value)
    }
}

#[async_trait::async_trait]
impl BookCatalog for GoogleBooksClient {
    async fn search_by_isbn(&self, isbn: &str) -> AppResult<Option<BookVolume>> {
        match normalize_isbn(isbn) {
            Some(isbn) => self.first_volume(&format!("isbn:{}", isbn)).await,
            None => Ok(None),
        }
    }

    async fn search_by_title_author(
        &self,
        title: &str,
        author: Option<&str>,
    ) -> AppResult<Option<BookVolume>> {
        if title.trim().is_empty() {
            return Ok(None);
        }
        self.first_volume(&Self::title_author_query(title, author))
            .await
    }

    fn name(&self) -> &'static str {
        "google_books"
    }
}
