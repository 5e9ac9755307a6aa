/// Language-model recommendation generation
///
/// Builds the curator prompts, calls the [`ChatClient`] under a
/// [`RetryPolicy`], and validates the JSON shape before anything downstream
/// trusts it. Nothing here is cached; callers own memoization.
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::GenerationError,
    models::{MediaType, RawRecommendation, Theme},
    services::{
        llm::{ChatClient, ChatMessage, ChatRequest},
        retry::RetryPolicy,
    },
};

/// Upper bound on recommendations kept from a single response
pub const MAX_RECOMMENDATIONS: usize = 4;
/// Upper bound on theme suggestions kept from a single response
pub const MAX_THEMES: usize = 4;

const PERSONA: &str = "You are a cultural curator with deep knowledge of film, television and \
literature from around the world. You recommend titles that genuinely fit the mood and intent \
of a request, mixing well-known picks with lesser-known gems, and you only recommend titles \
that really exist.";

const SCREEN_FORMAT: &str = r#"{"recommendations": [{"title": "Title", "year": 2010, "rating": 8.1, "description": "One or two sentence synopsis", "reason": "Why it fits the request"}]}"#;

const BOOK_FORMAT: &str = r#"{"recommendations": [{"title": "Title", "author": "Author Name", "isbn": "9780000000000", "year": 2015, "description": "One or two sentence synopsis", "reason": "Why it fits the request"}]}"#;

const THEME_FORMAT: &str = r#"{"themes": [{"name": "Short theme name", "description": "One sentence description", "keywords": ["keyword", "keyword"]}]}"#;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecommendationEnvelope<T> {
    recommendations: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScreenRecommendation {
    title: String,
    description: String,
    reason: String,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    rating: Option<f32>,
}

impl From<ScreenRecommendation> for RawRecommendation {
    fn from(item: ScreenRecommendation) -> Self {
        RawRecommendation {
            title: item.title,
            description: item.description,
            reason: item.reason,
            year: item.year,
            rating: item.rating,
            author: None,
            isbn: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BookRecommendation {
    title: String,
    description: String,
    reason: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    isbn: Option<String>,
    #[serde(default)]
    year: Option<i32>,
}

impl From<BookRecommendation> for RawRecommendation {
    fn from(item: BookRecommendation) -> Self {
        RawRecommendation {
            title: item.title,
            description: item.description,
            reason: item.reason,
            year: item.year,
            rating: None,
            author: item.author,
            isbn: item.isbn.filter(|isbn| !isbn.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ThemeEnvelope {
    themes: Vec<Theme>,
}

/// Builds the system instruction for a media type
pub fn system_prompt(media_type: MediaType) -> String {
    let format = match media_type {
        MediaType::Book => BOOK_FORMAT,
        MediaType::Movie | MediaType::Tv => SCREEN_FORMAT,
    };

    format!(
        "{persona}\n\nYou recommend {plural}. Respond only with a JSON object in exactly this \
         format, with no other keys:\n{format}\nReturn exactly {count} recommendations.",
        persona = PERSONA,
        plural = media_type.plural(),
        format = format,
        count = MAX_RECOMMENDATIONS,
    )
}

/// Builds the user message from the free-text request and optional genres
pub fn user_prompt(prompt: &str, media_type: MediaType, genres: &[String]) -> String {
    let mut message = format!(
        "Recommend {} {} for this request: \"{}\".",
        MAX_RECOMMENDATIONS,
        media_type.plural(),
        prompt.trim()
    );

    if !genres.is_empty() {
        message.push_str(&format!(" Focus on these genres: {}.", genres.join(", ")));
    }

    message
}

fn theme_system_prompt(media_type: MediaType) -> String {
    format!(
        "{persona}\n\nSuggest {count} distinct themes a reader or viewer might want to explore \
         in {plural}. Respond only with a JSON object in exactly this format, with no other \
         keys:\n{format}",
        persona = PERSONA,
        count = MAX_THEMES,
        plural = media_type.plural(),
        format = THEME_FORMAT,
    )
}

fn theme_user_prompt(media_type: MediaType, genres: &[String]) -> String {
    if genres.is_empty() {
        format!("Suggest {} themes for {}.", MAX_THEMES, media_type.plural())
    } else {
        format!(
            "Suggest {} themes for {} in these genres: {}.",
            MAX_THEMES,
            media_type.plural(),
            genres.join(", ")
        )
    }
}

fn parse_envelope<T>(content: &str) -> Result<Vec<T>, GenerationError>
where
    T: for<'de> Deserialize<'de> + Into<RawRecommendation>,
{
    serde_json::from_str::<RecommendationEnvelope<T>>(content)
        .map(|envelope| envelope.recommendations)
        .map_err(|e| GenerationError::invalid_response(format!("Malformed recommendations: {}", e)))
}

/// Validates a completion and converts it into raw recommendations
///
/// Rejects unknown, missing or mistyped fields. Keeps at most
/// [`MAX_RECOMMENDATIONS`] entries; an empty list is rejected.
pub fn parse_recommendations(
    content: &str,
    media_type: MediaType,
) -> Result<Vec<RawRecommendation>, GenerationError> {
    let recommendations: Vec<RawRecommendation> = match media_type {
        MediaType::Book => parse_envelope::<BookRecommendation>(content)?
            .into_iter()
            .map(RawRecommendation::from)
            .collect(),
        MediaType::Movie | MediaType::Tv => parse_envelope::<ScreenRecommendation>(content)?
            .into_iter()
            .map(RawRecommendation::from)
            .collect(),
    };

    if recommendations.is_empty() {
        return Err(GenerationError::invalid_response(
            "Response contained no recommendations",
        ));
    }

    if let Some(blank) = recommendations.iter().position(|r| r.title.trim().is_empty()) {
        return Err(GenerationError::invalid_response(format!(
            "Recommendation {} has an empty title",
            blank
        )));
    }

    Ok(recommendations
        .into_iter()
        .take(MAX_RECOMMENDATIONS)
        .collect())
}

/// Validates a theme completion, keeping at most [`MAX_THEMES`]
pub fn parse_themes(content: &str) -> Result<Vec<Theme>, GenerationError> {
    let envelope: ThemeEnvelope = serde_json::from_str(content)
        .map_err(|e| GenerationError::invalid_response(format!("Malformed themes: {}", e)))?;

    let themes: Vec<Theme> = envelope
        .themes
        .into_iter()
        .filter(|theme| !theme.name.trim().is_empty())
        .take(MAX_THEMES)
        .collect();

    if themes.is_empty() {
        return Err(GenerationError::invalid_response("Response contained no themes"));
    }

    Ok(themes)
}

/// Generates recommendations and theme suggestions through a chat model
#[derive(Clone)]
pub struct RecommendationGenerator {
    client: Arc<dyn ChatClient>,
    retry: RetryPolicy,
}

impl RecommendationGenerator {
    pub fn new(client: Arc<dyn ChatClient>, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Requests recommendations, retrying on any failure
    ///
    /// A structurally valid response ends the loop immediately. When every
    /// attempt fails the last attempt's error is returned and no partial
    /// result is kept.
    pub async fn generate(
        &self,
        prompt: &str,
        media_type: MediaType,
        genres: &[String],
    ) -> Result<Vec<RawRecommendation>, GenerationError> {
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(system_prompt(media_type)),
                ChatMessage::user(user_prompt(prompt, media_type, genres)),
            ],
            json_response: true,
            temperature: Some(0.8),
        };

        let recommendations = self
            .retry
            .run(|attempt| {
                let request = request.clone();
                async move {
                    tracing::debug!(attempt = attempt, media_type = %media_type, "Requesting recommendations");
                    let content = self
                        .client
                        .complete(request)
                        .await
                        .map_err(|e| GenerationError::new(e.kind(), e.to_string()))?;
                    parse_recommendations(&content, media_type)
                }
            })
            .await?;

        tracing::info!(
            media_type = %media_type,
            count = recommendations.len(),
            provider = self.client.name(),
            "Recommendations generated"
        );

        Ok(recommendations)
    }

    /// Requests theme suggestions conditioned on the selected genres
    pub async fn generate_themes(
        &self,
        media_type: MediaType,
        genres: &[String],
    ) -> Result<Vec<Theme>, GenerationError> {
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(theme_system_prompt(media_type)),
                ChatMessage::user(theme_user_prompt(media_type, genres)),
            ],
            json_response: true,
            temperature: Some(0.9),
        };

        self.retry
            .run(|_| {
                let request = request.clone();
                async move {
                    let content = self
                        .client
                        .complete(request)
                        .await
                        .map_err(|e| GenerationError::new(e.kind(), e.to_string()))?;
                    parse_themes(&content)
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::services::llm::{LlmError, MockChatClient};
    use std::time::Duration;

    const FOUR_MOVIES: &str = r#"{"recommendations": [
        {"title": "Knives Out", "year": 2019, "rating": 7.9, "description": "A detective investigates", "reason": "Cozy whodunit"},
        {"title": "Paddington 2", "year": 2017, "rating": 7.8, "description": "A bear in London", "reason": "Warm"},
        {"title": "Amélie", "year": 2001, "rating": 8.3, "description": "A shy waitress", "reason": "Whimsical"},
        {"title": "The Grand Budapest Hotel", "year": 2014, "rating": 8, "description": "A concierge", "reason": "Charming"}
    ]}"#;

    fn generator(client: MockChatClient, attempts: u32) -> RecommendationGenerator {
        RecommendationGenerator::new(Arc::new(client), RetryPolicy::fixed(attempts, Duration::ZERO))
    }

    #[test]
    fn test_system_prompt_varies_by_media_type() {
        let book = system_prompt(MediaType::Book);
        assert!(book.contains("cultural curator"));
        assert!(book.contains("\"isbn\""));
        assert!(book.contains("\"author\""));

        let movie = system_prompt(MediaType::Movie);
        assert!(movie.contains("\"rating\""));
        assert!(!movie.contains("\"isbn\""));
    }

    #[test]
    fn test_user_prompt_includes_genres_when_present() {
        let prompt = user_prompt("rainy day", MediaType::Tv, &["Drama".to_string(), "Mystery".to_string()]);
        assert!(prompt.contains("\"rainy day\""));
        assert!(prompt.contains("TV shows"));
        assert!(prompt.contains("Drama, Mystery"));

        let prompt = user_prompt("rainy day", MediaType::Tv, &[]);
        assert!(!prompt.contains("genres"));
    }

    #[test]
    fn test_parse_recommendations_accepts_valid_movies() {
        let parsed = parse_recommendations(FOUR_MOVIES, MediaType::Movie).unwrap();
        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed[0].title, "Knives Out");
        assert_eq!(parsed[0].year, Some(2019));
        assert_eq!(parsed[3].rating, Some(8.0));
        assert_eq!(parsed[0].isbn, None);
    }

    #[test]
    fn test_parse_recommendations_truncates_to_four() {
        let items: Vec<String> = (0..6)
            .map(|i| format!(r#"{{"title": "T{}", "description": "d", "reason": "r"}}"#, i))
            .collect();
        let content = format!(r#"{{"recommendations": [{}]}}"#, items.join(","));

        let parsed = parse_recommendations(&content, MediaType::Tv).unwrap();
        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed[3].title, "T3");
    }

    #[test]
    fn test_parse_recommendations_rejects_missing_array() {
        let err = parse_recommendations(r#"{"items": []}"#, MediaType::Movie).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidResponse);

        let err = parse_recommendations(r#"{"recommendations": "none"}"#, MediaType::Movie).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidResponse);

        let err = parse_recommendations("not json at all", MediaType::Movie).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidResponse);
    }

    #[test]
    fn test_parse_recommendations_rejects_empty_list() {
        let err = parse_recommendations(r#"{"recommendations": []}"#, MediaType::Book).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidResponse);
    }

    #[test]
    fn test_parse_recommendations_rejects_unknown_and_mistyped_fields() {
        let extra = r#"{"recommendations": [{"title": "A", "description": "d", "reason": "r", "isbn": "123"}]}"#;
        assert!(parse_recommendations(extra, MediaType::Movie).is_err());

        let mistyped = r#"{"recommendations": [{"title": "A", "description": "d", "reason": "r", "year": "2001"}]}"#;
        assert!(parse_recommendations(mistyped, MediaType::Movie).is_err());

        let missing = r#"{"recommendations": [{"title": "A", "description": "d"}]}"#;
        assert!(parse_recommendations(missing, MediaType::Movie).is_err());
    }

    #[test]
    fn test_parse_recommendations_books_keep_author_and_isbn() {
        let content = r#"{"recommendations": [
            {"title": "The Cat Who Could Read Backwards", "author": "Lilian Jackson Braun", "isbn": "978-0-515-09017-1", "description": "d", "reason": "r"},
            {"title": "No ISBN", "author": "Someone", "isbn": "", "description": "d", "reason": "r"}
        ]}"#;

        let parsed = parse_recommendations(content, MediaType::Book).unwrap();
        assert_eq!(parsed[0].author.as_deref(), Some("Lilian Jackson Braun"));
        assert_eq!(parsed[0].isbn.as_deref(), Some("978-0-515-09017-1"));
        assert_eq!(parsed[1].isbn, None);
    }

    #[test]
    fn test_parse_themes() {
        let content = r#"{"themes": [
            {"name": "Found Family", "description": "Strangers become kin", "keywords": ["belonging"]},
            {"name": "Redemption", "description": "Second chances", "keywords": []}
        ]}"#;

        let themes = parse_themes(content).unwrap();
        assert_eq!(themes.len(), 2);
        assert_eq!(themes[0].name, "Found Family");

        assert!(parse_themes(r#"{"themes": []}"#).is_err());
        assert!(parse_themes(r#"{"themes": [{"name": "X", "description": "d"}]}"#).is_err());
    }

    #[tokio::test]
    async fn test_generate_success_on_first_attempt() {
        let mut client = MockChatClient::new();
        client
            .expect_complete()
            .withf(|request| {
                request.json_response
                    && request.system_prompt().is_some_and(|p| p.contains("cultural curator"))
            })
            .times(1)
            .returning(|_| Ok(FOUR_MOVIES.to_string()));
        client.expect_name().return_const("mock");

        let result = generator(client, 3)
            .generate("cozy mystery", MediaType::Movie, &[])
            .await
            .unwrap();

        assert_eq!(result.len(), 4);
    }

    #[tokio::test]
    async fn test_generate_rate_limited_on_every_attempt() {
        let mut client = MockChatClient::new();
        client.expect_complete().times(3).returning(|_| {
            Err(LlmError::Status {
                status: 429,
                body: "slow down".to_string(),
            })
        });
        client.expect_name().return_const("mock");

        let err = generator(client, 3)
            .generate("anything", MediaType::Movie, &[])
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn test_generate_retries_after_invalid_response() {
        let mut client = MockChatClient::new();
        let mut seq = mockall::Sequence::new();
        client
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(r#"{"recommendations": "oops"}"#.to_string()));
        client
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(FOUR_MOVIES.to_string()));
        client.expect_name().return_const("mock");

        let result = generator(client, 3)
            .generate("heist", MediaType::Movie, &[])
            .await
            .unwrap();

        assert_eq!(result[1].title, "Paddington 2");
    }

    #[tokio::test]
    async fn test_generate_surfaces_last_error_kind() {
        let mut client = MockChatClient::new();
        let mut seq = mockall::Sequence::new();
        client
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(LlmError::Status {
                    status: 429,
                    body: String::new(),
                })
            });
        client
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("garbage".to_string()));

        let err = generator(client, 2)
            .generate("heist", MediaType::Tv, &[])
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn test_generate_themes() {
        let mut client = MockChatClient::new();
        client
            .expect_complete()
            .withf(|request| request.user_prompt().is_some_and(|p| p.contains("Horror")))
            .times(1)
            .returning(|_| {
                Ok(r#"{"themes": [{"name": "Isolation", "description": "Alone", "keywords": ["cabin"]}]}"#
                    .to_string())
            });

        let themes = generator(client, 3)
            .generate_themes(MediaType::Movie, &["Horror".to_string()])
            .await
            .unwrap();

        assert_eq!(themes[0].name, "Isolation");
    }
}
