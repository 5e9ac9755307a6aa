use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use reelmind_api::{
    api::{create_router, AppState, Dependencies},
    db::LocalStorage,
    error::{AppError, AppResult},
    models::{BookVolume, CatalogMatch, CatalogTitle, MediaType, WatchProviders},
    services::{
        catalog::{BookCatalog, MovieCatalog},
        llm::{ChatClient, ChatRequest, LlmError},
        RegionLocator, RetryPolicy,
    },
};

const FOUR_MOVIES: &str = r#"{"recommendations": [
    {"title": "Lagaan", "description": "Villagers take on the Raj at cricket.", "reason": "Underdog story", "year": 2001, "rating": 8.1},
    {"title": "Swades", "description": "A NASA engineer returns home.", "reason": "Quiet and warm", "year": 2004},
    {"title": "Taare Zameen Par", "description": "A teacher sees a struggling boy.", "reason": "Gentle drama"},
    {"title": "3 Idiots", "description": "Engineering students question the system.", "reason": "Funny and sincere", "year": 2009}
]}"#;

const THEMES: &str = r#"{"themes": [
    {"name": "Homecoming", "description": "Returning to where you began", "keywords": ["roots"]},
    {"name": "Underdogs", "description": "Long odds, big hearts", "keywords": ["sport", "grit"]}
]}"#;

/// Answers theme requests with [`THEMES`] and everything else with [`FOUR_MOVIES`]
struct ScriptedChat {
    rate_limited: bool,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl ChatClient for ScriptedChat {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.rate_limited {
            return Err(LlmError::Status {
                status: 429,
                body: "slow down".to_string(),
            });
        }

        let is_theme_request = request
            .user_prompt()
            .map(|prompt| prompt.starts_with("Suggest"))
            .unwrap_or(false);

        Ok(if is_theme_request { THEMES } else { FOUR_MOVIES }.to_string())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

struct FakeMovies;

#[async_trait::async_trait]
impl MovieCatalog for FakeMovies {
    async fn find_title(
        &self,
        title: &str,
        _: MediaType,
        _: Option<i32>,
    ) -> AppResult<Option<CatalogMatch>> {
        if title == "Swades" {
            return Err(AppError::Offline("catalog unreachable".to_string()));
        }
        Ok(Some(CatalogMatch {
            id: title.len() as u64,
            poster_url: Some(format!("https://image.example/w500/{}.jpg", title.len())),
        }))
    }

    async fn search_titles(&self, query: &str, media_type: MediaType) -> AppResult<Vec<CatalogTitle>> {
        Ok(vec![CatalogTitle {
            id: 438631,
            title: query.to_string(),
            media_type,
            overview: None,
            release_year: Some(2021),
            rating: Some(7.8),
            poster_url: None,
        }])
    }

    async fn trending(&self, media_type: MediaType) -> AppResult<Vec<CatalogTitle>> {
        Ok((1..=3)
            .map(|id| CatalogTitle {
                id,
                title: format!("Trending {}", id),
                media_type,
                overview: None,
                release_year: None,
                rating: None,
                poster_url: None,
            })
            .collect())
    }

    async fn watch_providers(&self, _: u64, _: MediaType, region: &str) -> AppResult<WatchProviders> {
        Ok(WatchProviders {
            region: region.to_string(),
            ..Default::default()
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct NoBooks;

#[async_trait::async_trait]
impl BookCatalog for NoBooks {
    async fn search_by_isbn(&self, _: &str) -> AppResult<Option<BookVolume>> {
        Ok(None)
    }

    async fn search_by_title_author(&self, _: &str, _: Option<&str>) -> AppResult<Option<BookVolume>> {
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

struct FixedRegion;

#[async_trait::async_trait]
impl RegionLocator for FixedRegion {
    async fn lookup(&self) -> AppResult<String> {
        Ok("IN".to_string())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

struct TestApp {
    server: TestServer,
    chat: Arc<ScriptedChat>,
    _dir: tempfile::TempDir,
}

fn create_test_app(rate_limited: bool) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let chat = Arc::new(ScriptedChat {
        rate_limited,
        calls: AtomicUsize::new(0),
    });

    let state = AppState::new(Dependencies {
        chat_client: chat.clone(),
        movies: Arc::new(FakeMovies),
        books: Arc::new(NoBooks),
        locator: Arc::new(FixedRegion),
        storage: LocalStorage::open(dir.path()).unwrap(),
        retry: RetryPolicy::fixed(3, Duration::ZERO),
        fallback_region: "US".to_string(),
    });

    TestApp {
        server: TestServer::new(create_router(state)).unwrap(),
        chat,
        _dir: dir,
    }
}

fn create_test_server() -> TestServer {
    create_test_app(false).server
}

async fn act(server: &TestServer, id: &str, action: Value) -> Value {
    let response = server
        .post(&format!("/api/v1/chat/sessions/{}/actions", id))
        .json(&action)
        .await;
    response.assert_status_ok();
    response.json()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = create_test_server();

    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("trace-123"),
        )
        .await;
    assert_eq!(response.header("x-request-id"), "trace-123");

    let response = server.get("/health").await;
    assert!(!response.header("x-request-id").is_empty());
}

#[tokio::test]
async fn test_create_recommendation_enriches_and_stores() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({
            "prompt": "feel-good Bollywood about underdogs",
            "media_type": "movie"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let entry: Value = response.json();
    let results = entry["results"].as_array().unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(results[0]["title"], "Lagaan");
    assert_eq!(results[0]["catalog_id"], 6);
    assert_eq!(results[0]["poster_url"], "https://image.example/w500/6.jpg");
    // catalog failure for one item leaves the rest intact
    assert_eq!(results[1]["title"], "Swades");
    assert!(results[1]["catalog_id"].is_null());
    assert!(results[1]["poster_url"].is_null());

    let response = server.get("/api/v1/recommendations").await;
    response.assert_status_ok();
    let history: Vec<Value> = response.json();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["id"], entry["id"]);
}

#[tokio::test]
async fn test_blank_prompt_rejected() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({"prompt": "   ", "media_type": "tv"}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rate_limited_generation_fails_once_after_retries() {
    let app = create_test_app(true);

    let response = app
        .server
        .post("/api/v1/recommendations")
        .json(&json!({"prompt": "anything", "media_type": "movie"}))
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.json::<Value>()["kind"], "rate_limited");
    assert_eq!(app.chat.calls.load(Ordering::SeqCst), 3);

    let history: Vec<Value> = app.server.get("/api/v1/recommendations").await.json();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_delete_and_clear_recommendations() {
    let server = create_test_server();

    let first: Value = server
        .post("/api/v1/recommendations")
        .json(&json!({"prompt": "one", "media_type": "movie"}))
        .await
        .json();
    server
        .post("/api/v1/recommendations")
        .json(&json!({"prompt": "two", "media_type": "tv"}))
        .await
        .assert_status(StatusCode::CREATED);

    let id = first["id"].as_str().unwrap();
    server
        .delete(&format!("/api/v1/recommendations/{}", id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .delete(&format!("/api/v1/recommendations/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let history: Vec<Value> = server.get("/api/v1/recommendations").await.json();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["prompt"], "two");

    server
        .delete("/api/v1/recommendations")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let history: Vec<Value> = server.get("/api/v1/recommendations").await.json();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_guided_chat_movie_flow() {
    let server = create_test_server();

    let response = server.post("/api/v1/chat/sessions").await;
    response.assert_status(StatusCode::CREATED);
    let session: Value = response.json();
    let id = session["id"].as_str().unwrap().to_string();
    assert_eq!(session["step"], "initial");

    let session = act(&server, &id, json!({"type": "start"})).await;
    assert_eq!(session["step"], "media_type");

    act(&server, &id, json!({"type": "select_media_type", "value": "movie"})).await;
    act(&server, &id, json!({"type": "toggle_genre", "value": "Drama"})).await;

    let session = act(&server, &id, json!({"type": "confirm_genres"})).await;
    assert_eq!(session["step"], "theme_selection");
    assert_eq!(session["suggested_themes"].as_array().unwrap().len(), 2);

    act(&server, &id, json!({"type": "toggle_theme", "value": "Underdogs"})).await;
    let session = act(&server, &id, json!({"type": "confirm_themes"})).await;
    assert_eq!(session["step"], "industry_selection");

    let session = act(&server, &id, json!({"type": "select_industry", "value": "bollywood"})).await;
    assert_eq!(session["step"], "results");
    assert_eq!(session["results"].as_array().unwrap().len(), 4);
    assert!(session["error"].is_null());

    let fetched: Value = server
        .get(&format!("/api/v1/chat/sessions/{}", id))
        .await
        .json();
    assert_eq!(fetched["step"], "results");
}

#[tokio::test]
async fn test_guided_chat_failure_lands_on_results_with_error() {
    let app = create_test_app(true);
    let server = &app.server;

    let session: Value = server.post("/api/v1/chat/sessions").await.json();
    let id = session["id"].as_str().unwrap().to_string();

    act(server, &id, json!({"type": "start"})).await;
    act(server, &id, json!({"type": "select_media_type", "value": "book"})).await;

    // theme generation fails too, so the fixed themes are offered
    let session = act(server, &id, json!({"type": "confirm_genres"})).await;
    assert_eq!(session["suggested_themes"].as_array().unwrap().len(), 4);

    let session = act(server, &id, json!({"type": "confirm_themes"})).await;
    assert_eq!(session["step"], "results");
    assert_eq!(session["industry"], "both");
    assert!(session["results"].as_array().unwrap().is_empty());
    assert!(session["error"].as_str().unwrap().contains("Too many requests"));
}

#[tokio::test]
async fn test_chat_reset_and_invalid_actions() {
    let server = create_test_server();

    let session: Value = server.post("/api/v1/chat/sessions").await.json();
    let id = session["id"].as_str().unwrap().to_string();

    server
        .post(&format!("/api/v1/chat/sessions/{}/actions", id))
        .json(&json!({"type": "confirm_themes"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    act(&server, &id, json!({"type": "start"})).await;
    act(&server, &id, json!({"type": "select_media_type", "value": "tv"})).await;

    let response = server
        .post(&format!("/api/v1/chat/sessions/{}/reset", id))
        .await;
    response.assert_status_ok();
    let session: Value = response.json();
    assert_eq!(session["id"], id.as_str());
    assert_eq!(session["step"], "initial");
    assert!(session["media_type"].is_null());
    assert!(session["transcript"].as_array().unwrap().is_empty());

    server
        .get("/api/v1/chat/sessions/does-not-exist")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_trending() {
    let server = create_test_server();

    let response = server.get("/api/v1/trending/tv").await;
    response.assert_status_ok();
    let titles: Vec<Value> = response.json();
    assert_eq!(titles.len(), 3);
    assert_eq!(titles[0]["media_type"], "tv");

    server
        .get("/api/v1/trending/book")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .get("/api/v1/trending/podcast")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_records_history() {
    let server = create_test_server();

    server
        .get("/api/v1/search?q=Dune&media_type=movie")
        .await
        .assert_status_ok();
    server.get("/api/v1/search?q=Arrival").await.assert_status_ok();
    server.get("/api/v1/search?q=dune").await.assert_status_ok();

    let history: Vec<String> = server.get("/api/v1/search/history").await.json();
    assert_eq!(history, vec!["dune", "Arrival"]);

    server
        .delete("/api/v1/search/history")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let history: Vec<String> = server.get("/api/v1/search/history").await.json();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_watch_providers_default_to_detected_region() {
    let server = create_test_server();

    let providers: Value = server.get("/api/v1/titles/movie/27205/providers").await.json();
    assert_eq!(providers["region"], "IN");

    let providers: Value = server
        .get("/api/v1/titles/tv/1399/providers?region=gb")
        .await
        .json();
    assert_eq!(providers["region"], "GB");

    let region: Value = server.get("/api/v1/region").await.json();
    assert_eq!(region["region"], "IN");
}

#[tokio::test]
async fn test_bingo_board() {
    let server = create_test_server();

    let board: Value = server.get("/api/v1/bingo").await.json();
    assert_eq!(board["squares"].as_array().unwrap().len(), 25);
    assert!(board["lines"].as_array().unwrap().is_empty());

    for id in [11, 12, 14, 15] {
        server
            .post(&format!("/api/v1/bingo/squares/{}", id))
            .await
            .assert_status_ok();
    }

    let board: Value = server.get("/api/v1/bingo").await.json();
    assert_eq!(board["lines"], json!([{"kind": "row", "index": 3}]));

    server
        .post("/api/v1/bingo/squares/26")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let board: Value = server
        .post("/api/v1/bingo/reset")
        .json(&json!({"media_type": "book"}))
        .await
        .json();
    assert_eq!(board["media_type"], "book");
    assert!(board["completed"].as_array().unwrap().is_empty());
}
