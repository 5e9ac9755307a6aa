use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;
use crate::middleware::{make_span_with_request_id, request_id_middleware};

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Recommendations
        .route(
            "/recommendations",
            post(handlers::create_recommendation)
                .get(handlers::list_recommendations)
                .delete(handlers::clear_recommendations),
        )
        .route("/recommendations/:id", delete(handlers::delete_recommendation))
        // Guided chat
        .route("/chat/sessions", post(handlers::create_chat_session))
        .route("/chat/sessions/:id", get(handlers::get_chat_session))
        .route("/chat/sessions/:id/actions", post(handlers::chat_action))
        .route("/chat/sessions/:id/reset", post(handlers::reset_chat_session))
        // Browsing
        .route("/trending/:media_type", get(handlers::trending))
        .route("/search", get(handlers::search))
        .route(
            "/search/history",
            get(handlers::search_history).delete(handlers::clear_search_history),
        )
        .route("/titles/:media_type/:id/providers", get(handlers::watch_providers))
        .route("/region", get(handlers::region))
        // Bingo
        .route("/bingo", get(handlers::get_bingo))
        .route("/bingo/squares/:id", post(handlers::toggle_bingo_square))
        .route("/bingo/reset", post(handlers::reset_bingo))
}
