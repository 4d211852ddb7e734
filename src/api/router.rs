use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, create_borrowing, get_borrowing_by_id, list_borrowings, return_all,
    return_line_item, statistics, top_books, unreturned_count,
};

/// Creates the API router with all borrowing endpoints
///
/// Command endpoints (Write operations):
/// - POST /borrowings - Create a borrowing record
/// - POST /borrowings/:id/return - Return every outstanding line item
/// - POST /borrowings/:id/items/:item_id/return - Return one line item
///
/// Query endpoints (Read operations):
/// - GET /borrowings - List borrowing records with filters
/// - GET /borrowings/:id - Get a borrowing record
/// - GET /borrowings/unreturned-count - Copies currently out
/// - GET /borrowings/statistics - Borrow counts per week, month or year
/// - GET /borrowings/top-books - Most borrowed books
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Command endpoints (Write operations)
        .route("/borrowings", post(create_borrowing).get(list_borrowings))
        .route("/borrowings/:id/return", post(return_all))
        .route(
            "/borrowings/:id/items/:item_id/return",
            post(return_line_item),
        )
        // Query endpoints (Read operations)
        .route("/borrowings/unreturned-count", get(unreturned_count))
        .route("/borrowings/statistics", get(statistics))
        .route("/borrowings/top-books", get(top_books))
        .route("/borrowings/:id", get(get_borrowing_by_id))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
