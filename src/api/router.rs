use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, add_copies, borrow_copy, get_loan, list_book_copies, list_borrower_loans,
    register_book, remove_copy, return_loan,
};

/// Creates the API router with all lending endpoints
///
/// Command endpoints (Write operations):
/// - POST /copies/:id/borrow - Borrow a copy
/// - POST /loans/:id/return - Return a loan
/// - DELETE /copies/:id - Remove a copy (admin)
/// - POST /books - Register a book with its first copies (admin)
/// - POST /books/:id/copies - Add copies to a book (admin)
///
/// Query endpoints (Read operations):
/// - GET /loans/:id - Get loan details
/// - GET /borrowers/:id/loans - Borrowing history, newest first
/// - GET /books/:id/copies - Copies with their current borrower
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Command endpoints (Write operations)
        .route("/copies/:id/borrow", post(borrow_copy))
        .route("/copies/:id", delete(remove_copy))
        .route("/loans/:id/return", post(return_loan))
        .route("/books", post(register_book))
        .route("/books/:id/copies", post(add_copies).get(list_book_copies))
        // Query endpoints (Read operations)
        .route("/loans/:id", get(get_loan))
        .route("/borrowers/:id/loans", get(list_borrower_loans))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
