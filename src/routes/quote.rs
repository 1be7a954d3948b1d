//! Quote route definitions

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn quote_routes() -> Router<AppState> {
    Router::new()
        .route("/api/quotes", post(create_quote))
        .route("/api/quotes", get(list_quotes))
        .route("/api/quotes/:id", get(get_quote))
        .route("/api/quotes/:id", put(update_quote))
        .route("/api/quotes/:id/accept", post(accept_quote))
        .route("/api/quotes/:id/reject", post(reject_quote))
}
