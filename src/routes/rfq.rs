//! RFQ route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn rfq_routes() -> Router<AppState> {
    Router::new()
        .route("/api/rfqs", post(create_rfq))
        .route("/api/rfqs", get(list_rfqs))
        .route("/api/rfqs/:id", get(get_rfq))
        .route("/api/rfqs/:id/seen", post(mark_rfq_seen))
        .route("/api/rfqs/:id/in-progress", post(mark_rfq_in_progress))
        .route("/api/rfqs/:id/reject", post(reject_rfq))
}
