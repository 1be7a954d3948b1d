//! Admin route definitions

use axum::{routing::post, Router};

use crate::handlers::*;
use crate::state::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/contracts/status",
            post(bulk_update_contract_status),
        )
        .route("/api/admin/rfqs/:id/close", post(close_rfq))
}
