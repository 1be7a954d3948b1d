//! Contract route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn contract_routes() -> Router<AppState> {
    Router::new()
        .route("/api/contracts", get(list_contracts))
        .route("/api/contracts/:id", get(get_contract))
        .route("/api/contracts/:id/status", post(update_contract_status))
}
