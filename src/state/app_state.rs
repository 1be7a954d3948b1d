//! Application state shared across handlers

use std::sync::Arc;

use sqlx::PgPool;

use crate::chat::ChatService;
use crate::contract::ContractService;
use crate::mailer::Mailer;
use crate::quote::QuoteService;
use crate::rfq::RfqService;
use crate::websocket::WsState;

use axum::extract::FromRef;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub rfq_service: Arc<RfqService>,
    pub quote_service: Arc<QuoteService>,
    pub contract_service: Arc<ContractService>,
    pub chat_service: Arc<ChatService>,
    pub mailer: Arc<Mailer>,
    pub ws_state: WsState,
    pub jwt_secret: String,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: PgPool,
        rfq_service: Arc<RfqService>,
        quote_service: Arc<QuoteService>,
        contract_service: Arc<ContractService>,
        chat_service: Arc<ChatService>,
        mailer: Arc<Mailer>,
        ws_state: WsState,
        jwt_secret: String,
    ) -> Self {
        Self {
            db,
            rfq_service,
            quote_service,
            contract_service,
            chat_service,
            mailer,
            ws_state,
            jwt_secret,
        }
    }
}

impl FromRef<AppState> for WsState {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ws_state.clone()
    }
}

impl FromRef<AppState> for Arc<RfqService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.rfq_service.clone()
    }
}

impl FromRef<AppState> for Arc<QuoteService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.quote_service.clone()
    }
}

impl FromRef<AppState> for Arc<ContractService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.contract_service.clone()
    }
}

impl FromRef<AppState> for Arc<ChatService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.chat_service.clone()
    }
}
