//! TradeLink Backend Library
//!
//! Core modules for the TradeLink B2B marketplace backend: the
//! RFQ/quote/contract negotiation pipeline, chat, and real-time fan-out.

pub mod auth;
pub mod chat;
pub mod config;
pub mod contract;
pub mod db;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod middleware;
pub mod models;
pub mod quote;
pub mod rfq;
pub mod routes;
pub mod state;
pub mod websocket;
