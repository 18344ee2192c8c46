pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod services;
pub mod store;
pub mod stripe;
pub mod verifier;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::reconciler::Reconciler;
use crate::store::OrderStore;
use crate::stripe::StripeClient;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub stripe: StripeClient,
    pub reconciler: Reconciler,
    pub webhook_secret: String,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn OrderStore>, stripe: StripeClient, webhook_secret: String) -> Self {
        let reconciler = Reconciler::new(store.clone());
        Self {
            store,
            stripe,
            reconciler,
            webhook_secret,
            started_at: Instant::now(),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/create-payment-intent",
            post(handlers::payments::create_payment_intent),
        )
        .route("/save-order", post(handlers::payments::save_order))
        .route("/webhook", post(handlers::webhook::webhook))
        .route("/api/orders", get(handlers::orders::list_orders))
        .route("/api/orders/:id", get(handlers::orders::get_order))
        // The dashboard is served from another origin.
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
