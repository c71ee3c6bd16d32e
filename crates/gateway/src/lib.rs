//! # Amicale Gateway Crate
//!
//! Protocol/session layer for the portal's realtime subsystem: accepts
//! WebSocket connections, authenticates them against the session directory,
//! drives each connection's receive loop, and is the only component that
//! talks to the transport. All shared state lives in the serialized
//! [`amicale_realtime::RealtimeCore`].

pub mod error;
pub mod rest;
pub mod state;
pub mod websocket;

pub use error::{GatewayError, GatewayResult};
pub use state::GatewayState;

use std::sync::Arc;

use axum::{
    http::Method,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Create the gateway router: the realtime WebSocket endpoint plus health.
pub fn create_router(state: GatewayState) -> Router {
    let arc_state = Arc::new(state);

    let router = Router::new()
        .route("/health", get(rest::health_check))
        .route("/ws", get(websocket::realtime_ws_handler));

    #[cfg(debug_assertions)]
    let router = router.route(
        "/api/auth/dev/session",
        axum::routing::post(rest::dev::create_dev_session),
    );

    router.with_state(arc_state).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any),
    )
}
