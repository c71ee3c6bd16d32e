//! # Amicale Client Crate
//!
//! The portal-side counterpart of the realtime gateway: a background agent
//! that holds one logical WebSocket connection per tab, exposes the roster,
//! chat stream, and connection state as observable channels, and reconnects
//! with bounded exponential backoff when the connection drops unexpectedly.

pub mod agent;
pub mod error;
pub mod reconnect;

pub use agent::{AgentConfig, ConnectionState, RealtimeAgent};
pub use error::ClientError;
pub use reconnect::{BackoffConfig, ReconnectDecision, ReconnectPolicy, ReconnectState};
