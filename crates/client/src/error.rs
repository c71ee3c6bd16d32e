use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no session token available, not connecting")]
    MissingToken,
    #[error("not connected to the realtime gateway")]
    NotConnected,
    #[error("websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("failed to encode client frame: {0}")]
    Encoding(#[from] serde_json::Error),
}
