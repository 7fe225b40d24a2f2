use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid signaling url: {0}")]
    Url(#[from] url::ParseError),

    #[error("webrtc error: {0}")]
    WebRtc(#[from] webrtc::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("local media unavailable: {0}")]
    MediaUnavailable(String),

    #[error("user lookup failed: {0}")]
    Directory(String),

    #[error("signaling handshake failed: {0}")]
    Handshake(String),

    #[error("signaling channel closed")]
    Closed,
}

impl ClientError {
    /// Whether joining again may succeed without user intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::WebSocket(_) | ClientError::Handshake(_) | ClientError::Closed
        )
    }
}
