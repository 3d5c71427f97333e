use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("channel is not connected")]
    NotConnected,
}

impl From<tokio::sync::mpsc::error::SendError<tokio_tungstenite::tungstenite::Message>>
    for SyncError
{
    fn from(
        err: tokio::sync::mpsc::error::SendError<tokio_tungstenite::tungstenite::Message>,
    ) -> Self {
        SyncError::Connection(format!("failed to hand message to socket task: {err}"))
    }
}
