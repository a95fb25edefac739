//! Errors for the AIS tracker
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AisTrackerError {
    #[error("websocket error")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("connection setup timed out")]
    ConnectTimeout,

    #[error("no traffic within keep-alive window")]
    StaleConnection,

    #[error("stream closed by remote")]
    ConnectionClosed,

    #[error("server error frame: {0}")]
    ServerError(String),

    #[error("serialization error")]
    SerdeError(#[from] serde_json::Error),

    #[error("configuration error")]
    ConfigError(#[from] config::ConfigError),

    #[error("missing AIS stream API key")]
    MissingApiKey,

    #[error("IO error")]
    IoError(#[from] std::io::Error),

    #[error("invalid MMSI: {0}")]
    InvalidMmsi(String),

    #[error("database error")]
    DatabaseError(#[from] sqlx::Error),
}
