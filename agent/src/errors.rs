use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sensor read error: {0}")]
    Sensor(String),
}

pub type Result<T> = std::result::Result<T, Error>;
