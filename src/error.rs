// src/error.rs
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NfcError {
    #[error("NFC tag isn't a ISO-DEP (ISO 14443-4) NFC tag")]
    UnsupportedTag,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("No session with the remote service")]
    NotConnected,

    #[error("Remote endpoint closed")]
    Closed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}
