//! Errors raised by the I/O collaborators (PNG reader, config loader, CLI).
//!
//! The parsing core itself never fails; it always returns a best-effort
//! `ParameterSet`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfotextError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a valid PNG file: {0}")]
    NotPng(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, InfotextError>;
