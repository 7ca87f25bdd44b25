//! Hetzner client error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HetznerError {
    #[error("API token is empty")]
    MissingToken,

    #[error("Invalid API endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, HetznerError>;
