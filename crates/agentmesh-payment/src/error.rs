//! Explorer error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("Explorer request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Explorer returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Explorer response could not be decoded: {0}")]
    Decode(String),
}

pub type ExplorerResult<T> = Result<T, ExplorerError>;
