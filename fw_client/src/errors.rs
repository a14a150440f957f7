use std::num::ParseIntError;

use thiserror::Error;
use transfer_client::TransferError;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum FwClientError {
    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Invalid port in API key: {0}")]
    InvalidPort(#[from] ParseIntError),

    #[error("Invalid base url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

pub type Result<T> = std::result::Result<T, FwClientError>;
