#![cfg_attr(feature = "strict", deny(warnings))]

mod api_key;
mod client;
mod containers;
mod errors;
mod http_client;
mod types;

pub use api_key::ApiKey;
pub use client::{ClientOptions, FwClient};
pub use containers::ContainerKind;
pub use errors::{FwClientError, Result};
pub use http_client::{build_http_client, AuthMiddleware, DebugMiddleware, DebugWriter};
pub use types::ApiError;

pub use transfer_client::{
    upload_sources_from_paths, CancellationToken, DownloadDestination, TransferClient, TransferCompletion,
    TransferError, TransferErrorKind, UploadSource,
};
