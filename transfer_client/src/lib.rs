#![cfg_attr(feature = "strict", deny(warnings))]

mod completion;
mod download;
pub mod error;
mod executor;
pub mod multipart;
pub mod progress_notifier;
pub mod source;
mod upload;

pub use completion::{TransferCompletion, TransferState};
pub use error::{Result, TransferError, TransferErrorKind};
pub use progress_notifier::ProgressNotifier;
pub use source::{upload_sources_from_paths, DownloadDestination, SinkWriter, SourceReader, UploadSource};
pub use tokio_util::sync::CancellationToken;

use fw_config::groups::transfer::ConfigValueGroup as TransferConfig;
use reqwest_middleware::ClientWithMiddleware;
use url::Url;

/// Streams uploads and downloads against one API base URL.
///
/// Authentication, timeouts and request logging belong to the `ClientWithMiddleware` handed in;
/// this type only moves bytes.  The transfer calls spawn tasks, so they must be made from inside
/// a Tokio runtime.
#[derive(Clone, Debug)]
pub struct TransferClient {
    http: ClientWithMiddleware,
    base_url: Url,
    config: TransferConfig,
}

impl TransferClient {
    /// `base_url` should end with a `/` so that relative paths land beneath it.
    pub fn new(http: ClientWithMiddleware, base_url: Url) -> Self {
        Self::with_config(http, base_url, fw_config::FwConfig::new().transfer)
    }

    pub fn with_config(http: ClientWithMiddleware, base_url: Url, config: TransferConfig) -> Self {
        Self { http, base_url, config }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Joins a relative path onto the base URL.  Absolute URLs pass through unchanged.
    pub fn resolve_url(&self, url: &str) -> Result<Url> {
        Ok(self.base_url.join(url)?)
    }
}
