use std::fmt;

use fw_config::FwConfig;
use reqwest_middleware::ClientWithMiddleware;
use tracing::info;
use transfer_client::TransferClient;
use url::Url;

use crate::api_key::ApiKey;
use crate::errors::Result;
use crate::http_client::{build_http_client, DebugWriter};

/// Connection options for [FwClient::new].
#[derive(Default)]
pub struct ClientOptions {
    /// Skip TLS certificate verification.  Development only.
    pub insecure_skip_verify: bool,
    /// Talk plain HTTP instead of HTTPS.  Development only.
    pub insecure_use_plaintext: bool,
    /// Dump every request to this writer.
    pub debug_writer: Option<DebugWriter>,
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("insecure_use_plaintext", &self.insecure_use_plaintext)
            .field("debug_writer", &self.debug_writer.is_some())
            .finish()
    }
}

/// Client for one site, authenticated with an API key.
#[derive(Clone, Debug)]
pub struct FwClient {
    http: ClientWithMiddleware,
    transfers: TransferClient,
}

impl FwClient {
    /// Builds a client from an API key (`host:key` or `host:port:key`) with configuration read from
    /// the environment.
    pub fn new(api_key: &str, options: ClientOptions) -> Result<Self> {
        Self::with_config(api_key, options, &FwConfig::new())
    }

    pub fn with_config(api_key: &str, options: ClientOptions, config: &FwConfig) -> Result<Self> {
        let api_key: ApiKey = api_key.parse()?;
        let base_url = api_key.base_url(options.insecure_use_plaintext)?;

        let http = build_http_client(&api_key, options.insecure_skip_verify, options.debug_writer, config)?;
        info!(%base_url, "created api client");

        Ok(Self {
            transfers: TransferClient::with_config(http.clone(), base_url, config.transfer.clone()),
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        self.transfers.base_url()
    }

    /// The authenticated HTTP client, for requests outside the transfer calls.
    pub fn http(&self) -> &ClientWithMiddleware {
        &self.http
    }

    pub fn transfers(&self) -> &TransferClient {
        &self.transfers
    }
}
