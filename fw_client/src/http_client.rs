use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use error_printer::{ErrorPrinter, OptionPrinter};
use fw_config::FwConfig;
use http::Extensions;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Request, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next};
use tracing::debug;

use crate::api_key::ApiKey;
use crate::errors::Result;

pub type DebugWriter = Box<dyn Write + Send>;

/// Builds the authenticated client used for every API request.
///
/// Request dumping is enabled when a `debug_writer` is given, or when `client.debug_requests` is
/// set in which case dumps go to stderr.
pub fn build_http_client(
    api_key: &ApiKey,
    insecure_skip_verify: bool,
    debug_writer: Option<DebugWriter>,
    config: &FwConfig,
) -> Result<ClientWithMiddleware> {
    let client_config = &config.client;
    let reqwest_client = reqwest::Client::builder()
        .connect_timeout(client_config.connect_timeout)
        .read_timeout(client_config.read_timeout)
        .pool_idle_timeout(client_config.idle_connection_timeout)
        .pool_max_idle_per_host(client_config.max_idle_connections)
        .user_agent(client_config.user_agent.as_str())
        .danger_accept_invalid_certs(insecure_skip_verify)
        .build()?;

    let debug_writer = debug_writer.or_else(|| {
        client_config
            .debug_requests
            .then(|| Box::new(std::io::stderr()) as DebugWriter)
    });
    let debug_middleware = debug_writer.map(DebugMiddleware::new).debug_none("request dumping disabled");

    Ok(ClientBuilder::new(reqwest_client)
        .with(AuthMiddleware::new(&api_key.key)?)
        .maybe_with(debug_middleware)
        .build())
}

/// Helper trait to allow the reqwest_middleware client to optionally add a middleware.
trait OptionalMiddleware {
    fn maybe_with<M: Middleware>(self, middleware: Option<M>) -> Self;
}

impl OptionalMiddleware for ClientBuilder {
    fn maybe_with<M: Middleware>(self, middleware: Option<M>) -> Self {
        match middleware {
            Some(m) => self.with(m),
            None => self,
        }
    }
}

/// Adds `Authorization: scitran-user <key>` to outbound requests.
pub struct AuthMiddleware {
    header: HeaderValue,
}

impl AuthMiddleware {
    pub fn new(key: &str) -> Result<Self> {
        let mut header = HeaderValue::from_str(&format!("scitran-user {key}"))?;
        header.set_sensitive(true);
        Ok(Self { header })
    }
}

#[async_trait::async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        req.headers_mut().insert(AUTHORIZATION, self.header.clone());
        next.run(req, extensions).await
    }
}

const BEGIN_HTTP: &str = "\n--------------------\n-----BEGIN HTTP-----\n--------------------\n";
const END_HTTP: &str = "\n--------------------\n----- END HTTP -----\n--------------------\n";
const BEGIN_RESPONSE: &str = "\n--------------------\n---BEGIN RESPONSE---\n--------------------\n";

/// Writes an HTTP/1.1 rendition of every request to a writer, followed by the response status line or
/// the failure.  Streaming bodies are not dumped, and credentials are masked.
pub struct DebugMiddleware {
    writer: Arc<Mutex<DebugWriter>>,
}

impl DebugMiddleware {
    pub fn new(writer: DebugWriter) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Dump failures are logged and otherwise ignored; they never change the request's outcome.
    fn write(&self, msg: &[u8]) {
        let _ = self
            .writer
            .lock()
            .map_err(|e| io::Error::other(format!("lock error: {e}")))
            .and_then(|mut writer| writer.write_all(msg).and_then(|_| writer.flush()))
            .warn_error("couldn't write request dump");
    }
}

fn dump_request(req: &Request) -> Vec<u8> {
    let url = req.url();
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let mut msg = format!("{} {} HTTP/1.1\r\n", req.method(), target);
    if let Some(host) = url.host_str() {
        match url.port() {
            Some(port) => msg.push_str(&format!("Host: {host}:{port}\r\n")),
            None => msg.push_str(&format!("Host: {host}\r\n")),
        }
    }
    for (name, value) in req.headers() {
        let value = if value.is_sensitive() {
            "****".into()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };
        msg.push_str(&format!("{name}: {value}\r\n"));
    }
    msg.push_str("\r\n");

    let mut msg = msg.into_bytes();
    if let Some(body) = req.body().and_then(|b| b.as_bytes()) {
        msg.extend_from_slice(body);
    }
    msg
}

#[async_trait::async_trait]
impl Middleware for DebugMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let mut msg = BEGIN_HTTP.as_bytes().to_vec();
        msg.extend(dump_request(&req));
        msg.extend_from_slice(END_HTTP.as_bytes());
        self.write(&msg);

        let result = next.run(req, extensions).await;

        let outcome = match &result {
            Ok(response) => format!("{BEGIN_RESPONSE}{:?} {}\n", response.version(), response.status()),
            Err(e) => {
                debug!(error = %e, "request failed");
                format!("{BEGIN_RESPONSE}Request failed: {e}\n")
            },
        };
        self.write(outcome.as_bytes());

        result
    }
}
