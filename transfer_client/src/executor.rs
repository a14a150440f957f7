use std::time::Duration;

use error_printer::ErrorPrinter;
use futures::TryStreamExt;
use http::header::CONTENT_TYPE;
use reqwest::{Body, Response};
use reqwest_middleware::ClientWithMiddleware;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;
use tracing::{debug, info, trace};
use url::Url;
use utils::ChannelStream;

use crate::completion::TransferState;
use crate::error::{Result, TransferError};
use crate::progress_notifier::ProgressNotifier;
use crate::source::DownloadDestination;

/// Turns a non-success response into [TransferError::Server] carrying the body text.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .bytes()
        .await
        .info_error("failed to read error response body")
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default();
    info!(%status, "server rejected transfer");
    Err(TransferError::Server { status, body })
}

/// POSTs the piped multipart body to `url`.
pub(crate) async fn send_upload_request(
    http: &ClientWithMiddleware,
    url: Url,
    body: ChannelStream,
    content_type: String,
) -> Result<()> {
    debug!(%url, "sending upload request");
    let response = http
        .post(url)
        .header(CONTENT_TYPE, content_type)
        .body(Body::wrap_stream(body))
        .send()
        .await?;

    check_status(response).await?;
    Ok(())
}

pub(crate) struct DownloadTarget {
    pub destination: DownloadDestination,
    pub progress: Option<mpsc::Sender<u64>>,
    pub progress_interval: Duration,
    pub copy_buffer_size: usize,
}

/// GETs `url` into the destination.  The destination is opened before the request goes out, and
/// nothing is written to it unless the server answers with success.
pub(crate) async fn fetch_download(http: &ClientWithMiddleware, url: Url, target: DownloadTarget) -> Result<u64> {
    let mut destination = target.destination;
    let writer = destination.open().await?;

    debug!(%url, "sending download request");
    let response = http.get(url).send().await?;
    let response = check_status(response).await?;

    trace!(state = %TransferState::Streaming);
    let body = StreamReader::new(Box::pin(response.bytes_stream().map_err(std::io::Error::other)));
    let mut notifier = ProgressNotifier::wrap(body, target.progress, target.progress_interval);

    let copied = {
        let mut reader = BufReader::with_capacity(target.copy_buffer_size.max(1), &mut notifier);
        tokio::io::copy_buf(&mut reader, &mut *writer).await
    };
    notifier.close();

    trace!(state = %TransferState::Finalizing);
    let copied = copied?;
    writer.flush().await?;
    writer.shutdown().await?;
    Ok(copied)
}
