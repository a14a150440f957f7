use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, trace, Instrument};

use crate::completion::{TransferCompletion, TransferState};
use crate::error::{Result, TransferError};
use crate::executor::send_upload_request;
use crate::multipart::{write_upload_body, MultipartWriter, UploadBody};
use crate::source::UploadSource;
use crate::TransferClient;

impl TransferClient {
    /// Uploads `files` (and `metadata`, when non-empty) to `url` as one `multipart/form-data` request.
    ///
    /// The body is encoded while it is being sent.  Cumulative file bytes are offered to `progress`
    /// without blocking, and the channel is closed once the body is done.  Files are opened one at a
    /// time, just before they are encoded.
    pub fn upload(
        &self,
        url: &str,
        metadata: Option<Vec<u8>>,
        progress: Option<mpsc::Sender<u64>>,
        files: Vec<UploadSource>,
    ) -> TransferCompletion {
        self.upload_with_cancellation(url, metadata, progress, files, CancellationToken::new())
    }

    /// Like [TransferClient::upload], creating a progress channel of the configured capacity.
    pub fn upload_simple(
        &self,
        url: &str,
        metadata: Option<Vec<u8>>,
        files: Vec<UploadSource>,
    ) -> (mpsc::Receiver<u64>, TransferCompletion) {
        let (tx, rx) = mpsc::channel(self.config.progress_channel_capacity.max(1));
        (rx, self.upload(url, metadata, Some(tx), files))
    }

    /// Like [TransferClient::upload]; cancelling `cancel` stops the encoder and drops the request,
    /// and the transfer resolves to [TransferError::Cancelled].
    pub fn upload_with_cancellation(
        &self,
        url: &str,
        metadata: Option<Vec<u8>>,
        progress: Option<mpsc::Sender<u64>>,
        files: Vec<UploadSource>,
        cancel: CancellationToken,
    ) -> TransferCompletion {
        let span = info_span!("upload", url, files = files.len());
        let _guard = span.enter();
        trace!(state = %TransferState::Idle);

        // Rejected here, nothing has been spawned and no request is made.
        let url = match self.resolve_url(url) {
            Ok(url) => url,
            Err(e) => return TransferCompletion::ready(Err(e)),
        };
        trace!(state = %TransferState::SourcesResolving);
        if let Err(e) = files.iter().try_for_each(UploadSource::validate) {
            debug!(state = %TransferState::Failed, error = %e, "invalid upload source");
            return TransferCompletion::ready(Err(e));
        }

        let (pipe, body_stream) = utils::pipe(self.config.pipe_buffer_chunks);
        let multipart = MultipartWriter::new(pipe);
        let content_type = multipart.form_data_content_type();

        let body = UploadBody {
            metadata,
            sources: files,
            progress,
            progress_interval: self.config.progress_interval,
            copy_buffer_size: self.config.copy_buffer_size,
        };

        trace!(state = %TransferState::Streaming);
        let encoder = tokio::spawn(write_upload_body(multipart, body, cancel.clone()).in_current_span());

        let http = self.http.clone();
        let sender_cancel = cancel.clone();
        let sender = tokio::spawn(
            async move {
                tokio::select! {
                    result = send_upload_request(&http, url, body_stream, content_type) => result,
                    _ = sender_cancel.cancelled() => Err(TransferError::Cancelled),
                }
            }
            .in_current_span(),
        );

        let (tx, rx) = oneshot::channel();
        tokio::spawn(
            async move {
                let outcome = join_upload(encoder, sender).await;
                debug!(state = %TransferState::of_outcome(&outcome), "upload finished");
                let _ = tx.send(outcome);
            }
            .in_current_span(),
        );

        TransferCompletion::new(rx)
    }
}

async fn join_upload(encoder: JoinHandle<Result<()>>, sender: JoinHandle<Result<()>>) -> Result<()> {
    let encoded = encoder.await.unwrap_or_else(|e| Err(e.into()));
    let sent = sender.await.unwrap_or_else(|e| Err(e.into()));
    trace!(state = %TransferState::Finalizing);
    reduce_upload_outcome(encoded, sent)
}

/// Folds the encoder's and the sender's results into the result of the upload.
///
/// Cancellation wins over everything.  Otherwise an encoder failure is reported, unless it is only
/// the broken pipe left behind by a failed sender, in which case the sender's failure is the cause.
pub(crate) fn reduce_upload_outcome(encoded: Result<()>, sent: Result<()>) -> Result<()> {
    let cancelled = |r: &Result<()>| r.as_ref().is_err_and(TransferError::is_cancelled);
    if cancelled(&encoded) || cancelled(&sent) {
        return Err(TransferError::Cancelled);
    }

    match (encoded, sent) {
        (Err(encode_err), Err(send_err)) if encode_err.is_broken_pipe() => {
            debug!(error = %encode_err, "encoder stopped because the request failed");
            Err(send_err)
        },
        (Err(encode_err), _) => Err(encode_err),
        (Ok(()), sent) => sent,
    }
}
