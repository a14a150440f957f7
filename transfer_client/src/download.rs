use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, trace, Instrument};

use crate::completion::{TransferCompletion, TransferState};
use crate::error::TransferError;
use crate::executor::{fetch_download, DownloadTarget};
use crate::source::DownloadDestination;
use crate::TransferClient;

impl TransferClient {
    /// Downloads `url` into `destination`, offering cumulative byte counts to `progress` without
    /// blocking.  The progress channel closes when the body has been copied or the download fails.
    ///
    /// A failed download may leave a partially written destination behind.
    pub fn download(
        &self,
        url: &str,
        progress: Option<mpsc::Sender<u64>>,
        destination: DownloadDestination,
    ) -> TransferCompletion {
        self.download_with_cancellation(url, progress, destination, CancellationToken::new())
    }

    /// Like [TransferClient::download], creating a progress channel of the configured capacity.
    pub fn download_simple(&self, url: &str, destination: DownloadDestination) -> (mpsc::Receiver<u64>, TransferCompletion) {
        let (tx, rx) = mpsc::channel(self.config.progress_channel_capacity.max(1));
        (rx, self.download(url, Some(tx), destination))
    }

    pub fn download_with_cancellation(
        &self,
        url: &str,
        progress: Option<mpsc::Sender<u64>>,
        destination: DownloadDestination,
        cancel: CancellationToken,
    ) -> TransferCompletion {
        let span = info_span!("download", url);
        let _guard = span.enter();
        trace!(state = %TransferState::Idle);

        let url = match self.resolve_url(url) {
            Ok(url) => url,
            Err(e) => return TransferCompletion::ready(Err(e)),
        };

        let target = DownloadTarget {
            destination,
            progress,
            progress_interval: self.config.progress_interval,
            copy_buffer_size: self.config.copy_buffer_size,
        };

        let http = self.http.clone();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(
            async move {
                trace!(state = %TransferState::SourcesResolving);
                let outcome = tokio::select! {
                    result = fetch_download(&http, url, target) => result,
                    _ = cancel.cancelled() => Err(TransferError::Cancelled),
                };

                match &outcome {
                    Ok(bytes) => debug!(state = %TransferState::Succeeded, bytes, "download finished"),
                    Err(e) => debug!(state = %TransferState::Failed, error = %e, "download finished"),
                }
                let _ = tx.send(outcome.map(|_| ()));
            }
            .in_current_span(),
        );

        TransferCompletion::new(rx)
    }
}
