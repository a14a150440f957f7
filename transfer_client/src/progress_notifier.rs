use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

/// Counts the bytes read through it and periodically reports the running total.
///
/// A background task wakes every `interval` and, if the total moved since the last report, offers
/// it to the observer channel with `try_send`; a full channel just misses that update.  After
/// [ProgressNotifier::close] (or drop) the task offers the final total once more and then drops
/// its sender, which closes the channel for the observer.
///
/// The underlying reader can be swapped with [ProgressNotifier::set_reader]; the total keeps
/// accumulating across readers.
pub struct ProgressNotifier<R> {
    reader: Option<R>,
    bytes_read: Arc<AtomicU64>,
    close_signal: Option<oneshot::Sender<()>>,
}

impl<R> ProgressNotifier<R> {
    /// A notifier with no reader yet; reads return EOF until [ProgressNotifier::set_reader] is called.
    ///
    /// Spawns the reporting task when `progress` is set, so this must be called inside a Tokio runtime.
    pub fn new(progress: Option<mpsc::Sender<u64>>, interval: Duration) -> Self {
        let bytes_read = Arc::new(AtomicU64::new(0));

        let close_signal = progress.map(|progress| {
            let (tx, rx) = oneshot::channel();
            tokio::spawn(report_progress(bytes_read.clone(), progress, interval, rx));
            tx
        });

        Self {
            reader: None,
            bytes_read,
            close_signal,
        }
    }

    pub fn wrap(reader: R, progress: Option<mpsc::Sender<u64>>, interval: Duration) -> Self {
        let mut notifier = Self::new(progress, interval);
        notifier.reader = Some(reader);
        notifier
    }

    /// Replaces the underlying reader, dropping the previous one.  The byte count is kept.
    pub fn set_reader(&mut self, reader: R) {
        self.reader = Some(reader);
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Acquire)
    }

    /// Drops the underlying reader and tells the reporting task to send the final total and close the
    /// observer channel.  Calling this again does nothing.
    pub fn close(&mut self) {
        self.reader = None;
        if self.close_signal.take().is_some() {
            trace!(bytes_read = self.bytes_read(), "progress notifier closed");
        }
    }
}

impl<R> Drop for ProgressNotifier<R> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressNotifier<R> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let Some(reader) = self.reader.as_mut() else {
            return Poll::Ready(Ok(()));
        };

        let before = buf.filled().len();
        ready!(Pin::new(reader).poll_read(cx, buf))?;
        let n = (buf.filled().len() - before) as u64;

        if n > 0 {
            self.bytes_read.fetch_add(n, Ordering::AcqRel);
        }
        Poll::Ready(Ok(()))
    }
}

async fn report_progress(
    bytes_read: Arc<AtomicU64>,
    progress: mpsc::Sender<u64>,
    interval: Duration,
    mut closed: oneshot::Receiver<()>,
) {
    let mut last_reported: Option<u64> = None;

    loop {
        tokio::select! {
            biased;
            _ = &mut closed => break,
            _ = tokio::time::sleep(interval) => {
                let current = bytes_read.load(Ordering::Acquire);
                if last_reported.map_or(true, |last| current > last) {
                    // Observers that fall behind miss updates rather than stall the transfer.
                    let _ = progress.try_send(current);
                    last_reported = Some(current);
                }
            },
        }
    }

    let _ = progress.try_send(bytes_read.load(Ordering::Acquire));
}
