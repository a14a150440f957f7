use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::sync::PollSender;

/// Creates a bounded in-memory pipe.
///
/// Everything written into the [ChannelWriter] comes out of the [ChannelStream] as `Bytes` chunks,
/// in order.  At most `buffer_chunks` writes are held in flight; past that the writer suspends until
/// the reading side catches up.  Dropping or shutting down the writer ends the stream; calling
/// [ChannelWriter::abort] ends it with an error instead.
pub fn pipe(buffer_chunks: usize) -> (ChannelWriter, ChannelStream) {
    let (sender, receiver) = mpsc::channel(buffer_chunks.max(1));
    (ChannelWriter::new(sender), ChannelStream::new(receiver))
}

/// Reading half of [pipe].  Implements `Stream<Item = io::Result<Bytes>>` so it can be handed to an
/// HTTP client as a streaming request body.
pub struct ChannelStream(mpsc::Receiver<io::Result<Bytes>>);

impl ChannelStream {
    fn new(rx: mpsc::Receiver<io::Result<Bytes>>) -> Self {
        Self(rx)
    }
}

impl Stream for ChannelStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.poll_recv(cx)
    }
}

/// Writing half of [pipe].
pub struct ChannelWriter(PollSender<io::Result<Bytes>>);

impl ChannelWriter {
    fn new(tx: mpsc::Sender<io::Result<Bytes>>) -> Self {
        Self(PollSender::new(tx))
    }

    /// Ends the pipe with `error`, so the reader observes a failed stream rather than a clean EOF.
    ///
    /// If the reader has already gone away this is a no-op.
    pub async fn abort(mut self, error: io::Error) {
        let sender = self.0.get_ref().cloned();
        self.0.close();

        if let Some(sender) = sender {
            let _ = sender.send(Err(error)).await;
        }
    }
}

fn receiver_closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "receiver closed")
}

impl AsyncWrite for ChannelWriter {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        // Registers the waker when the channel is full, so backpressure resumes on the next receive.
        ready!(self.0.poll_reserve(cx)).map_err(|_| receiver_closed())?;

        let data = Bytes::copy_from_slice(buf);
        let len = data.len();
        self.0.send_item(Ok(data)).map_err(|_| receiver_closed())?;

        Poll::Ready(Ok(len))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        // Every completed write is already queued on the channel.
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.0.close();
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_util::io::StreamReader;

    use super::*;

    #[tokio::test]
    async fn test_channel_read_write() {
        let (mut writer, stream) = pipe(10);
        let mut reader = StreamReader::new(stream);

        writer.write_all(b"Hello, ").await.unwrap();
        writer.write_all(b"World!").await.unwrap();

        // Drop writer to signal EOF
        drop(writer);

        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();

        assert_eq!(buf, b"Hello, World!");
    }

    #[tokio::test]
    async fn test_shutdown_ends_stream() {
        let (mut writer, mut stream) = pipe(4);

        writer.write_all(b"abc").await.unwrap();
        writer.shutdown().await.unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from("abc"));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_abort_surfaces_error_to_reader() {
        let (mut writer, stream) = pipe(4);
        let mut reader = StreamReader::new(stream);

        writer.write_all(b"partial").await.unwrap();
        writer.abort(io::Error::new(io::ErrorKind::NotFound, "missing file")).await;

        let mut buf = Vec::new();
        let err = reader.read_to_end(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(buf, b"partial");
    }

    #[tokio::test]
    async fn test_write_after_reader_dropped_is_broken_pipe() {
        let (mut writer, stream) = pipe(4);
        drop(stream);

        let err = writer.write_all(b"data").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_full_pipe_applies_backpressure() {
        let (mut writer, mut stream) = pipe(1);

        writer.write_all(b"one").await.unwrap();

        // The single slot is taken; the second write must wait for the reader.
        let blocked = tokio::time::timeout(Duration::from_millis(50), writer.write_all(b"two")).await;
        assert!(blocked.is_err());

        let handle = tokio::spawn(async move {
            writer.write_all(b"two").await.unwrap();
        });

        assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from("one"));
        handle.await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from("two"));
        assert!(stream.next().await.is_none());
    }
}
