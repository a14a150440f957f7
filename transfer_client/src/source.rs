use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::debug;

use crate::error::{Result, TransferError};

pub type SourceReader = Box<dyn AsyncRead + Send + Unpin>;
pub type SinkWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One file of an upload.
///
/// Either `reader` or `path` must be set; when both are, the reader is used.  A path is only opened
/// when the encoder reaches this source.  An empty `name` is replaced by the base name of `path`.
///
/// Once opened, the source reads from its handle; reading an unopened source is an error.
#[derive(Default)]
pub struct UploadSource {
    pub name: String,
    pub path: Option<PathBuf>,
    pub reader: Option<SourceReader>,
}

impl UploadSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn from_reader(name: impl Into<String>, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            name: name.into(),
            reader: Some(Box::new(reader)),
            ..Default::default()
        }
    }

    pub fn from_bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::from_reader(name, std::io::Cursor::new(data.into()))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref().filter(|p| !p.as_os_str().is_empty())
    }

    /// The multipart file name: `name`, or the base name of `path` when `name` is empty.
    pub fn resolved_name(&self) -> Result<String> {
        if !self.name.is_empty() {
            return Ok(self.name.clone());
        }

        let path = self.path().ok_or(TransferError::MissingSourceName)?;
        Ok(path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()))
    }

    /// Checks that the source can be encoded without touching the filesystem.
    pub fn validate(&self) -> Result<()> {
        let name = self.resolved_name()?;
        if self.reader.is_none() && self.path().is_none() {
            return Err(TransferError::MissingSourceData { name });
        }
        Ok(())
    }

    /// Returns the reader, opening `path` on first use.  Later calls hand back the same handle.
    pub async fn open(&mut self) -> Result<&mut SourceReader> {
        let reader = match self.reader.take() {
            Some(reader) => reader,
            None => self.open_path().await?,
        };
        Ok(self.reader.insert(reader))
    }

    async fn open_path(&mut self) -> Result<SourceReader> {
        let Some(path) = self.path() else {
            return Err(TransferError::MissingSourceData { name: self.name.clone() });
        };

        debug!(path = %path.display(), "opening upload source");
        let file = File::open(path).await.map_err(|source| TransferError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Box::new(file))
    }
}

impl AsyncRead for UploadSource {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.reader.as_mut() {
            Some(reader) => Pin::new(reader).poll_read(cx, buf),
            None => Poll::Ready(Err(io::Error::new(io::ErrorKind::NotConnected, "upload source is not open"))),
        }
    }
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadSource")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("reader", &self.reader.as_ref().map(|_| "..."))
            .finish()
    }
}

/// Upload sources for a list of file paths, each named after its base name.
pub fn upload_sources_from_paths<I, P>(paths: I) -> Vec<UploadSource>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    paths.into_iter().map(UploadSource::from_path).collect()
}

/// Where a download is written.
///
/// Either `writer` or `path` must be set; when both are, the writer is used.  A path is created (or
/// truncated) right before the request is sent.
#[derive(Default)]
pub struct DownloadDestination {
    pub path: Option<PathBuf>,
    pub writer: Option<SinkWriter>,
}

impl DownloadDestination {
    pub fn to_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            writer: None,
        }
    }

    pub fn to_writer(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            path: None,
            writer: Some(Box::new(writer)),
        }
    }

    /// Returns the writer, creating `path` on first use.  Later calls hand back the same handle.
    pub async fn open(&mut self) -> Result<&mut SinkWriter> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => self.create_path().await?,
        };
        Ok(self.writer.insert(writer))
    }

    async fn create_path(&mut self) -> Result<SinkWriter> {
        let Some(path) = self.path.as_deref().filter(|p| !p.as_os_str().is_empty()) else {
            return Err(TransferError::MissingDestination);
        };

        debug!(path = %path.display(), "creating download destination");
        let file = File::create(path).await.map_err(|source| TransferError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Box::new(file))
    }
}

impl fmt::Debug for DownloadDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadDestination")
            .field("path", &self.path)
            .field("writer", &self.writer.as_ref().map(|_| "..."))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::error::TransferErrorKind;

    #[test]
    fn test_name_from_path() {
        let source = UploadSource::from_path("/data/scans/t1.nii.gz");
        assert_eq!(source.resolved_name().unwrap(), "t1.nii.gz");

        let source = UploadSource::from_path("/data/scans/t1.nii.gz").with_name("renamed.nii.gz");
        assert_eq!(source.resolved_name().unwrap(), "renamed.nii.gz");
    }

    #[test]
    fn test_validate() {
        let err = UploadSource::default().validate().unwrap_err();
        assert!(matches!(err, TransferError::MissingSourceName));
        assert_eq!(err.kind(), TransferErrorKind::Encoding);

        let err = UploadSource {
            name: "named.txt".into(),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, TransferError::MissingSourceData { ref name } if name == "named.txt"));

        // An empty path counts as unset.
        let err = UploadSource::from_path("").validate().unwrap_err();
        assert!(matches!(err, TransferError::MissingSourceName));

        assert!(UploadSource::from_bytes("a.txt", b"abc".to_vec()).validate().is_ok());
        assert!(UploadSource::from_path("/does/not/exist").validate().is_ok());
    }

    #[tokio::test]
    async fn test_open_is_lazy_and_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.txt");
        std::fs::write(&path, b"hello").unwrap();

        let mut source = UploadSource::from_path(&path);
        assert!(source.reader.is_none());

        source.open().await.unwrap();
        assert!(source.reader.is_some());

        // A second open hands back the same handle, so the read position is shared.
        let mut first = [0u8; 2];
        source.open().await.unwrap().read_exact(&mut first).await.unwrap();
        let mut rest = String::new();
        source.open().await.unwrap().read_to_string(&mut rest).await.unwrap();
        assert_eq!(&first, b"he");
        assert_eq!(rest, "llo");
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.bin");

        let mut source = UploadSource::from_path(&path);
        let err = source.open().await.err().unwrap();
        assert_eq!(err.kind(), TransferErrorKind::LocalIo);
        assert!(err.to_string().starts_with(&format!("open {}: ", path.display())));
    }

    #[tokio::test]
    async fn test_reader_wins_over_path() {
        let mut source = UploadSource {
            name: "x".into(),
            path: Some("/does/not/exist".into()),
            reader: Some(Box::new(std::io::Cursor::new(b"from reader".to_vec()))),
        };
        let mut out = String::new();
        source.open().await.unwrap().read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "from reader");
    }

    #[tokio::test]
    async fn test_source_reads_only_once_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.txt");
        std::fs::write(&path, b"contents").unwrap();

        let mut source = UploadSource::from_path(&path);
        let err = source.read(&mut [0u8; 4]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);

        source.open().await.unwrap();
        let mut out = String::new();
        source.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "contents");
    }

    #[test]
    fn test_sources_from_paths() {
        let sources = upload_sources_from_paths(["a/one.csv", "b/two.csv"]);
        let names: Vec<_> = sources.iter().map(|s| s.resolved_name().unwrap()).collect();
        assert_eq!(names, ["one.csv", "two.csv"]);
    }

    #[tokio::test]
    async fn test_destination_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        std::fs::write(&path, b"previous contents that are long").unwrap();

        let mut destination = DownloadDestination::to_path(&path);
        destination.open().await.unwrap().write_all(b"new").await.unwrap();

        // The file is created once; a second open keeps writing through the same handle.
        assert!(destination.writer.is_some());
        let writer = destination.open().await.unwrap();
        writer.write_all(b"er").await.unwrap();
        writer.shutdown().await.unwrap();
        drop(destination);

        assert_eq!(std::fs::read(&path).unwrap(), b"newer");
    }

    #[tokio::test]
    async fn test_empty_destination() {
        let mut destination = DownloadDestination::default();
        let err = destination.open().await.err().unwrap();
        assert!(matches!(err, TransferError::MissingDestination));
        assert_eq!(err.kind(), TransferErrorKind::LocalIo);
    }
}
