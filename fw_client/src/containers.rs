use std::path::PathBuf;

use tokio::sync::mpsc;
use transfer_client::{DownloadDestination, TransferCompletion, UploadSource};
use urlencoding::encode;

use crate::client::FwClient;
use crate::errors::Result;

/// Containers that hold files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerKind {
    Project,
    Session,
    Acquisition,
    Collection,
    Analysis,
}

impl ContainerKind {
    /// Collection path segment of this kind in API URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "projects",
            Self::Session => "sessions",
            Self::Acquisition => "acquisitions",
            Self::Collection => "collections",
            Self::Analysis => "analyses",
        }
    }

    pub fn files_url(&self, id: &str) -> String {
        format!("{}/{}/files", self.as_str(), encode(id))
    }

    pub fn file_url(&self, id: &str, file_name: &str) -> String {
        format!("{}/{}/files/{}", self.as_str(), encode(id), encode(file_name))
    }
}

impl FwClient {
    /// Uploads `files` to a container.  The receiver yields upload progress and closes when the body
    /// has been sent.
    pub fn upload_to(
        &self,
        kind: ContainerKind,
        id: &str,
        files: Vec<UploadSource>,
    ) -> (mpsc::Receiver<u64>, TransferCompletion) {
        self.transfers().upload_simple(&kind.files_url(id), None, files)
    }

    pub fn download_from(
        &self,
        kind: ContainerKind,
        id: &str,
        file_name: &str,
        destination: DownloadDestination,
    ) -> (mpsc::Receiver<u64>, TransferCompletion) {
        self.transfers().download_simple(&kind.file_url(id, file_name), destination)
    }

    /// Uploads a single file from disk and waits for the result.
    pub async fn upload_file_to(&self, kind: ContainerKind, id: &str, path: impl Into<PathBuf>) -> Result<()> {
        let (progress, done) = self.upload_to(kind, id, vec![UploadSource::from_path(path)]);
        drain(progress).await;
        Ok(done.await?)
    }

    /// Downloads a single file to disk and waits for the result.
    pub async fn download_file_from(
        &self,
        kind: ContainerKind,
        id: &str,
        file_name: &str,
        path: impl Into<PathBuf>,
    ) -> Result<()> {
        let (progress, done) = self.download_from(kind, id, file_name, DownloadDestination::to_path(path));
        drain(progress).await;
        Ok(done.await?)
    }
}

async fn drain(mut progress: mpsc::Receiver<u64>) {
    while progress.recv().await.is_some() {}
}
