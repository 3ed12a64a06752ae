//! Chunked file transfer.
//!
//! Three request/response primitives and the composite transfers built on
//! them. Chunk loops are strictly sequential: each chunk is acknowledged
//! before the next is requested.
//!
//! # Example
//!
//! ```no_run
//! # async fn example(client: &agent_link::AgentClient) -> agent_link::Result<()> {
//! let fs = client.fs();
//!
//! let file = fs
//!     .download_file("/etc/hostname", |percent| println!("{percent:.0}%"))
//!     .await?;
//! println!("{} is {} bytes", file.file_name(), file.len());
//!
//! fs.upload_file("/tmp/hello.txt", b"hello", |_| {}).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::identifiers::RequestKey;
use crate::protocol::{Chunk, FileInfo, SendFrame};
use crate::transport::{Connection, FrameHandler};

use super::pending::{FileReply, PendingRequests};

// ============================================================================
// Constants
// ============================================================================

/// Default chunk size for reads and writes (40 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 40960;

/// Default deadline for a single file request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Cap on the buffer reserved up front from an advertised size.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

// ============================================================================
// DownloadedFile
// ============================================================================

/// A fully downloaded remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// Metadata reported before the transfer.
    pub info: FileInfo,
    /// File contents.
    pub data: Vec<u8>,
}

impl DownloadedFile {
    /// Returns the last path segment, or `"download"`.
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.info.file_name()
    }

    /// Returns the remote modification time.
    #[inline]
    #[must_use]
    pub fn modified(&self) -> Option<SystemTime> {
        self.info.modified()
    }

    /// Returns the number of bytes received.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if no bytes were received.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the contents.
    #[inline]
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

// ============================================================================
// FileTransfer
// ============================================================================

/// Internal shared state for file transfers.
struct FileTransferInner {
    connection: Connection,
    pending: Arc<PendingRequests>,
    request_timeout: Option<Duration>,
    chunk_size: usize,
}

/// File operations on the remote agent.
///
/// Cheap to clone; clones share one pending table.
#[derive(Clone)]
pub struct FileTransfer {
    inner: Arc<FileTransferInner>,
}

impl fmt::Debug for FileTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileTransfer")
            .field("chunk_size", &self.inner.chunk_size)
            .field("request_timeout", &self.inner.request_timeout)
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl FileTransfer {
    /// Creates the service and registers its reply handler on `connection`.
    pub(crate) fn new(
        connection: Connection,
        request_timeout: Option<Duration>,
        chunk_size: usize,
    ) -> Self {
        let pending = Arc::new(PendingRequests::new());
        let handler: Arc<dyn FrameHandler> = pending.clone();
        connection.add_shared_handler(handler);

        Self {
            inner: Arc::new(FileTransferInner {
                connection,
                pending,
                request_timeout,
                chunk_size,
            }),
        }
    }

    /// Returns the number of requests awaiting a reply.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Returns the chunk size used for transfers.
    #[inline]
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.inner.chunk_size
    }

    /// Returns the default request deadline.
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.inner.request_timeout
    }
}

// ============================================================================
// FileTransfer - Primitives
// ============================================================================

impl FileTransfer {
    /// Queries size, mode and modification time of a remote file.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the socket is not open
    /// - [`Error::RequestTimeout`] if the agent does not answer in time
    /// - [`Error::ConnectionClosed`] if the socket closes first
    pub async fn get_file_info(&self, path: &str) -> Result<FileInfo> {
        self.file_info(path, self.inner.request_timeout).await
    }

    /// Same as [`FileTransfer::get_file_info`] with an explicit deadline.
    pub async fn get_file_info_with_timeout(
        &self,
        path: &str,
        request_timeout: Duration,
    ) -> Result<FileInfo> {
        self.file_info(path, Some(request_timeout)).await
    }

    /// Reads up to one chunk at `offset`.
    ///
    /// A zero-length chunk means end of file.
    ///
    /// # Errors
    ///
    /// Same as [`FileTransfer::get_file_info`].
    pub async fn download_file_chunk(&self, path: &str, offset: u64) -> Result<Chunk> {
        self.read_chunk(path, offset, self.inner.request_timeout).await
    }

    /// Same as [`FileTransfer::download_file_chunk`] with an explicit deadline.
    pub async fn download_file_chunk_with_timeout(
        &self,
        path: &str,
        offset: u64,
        request_timeout: Duration,
    ) -> Result<Chunk> {
        self.read_chunk(path, offset, Some(request_timeout)).await
    }

    /// Writes `data` at `offset`.
    ///
    /// Empty `data` truncates the file to `offset`.
    ///
    /// # Errors
    ///
    /// Same as [`FileTransfer::get_file_info`].
    pub async fn upload_file_chunk(&self, path: &str, offset: u64, data: &[u8]) -> Result<()> {
        self.write_chunk(path, offset, data, self.inner.request_timeout).await
    }

    /// Same as [`FileTransfer::upload_file_chunk`] with an explicit deadline.
    pub async fn upload_file_chunk_with_timeout(
        &self,
        path: &str,
        offset: u64,
        data: &[u8],
        request_timeout: Duration,
    ) -> Result<()> {
        self.write_chunk(path, offset, data, Some(request_timeout))
            .await
    }
}

// ============================================================================
// FileTransfer - Composites
// ============================================================================

impl FileTransfer {
    /// Downloads a whole file, reporting progress in percent.
    ///
    /// Stops at the advertised size, or earlier on a zero-length chunk.
    ///
    /// # Errors
    ///
    /// Propagates the first failing request.
    pub async fn download_file<F>(&self, path: &str, mut on_progress: F) -> Result<DownloadedFile>
    where
        F: FnMut(f64),
    {
        let info = self.get_file_info(path).await?;
        let size = info.size;
        debug!(path, size, "Downloading file");

        let mut data = Vec::with_capacity(size.min(MAX_PREALLOC) as usize);
        let mut offset = 0u64;

        while offset < size {
            let chunk = self.download_file_chunk(path, offset).await?;
            if chunk.is_empty() {
                debug!(path, offset, size, "File ended before advertised size");
                break;
            }

            offset += chunk.len() as u64;
            data.extend_from_slice(&chunk.data);
            on_progress(percent(offset, size));
        }

        info!(path, bytes = data.len(), "Download complete");
        Ok(DownloadedFile { info, data })
    }

    /// Uploads `data` as the whole content of `path`.
    ///
    /// Truncates the remote file to `data.len()` first, then writes chunks
    /// from offset 0 upward.
    ///
    /// # Errors
    ///
    /// Propagates the first failing request.
    pub async fn upload_file<F>(&self, path: &str, data: &[u8], mut on_progress: F) -> Result<()>
    where
        F: FnMut(f64),
    {
        let total = data.len() as u64;
        debug!(path, size = total, "Uploading file");

        self.upload_file_chunk(path, total, &[]).await?;

        let mut offset = 0u64;
        for slice in data.chunks(self.inner.chunk_size) {
            self.upload_file_chunk(path, offset, slice).await?;
            offset += slice.len() as u64;
            on_progress(percent(offset, total));
        }

        info!(path, bytes = total, "Upload complete");
        Ok(())
    }

    /// Downloads `path` and writes it to the local file `local`.
    ///
    /// # Errors
    ///
    /// Propagates transfer failures and [`Error::Io`] from the local write.
    pub async fn download_to<F>(
        &self,
        path: &str,
        local: impl AsRef<Path>,
        on_progress: F,
    ) -> Result<FileInfo>
    where
        F: FnMut(f64),
    {
        let file = self.download_file(path, on_progress).await?;
        tokio::fs::write(local.as_ref(), &file.data).await?;
        Ok(file.info)
    }

    /// Uploads the local file `local` to `path`, returning its size.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::Io`] from the local read and transfer failures.
    pub async fn upload_from<F>(
        &self,
        local: impl AsRef<Path>,
        path: &str,
        on_progress: F,
    ) -> Result<u64>
    where
        F: FnMut(f64),
    {
        let data = tokio::fs::read(local.as_ref()).await?;
        self.upload_file(path, &data, on_progress).await?;
        Ok(data.len() as u64)
    }
}

// ============================================================================
// FileTransfer - Internal
// ============================================================================

impl FileTransfer {
    async fn file_info(&self, path: &str, deadline: Option<Duration>) -> Result<FileInfo> {
        let key = RequestKey::file_info(path);
        let frame = SendFrame::FileQueryInfo { path: path.into() };

        self.request(key, &frame, deadline).await
    }

    async fn read_chunk(&self, path: &str, offset: u64, deadline: Option<Duration>) -> Result<Chunk> {
        let key = RequestKey::read_chunk(path, offset);
        let frame = SendFrame::FileRead {
            path: path.into(),
            offset: i64::try_from(offset)
                .map_err(|_| Error::protocol(format!("offset {offset} out of range")))?,
            max_length: self.inner.chunk_size as u64,
        };

        self.request(key, &frame, deadline).await
    }

    async fn write_chunk(
        &self,
        path: &str,
        offset: u64,
        data: &[u8],
        deadline: Option<Duration>,
    ) -> Result<()> {
        let key = RequestKey::write_chunk(path, offset);
        let frame = SendFrame::FileWriteOrTruncate {
            path: path.into(),
            chunk: Chunk::new(offset, data.to_vec()),
        };

        self.request(key, &frame, deadline).await
    }

    async fn request<R: FileReply>(
        &self,
        key: RequestKey,
        frame: &SendFrame,
        deadline: Option<Duration>,
    ) -> Result<R> {
        self.inner
            .pending
            .request(&self.inner.connection, key, frame, deadline)
            .await
    }
}

/// Progress in percent; an empty total counts as complete.
fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        done as f64 / total as f64 * 100.0
    }
}

// ============================================================================
// Tests
// ============================================================================
