//! Incremental writer for streamed documents.
//!
//! [`DocumentSink::create`] truncates the target and writes the document
//! prefix straight away. Markup is then written through the sink's
//! [`AsyncWrite`] impl (typically by piping a render stream into it) and
//! [`DocumentSink::finish`] appends the suffix. A sink that is closed with
//! [`DocumentSink::close_unfinished`] keeps whatever was written so far and
//! never gets the suffix.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::document::{DOCUMENT_PREFIX, DOCUMENT_SUFFIX};
use crate::error::{io_err, WriteError};

/// Totals for everything written through a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSummary {
    pub bytes: u64,
    pub digest: String,
}

/// Streamed document file that hashes everything written to it.
#[derive(Debug)]
pub struct DocumentSink {
    path: PathBuf,
    file: BufWriter<File>,
    hasher: Sha256,
    bytes: u64,
}

impl DocumentSink {
    /// Create (or truncate) `path` and write the document prefix.
    pub async fn create(path: &Path) -> Result<Self, WriteError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }
        let file = File::create(path).await.map_err(|e| io_err(path, e))?;
        let mut sink = Self {
            path: path.to_path_buf(),
            file: BufWriter::new(file),
            hasher: Sha256::new(),
            bytes: 0,
        };
        sink.write_all(DOCUMENT_PREFIX.as_bytes())
            .await
            .map_err(|e| io_err(path, e))?;
        // The prefix is on disk before any rendering starts.
        sink.flush().await.map_err(|e| io_err(path, e))?;
        tracing::debug!("opened: {}", path.display());
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the document suffix and close the file.
    pub async fn finish(mut self) -> Result<SinkSummary, WriteError> {
        self.write_all(DOCUMENT_SUFFIX.as_bytes())
            .await
            .map_err(|e| io_err(&self.path, e))?;
        self.close(true).await
    }

    /// Close the file without the document suffix.
    pub async fn close_unfinished(self) -> Result<SinkSummary, WriteError> {
        self.close(false).await
    }

    async fn close(mut self, complete: bool) -> Result<SinkSummary, WriteError> {
        self.file
            .shutdown()
            .await
            .map_err(|e| io_err(&self.path, e))?;
        if complete {
            tracing::info!("wrote: {}", self.path.display());
        } else {
            tracing::warn!("left unfinished: {}", self.path.display());
        }
        Ok(SinkSummary {
            bytes: self.bytes,
            digest: hex::encode(self.hasher.finalize()),
        })
    }
}

impl AsyncWrite for DocumentSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        match Pin::new(&mut this.file).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                this.hasher.update(&buf[..n]);
                this.bytes += n as u64;
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_shutdown(cx)
    }
}
