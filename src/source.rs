//! Seekable, sized byte sources the delivery engine can stream spans from.

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project::pin_project;
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

/// [`AsyncSeek`] narrowed to only allow seeking from the start.
///
/// Automatically implemented for any [`AsyncSeek`]; kept as its own trait so
/// sources that can only position forward from zero can still participate.
pub trait SeekStart {
    /// Same semantics as [`AsyncSeek::start_seek`], with the position always
    /// interpreted as `SeekFrom::Start`.
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()>;

    /// Same semantics as [`AsyncSeek::poll_complete`], discarding the new
    /// stream position.
    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>>;
}

impl<T: AsyncSeek> SeekStart for T {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        AsyncSeek::start_seek(self, io::SeekFrom::Start(position))
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncSeek::poll_complete(self, cx).map_ok(|_| ())
    }
}

/// An [`AsyncRead`] + [`SeekStart`] with a fixed, known byte size.
///
/// The size must not change for the lifetime of the object once queried;
/// behaviour is unspecified if it does.
pub trait RangeSource: AsyncRead + SeekStart {
    fn byte_size(&self) -> u64;
}

/// Adapts any [`AsyncRead`] + [`SeekStart`] into a [`RangeSource`] with an
/// externally supplied byte size. [`FileSource::open`] covers the common
/// file-backed case.
#[pin_project]
pub struct FileSource<B> {
    byte_size: u64,
    #[pin]
    body: B,
}

impl FileSource<tokio::fs::File> {
    /// Open the file at `path` and size it via its metadata.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let byte_size = file.metadata().await?.len();
        Ok(FileSource { byte_size, body: file })
    }
}

impl<B: AsyncRead + SeekStart> FileSource<B> {
    /// Wrap a body whose size the caller already knows.
    pub fn sized(body: B, byte_size: u64) -> Self {
        FileSource { byte_size, body }
    }
}

impl<B: AsyncRead + SeekStart> AsyncRead for FileSource<B> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.project().body.poll_read(cx, buf)
    }
}

impl<B: AsyncRead + SeekStart> SeekStart for FileSource<B> {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        self.project().body.start_seek(position)
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.project().body.poll_complete(cx)
    }
}

impl<B: AsyncRead + SeekStart> RangeSource for FileSource<B> {
    fn byte_size(&self) -> u64 {
        self.byte_size
    }
}
