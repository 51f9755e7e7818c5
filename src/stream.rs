use std::{io, mem};
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use http_body::{Body, Frame, SizeHint};
use pin_project::pin_project;
use tokio::io::ReadBuf;

use crate::source::RangeSource;

const IO_BUFFER_SIZE: usize = 64 * 1024;

/// Response body streaming one byte span out of a [`RangeSource`]: the
/// whole resource for a full response, or exactly the requested range for a
/// partial one. Implements [`Stream`], [`Body`], and [`IntoResponse`].
#[pin_project]
pub struct SpanStream<B> {
    state: SpanState,
    length: u64,
    #[pin]
    source: B,
}

impl<B: RangeSource + Send + 'static> SpanStream<B> {
    /// Stream `length` bytes of `source` starting at `start`.
    pub fn new(source: B, start: u64, length: u64) -> Self {
        SpanStream {
            state: SpanState::Seek { start },
            length,
            source,
        }
    }

    /// Stream the entire source.
    pub fn full(source: B) -> Self {
        let length = source.byte_size();
        Self::new(source, 0, length)
    }
}

#[derive(Debug)]
enum SpanState {
    Seek { start: u64 },
    Seeking { remaining: u64 },
    Reading { buffer: BytesMut, remaining: u64 },
}

impl<B: RangeSource + Send + 'static> IntoResponse for SpanStream<B> {
    fn into_response(self) -> Response {
        Response::new(axum::body::Body::new(self))
    }
}

impl<B: RangeSource> Body for SpanStream<B> {
    type Data = Bytes;
    type Error = io::Error;

    fn size_hint(&self) -> SizeHint {
        // exact: this is where Content-Length on 200 and 206 comes from
        SizeHint::with_exact(self.length)
    }

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<io::Result<Frame<Bytes>>>> {
        self.poll_next(cx).map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl<B: RangeSource> Stream for SpanStream<B> {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<io::Result<Bytes>>> {
        let mut this = self.project();

        if let SpanState::Seek { start } = *this.state {
            match this.source.as_mut().start_seek(start) {
                Err(e) => return Poll::Ready(Some(Err(e))),
                Ok(()) => {
                    let remaining = *this.length;
                    *this.state = SpanState::Seeking { remaining };
                }
            }
        }

        if let SpanState::Seeking { remaining } = *this.state {
            match this.source.as_mut().poll_complete(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(Ok(())) => {
                    let buffer = BytesMut::with_capacity(IO_BUFFER_SIZE);
                    *this.state = SpanState::Reading { buffer, remaining };
                }
            }
        }

        if let SpanState::Reading { buffer, remaining } = this.state {
            let uninit = buffer.spare_capacity_mut();

            // read at most the smaller of the buffer size and the bytes
            // remaining in the span
            let nbytes = std::cmp::min(
                uninit.len(),
                usize::try_from(*remaining).unwrap_or(usize::MAX),
            );

            let mut read_buf = ReadBuf::uninit(&mut uninit[0..nbytes]);

            match this.source.as_mut().poll_read(cx, &mut read_buf) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(Ok(())) => {
                    match read_buf.filled().len() {
                        0 => return Poll::Ready(None),
                        n => {
                            // SAFETY: poll_read has filled the buffer with `n`
                            // additional bytes. `buffer.len` should always be
                            // 0 here, but include it for rigorous correctness
                            unsafe { buffer.set_len(buffer.len() + n); }

                            // replace state buffer and take this one to return
                            let chunk = mem::replace(buffer, BytesMut::with_capacity(IO_BUFFER_SIZE));

                            // n cannot exceed remaining due to the cmp::min
                            // above, so this never underflows
                            *remaining -= u64::try_from(n).unwrap();

                            return Poll::Ready(Some(Ok(chunk.freeze())));
                        }
                    }
                }
            }
        }

        unreachable!();
    }
}
