//! Newline framing over a byte stream.
//!
//! Turns an `AsyncRead` into a sequence of complete encrypted tokens. The
//! reader owns a growable accumulator: each read appends bytes, then the
//! buffer is scanned for `\n` and the piece before it is emitted trimmed.
//! Empty or whitespace-only tokens (back-to-back delimiters) are skipped.
//! The sequence is tied to one socket's lifetime and is not restartable.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// Splits an incoming byte stream into newline-delimited frame tokens.
///
/// Performs no decryption; every emitted token is an opaque encrypted frame
/// handed upward as-is.
pub struct FrameReader<R> {
    reader: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
        }
    }

    /// The next non-empty token, or `None` at end of stream.
    ///
    /// Only blocks inside the underlying read call. Bytes after the last
    /// delimiter are retained for the next call; a trailing partial line at
    /// end of stream is discarded.
    pub async fn next_frame(&mut self) -> std::io::Result<Option<String>> {
        loop {
            while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let line = self.buf.split_to(pos + 1);
                let token = String::from_utf8_lossy(&line[..pos]).trim().to_string();
                if !token.is_empty() {
                    return Ok(Some(token));
                }
            }

            let n = self.reader.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::ReadBuf;

    /// Delivers the wrapped bytes one byte per read call, to exercise
    /// arbitrary chunking of the underlying stream.
    struct OneByteReader {
        data: Vec<u8>,
        pos: usize,
    }

    impl OneByteReader {
        fn new(data: &[u8]) -> Self {
            Self {
                data: data.to_vec(),
                pos: 0,
            }
        }
    }

    impl AsyncRead for OneByteReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if self.pos < self.data.len() {
                let byte = self.data[self.pos];
                self.pos += 1;
                buf.put_slice(&[byte]);
            }
            Poll::Ready(Ok(()))
        }
    }

    async fn collect_frames<R: AsyncRead + Unpin>(reader: R) -> Vec<String> {
        let mut frames = FrameReader::new(reader);
        let mut out = Vec::new();
        while let Some(token) = frames.next_frame().await.unwrap() {
            out.push(token);
        }
        out
    }

    const STREAM: &[u8] = b"alpha\n\nbeta\n   \ngamma\n";

    #[tokio::test]
    async fn test_all_at_once_delivery() {
        let frames = collect_frames(STREAM).await;
        assert_eq!(frames, vec!["alpha", "beta", "gamma"]);
    }

    #[tokio::test]
    async fn test_one_byte_at_a_time_delivery() {
        // Identical output regardless of how the bytes are chunked.
        let frames = collect_frames(OneByteReader::new(STREAM)).await;
        assert_eq!(frames, vec!["alpha", "beta", "gamma"]);
    }

    #[tokio::test]
    async fn test_crlf_is_trimmed() {
        let frames = collect_frames(&b"first\r\nsecond\r\n"[..]).await;
        assert_eq!(frames, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_trailing_partial_line_discarded() {
        let frames = collect_frames(&b"complete\nincomplete-without-newline"[..]).await;
        assert_eq!(frames, vec!["complete"]);
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let frames = collect_frames(&b""[..]).await;
        assert!(frames.is_empty());
    }

    #[tokio::test]
    async fn test_only_delimiters() {
        let frames = collect_frames(&b"\n\n\n"[..]).await;
        assert!(frames.is_empty());
    }
}
