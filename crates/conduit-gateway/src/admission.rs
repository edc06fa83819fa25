//! Admission control.
//!
//! Reads at most `ceiling + 1` bytes of a message body. If the extra probe
//! byte arrives the message is rejected and nothing read so far is kept. The
//! rest of the body is then read and thrown away, up to a drain limit, so the
//! connection can be reused; a body that goes past the drain limit is left
//! unread and the caller should close the connection.
//!
//! The same algorithm runs over any [`ChunkSource`]. [`ReaderSource`] adapts
//! an [`AsyncRead`], [`BodySource`] adapts an HTTP body.

use std::error::Error as StdError;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;
use hyper::body::Body;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Default message ceiling (256 KiB).
pub const DEFAULT_CEILING: usize = 256 * 1024;

/// Default amount of an oversized body read and discarded (1 MiB).
pub const DEFAULT_DRAIN_LIMIT: usize = 1024 * 1024;

const READ_CHUNK: usize = 8 * 1024;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Failure to read the body at all.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The reader failed.
    #[error("failed to read message body: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP body yielded an error.
    #[error("failed to read message body: {0}")]
    Body(BoxError),
}

/// Result of admitting a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The whole body, at most `ceiling` bytes.
    Admitted(Bytes),
    /// The body exceeded the ceiling.
    TooLarge {
        /// Whether the body was read to its end.
        drained: bool,
    },
}

impl Admission {
    /// Returns `true` if the body was admitted.
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }
}

/// Something a body can be pulled from in chunks.
#[async_trait]
pub trait ChunkSource: Send {
    /// Returns the next chunk, or `None` at end of body.
    ///
    /// `max` is a hint; sources that already hold larger chunks may return
    /// more.
    async fn next_chunk(&mut self, max: usize) -> Result<Option<Bytes>, AdmissionError>;
}

/// Adapts an [`AsyncRead`] into a [`ChunkSource`].
#[derive(Debug)]
pub struct ReaderSource<R> {
    reader: R,
    scratch: Box<[u8]>,
}

impl<R> ReaderSource<R> {
    /// Wraps `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            scratch: vec![0; READ_CHUNK].into_boxed_slice(),
        }
    }

    /// Returns the inner reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[async_trait]
impl<R> ChunkSource for ReaderSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_chunk(&mut self, max: usize) -> Result<Option<Bytes>, AdmissionError> {
        let len = max.min(self.scratch.len());
        let n = self.reader.read(&mut self.scratch[..len]).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(Bytes::copy_from_slice(&self.scratch[..n])))
    }
}

/// Adapts an HTTP body into a [`ChunkSource`]. Trailers are ignored.
#[derive(Debug)]
pub struct BodySource<B> {
    body: B,
}

impl<B> BodySource<B> {
    /// Wraps `body`.
    pub const fn new(body: B) -> Self {
        Self { body }
    }
}

#[async_trait]
impl<B> ChunkSource for BodySource<B>
where
    B: Body<Data = Bytes> + Unpin + Send,
    B::Error: Into<BoxError>,
{
    async fn next_chunk(&mut self, _max: usize) -> Result<Option<Bytes>, AdmissionError> {
        loop {
            let Some(frame) = self.body.frame().await else {
                return Ok(None);
            };
            let frame = frame.map_err(|e| AdmissionError::Body(e.into()))?;
            if let Ok(data) = frame.into_data() {
                if !data.is_empty() {
                    return Ok(Some(data));
                }
            }
        }
    }
}

/// Bounds how much of a body is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionController {
    ceiling: usize,
    drain_limit: usize,
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(DEFAULT_CEILING)
    }
}

impl AdmissionController {
    /// Creates a controller admitting bodies of at most `ceiling` bytes.
    #[must_use]
    pub const fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            drain_limit: DEFAULT_DRAIN_LIMIT,
        }
    }

    /// Sets how much of an oversized body is discarded before giving up.
    #[must_use]
    pub const fn with_drain_limit(mut self, drain_limit: usize) -> Self {
        self.drain_limit = drain_limit;
        self
    }

    /// The admission ceiling in bytes.
    #[must_use]
    pub const fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// The drain limit in bytes.
    #[must_use]
    pub const fn drain_limit(&self) -> usize {
        self.drain_limit
    }

    /// Admits a body from `source`.
    ///
    /// Never holds more than `ceiling + 1` body bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails before the outcome is known.
    pub async fn admit<S>(&self, source: &mut S) -> Result<Admission, AdmissionError>
    where
        S: ChunkSource + ?Sized,
    {
        let limit = self.ceiling.saturating_add(1);
        let mut payload = BytesMut::new();

        while payload.len() < limit {
            let remaining = limit - payload.len();
            let Some(chunk) = source.next_chunk(remaining).await? else {
                return Ok(Admission::Admitted(payload.freeze()));
            };
            payload.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
        }

        drop(payload);
        let drained = self.discard(source).await?;
        tracing::debug!(ceiling = self.ceiling, drained, "body exceeded ceiling");
        Ok(Admission::TooLarge { drained })
    }

    /// Reads and drops up to the drain limit.
    ///
    /// Returns `true` if the end of the body was reached.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails.
    pub async fn discard<S>(&self, source: &mut S) -> Result<bool, AdmissionError>
    where
        S: ChunkSource + ?Sized,
    {
        let budget = self.drain_limit.saturating_add(1);
        let mut discarded = 0usize;
        while discarded < budget {
            match source.next_chunk(budget - discarded).await? {
                None => return Ok(true),
                Some(chunk) => discarded = discarded.saturating_add(chunk.len()),
            }
        }
        Ok(false)
    }

    /// Admits a body from an [`AsyncRead`].
    ///
    /// # Errors
    ///
    /// Returns an error if the reader fails.
    pub async fn admit_reader<R>(&self, reader: R) -> Result<Admission, AdmissionError>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.admit(&mut ReaderSource::new(reader)).await
    }

    /// Admits an HTTP body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body yields an error.
    pub async fn admit_body<B>(&self, body: B) -> Result<Admission, AdmissionError>
    where
        B: Body<Data = Bytes> + Unpin + Send,
        B::Error: Into<BoxError>,
    {
        self.admit(&mut BodySource::new(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use http_body_util::{Full, StreamBody};
    use hyper::body::Frame;
    use proptest::prelude::*;
    use std::convert::Infallible;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_body_at_ceiling_is_admitted() {
        let controller = AdmissionController::new(10);
        let body = b"0123456789".as_slice();

        let admission = controller.admit_reader(body).await.unwrap();
        assert_eq!(admission, Admission::Admitted(Bytes::from_static(b"0123456789")));
    }

    #[tokio::test]
    async fn test_one_byte_over_is_rejected() {
        let controller = AdmissionController::new(10);
        let body = b"0123456789X".as_slice();

        let admission = controller.admit_reader(body).await.unwrap();
        assert_eq!(admission, Admission::TooLarge { drained: true });
    }

    #[tokio::test]
    async fn test_empty_body() {
        let controller = AdmissionController::new(10);
        let admission = controller.admit_reader(b"".as_slice()).await.unwrap();
        assert_eq!(admission, Admission::Admitted(Bytes::new()));
    }

    #[tokio::test]
    async fn test_split_reads_are_reassembled() {
        let mock = tokio_test::io::Builder::new()
            .read(b"hello ")
            .read(b"wor")
            .read(b"ld")
            .build();

        let admission = AdmissionController::new(64).admit_reader(mock).await.unwrap();
        assert_eq!(admission, Admission::Admitted(Bytes::from_static(b"hello world")));
    }

    #[tokio::test]
    async fn test_oversized_body_is_fully_drained() {
        let mock = tokio_test::io::Builder::new()
            .read(b"abcdef")
            .read(b"ghijkl")
            .read(b"mnopqr")
            .build();

        // The mock panics on drop if any scripted read was left unconsumed.
        let admission = AdmissionController::new(4).admit_reader(mock).await.unwrap();
        assert_eq!(admission, Admission::TooLarge { drained: true });
    }

    #[tokio::test]
    async fn test_body_past_drain_limit_is_not_drained() {
        let controller = AdmissionController::new(4).with_drain_limit(8);
        let body = vec![b'x'; 64];

        let mut source = ReaderSource::new(body.as_slice());
        let admission = controller.admit(&mut source).await.unwrap();
        assert_eq!(admission, Admission::TooLarge { drained: false });
    }

    #[tokio::test]
    async fn test_read_error_propagates() {
        let mock = tokio_test::io::Builder::new()
            .read(b"abc")
            .read_error(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let err = AdmissionController::new(64).admit_reader(mock).await.unwrap_err();
        assert!(matches!(err, AdmissionError::Io(_)));
    }

    #[tokio::test]
    async fn test_http_body_single_frame() {
        let body = Full::new(Bytes::from_static(br#"{"ok":true}"#));
        let admission = AdmissionController::new(64).admit_body(body).await.unwrap();
        assert_eq!(admission, Admission::Admitted(Bytes::from_static(br#"{"ok":true}"#)));
    }

    #[tokio::test]
    async fn test_http_body_oversized_frame_is_truncated_then_rejected() {
        let frames = vec![
            Ok::<_, Infallible>(Frame::data(Bytes::from_static(b"abc"))),
            Ok(Frame::data(Bytes::from(vec![b'z'; 100]))),
            Ok(Frame::data(Bytes::from_static(b"tail"))),
        ];
        let body = StreamBody::new(stream::iter(frames));

        let admission = AdmissionController::new(10).admit_body(body).await.unwrap();
        assert_eq!(admission, Admission::TooLarge { drained: true });
    }

    #[tokio::test]
    async fn test_http_body_error() {
        let frames = vec![
            Ok(Frame::data(Bytes::from_static(b"abc"))),
            Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "closed")),
        ];
        let body = StreamBody::new(stream::iter(frames));

        let err = AdmissionController::new(10).admit_body(body).await.unwrap_err();
        assert!(matches!(err, AdmissionError::Body(_)));
    }

    #[tokio::test]
    async fn test_discard_reports_end_of_body() {
        let controller = AdmissionController::new(4).with_drain_limit(16);
        let exact = vec![0u8; 16];
        let mut source = ReaderSource::new(exact.as_slice());
        assert!(controller.discard(&mut source).await.unwrap());

        let over = vec![0u8; 17];
        let mut source = ReaderSource::new(over.as_slice());
        assert!(!controller.discard(&mut source).await.unwrap());
    }

    proptest! {
        #[test]
        fn prop_admission_respects_ceiling(
            body in proptest::collection::vec(any::<u8>(), 0..600),
            ceiling in 0usize..512,
        ) {
            let controller = AdmissionController::new(ceiling);
            let admission = runtime().block_on(controller.admit_reader(body.as_slice())).unwrap();

            if body.len() <= ceiling {
                prop_assert_eq!(admission, Admission::Admitted(Bytes::from(body)));
            } else {
                prop_assert_eq!(admission, Admission::TooLarge { drained: true });
            }
        }
    }
}
