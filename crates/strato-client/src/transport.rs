//! HTTP transport seam.
//!
//! The executor hands a fully signed [`http::Request`] to a [`Transport`] and
//! gets back the status, headers and a streaming [`ResponseBody`].
//! [`ReqwestTransport`] is the default implementation; tests plug in an
//! in-memory service.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::io::{ReaderStream, StreamReader};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A caller-supplied body source.
pub type BoxReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Request body handed to the transport.
pub enum Payload {
    /// No body.
    Empty,
    /// An in-memory body.
    Bytes(Bytes),
    /// A streamed body of known length. Consumed by sending.
    Reader {
        /// The source.
        reader: BoxReader,
        /// Exact number of bytes the source yields.
        length: u64,
    },
}

impl Payload {
    /// Body length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        match self {
            Self::Empty => 0,
            Self::Bytes(bytes) => bytes.len() as u64,
            Self::Reader { length, .. } => *length,
        }
    }

    /// Whether the body is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the whole body into memory.
    pub async fn into_bytes(self) -> io::Result<Bytes> {
        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Bytes(bytes) => Ok(bytes),
            Self::Reader { reader, length } => {
                let capacity = usize::try_from(length).unwrap_or(usize::MAX).min(1 << 24);
                let mut buf = BytesMut::with_capacity(capacity);
                let mut chunks = ReaderStream::new(reader);
                while let Some(chunk) = chunks.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Payload::Empty"),
            Self::Bytes(bytes) => write!(f, "Payload::Bytes({} bytes)", bytes.len()),
            Self::Reader { length, .. } => write!(f, "Payload::Reader({length} bytes)"),
        }
    }
}

/// Streaming response body.
pub struct ResponseBody {
    inner: BoxStream<'static, Result<Bytes, TransportError>>,
}

impl ResponseBody {
    /// An empty body.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            inner: stream::empty().boxed(),
        }
    }

    /// A body from a stream of chunks.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = Result<Bytes, TransportError>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
        }
    }

    /// Collect the whole body.
    pub async fn bytes(self) -> Result<Bytes, TransportError> {
        let chunks: Vec<Bytes> = self.inner.try_collect().await?;
        match chunks.len() {
            0 => Ok(Bytes::new()),
            1 => Ok(chunks.into_iter().next().unwrap_or_default()),
            _ => {
                let mut buf = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
                for chunk in &chunks {
                    buf.extend_from_slice(chunk);
                }
                Ok(buf.freeze())
            }
        }
    }

    /// Read the body lazily.
    #[must_use]
    pub fn into_reader(self) -> ObjectReader {
        let stream = self.inner.map_err(io::Error::other).boxed();
        ObjectReader {
            inner: StreamReader::new(stream),
        }
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            return Self::empty();
        }
        Self {
            inner: stream::once(async move { Ok(bytes) }).boxed(),
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResponseBody")
    }
}

/// Lazily read object content.
///
/// Dropping the reader, after full or partial consumption, releases the
/// underlying connection.
pub struct ObjectReader {
    inner: StreamReader<BoxStream<'static, io::Result<Bytes>>, Bytes>,
}

impl AsyncRead for ObjectReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ObjectReader")
    }
}

/// What went wrong below HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The connection could not be established.
    Connect,
    /// The host name could not be resolved.
    Dns,
    /// The request or response timed out.
    Timeout,
    /// The body could not be sent or received completely.
    Body,
    /// Anything else, e.g. an invalid request.
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Dns => "dns",
            Self::Timeout => "timeout",
            Self::Body => "body",
            Self::Other => "transport",
        })
    }
}

/// A failure before a complete HTTP response was obtained.
#[derive(Debug, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    /// Create an error without an underlying cause.
    #[must_use]
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping an underlying cause.
    pub fn with_source(
        kind: TransportErrorKind,
        source: impl Into<BoxError>,
    ) -> Self {
        let source = source.into();
        Self {
            kind,
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// The failure category.
    #[must_use]
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Whether repeating the request may succeed.
    ///
    /// DNS failures are not retried: an unknown host does not appear on the
    /// next try.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Connect | TransportErrorKind::Timeout | TransportErrorKind::Body
        )
    }

    /// Whether the endpoint could not be reached at all.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Dns | TransportErrorKind::Connect
        )
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            if is_dns_failure(&err) {
                TransportErrorKind::Dns
            } else {
                TransportErrorKind::Connect
            }
        } else if err.is_body() || err.is_decode() || err.is_request() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Other
        };
        Self::with_source(kind, err)
    }
}

fn is_dns_failure(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        let message = e.to_string();
        if message.contains("dns error") || message.contains("failed to lookup address") {
            return true;
        }
        current = e.source();
    }
    false
}

/// Executes signed HTTP requests.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send the request and return the response head with a streaming body.
    ///
    /// Non-2xx statuses are not errors at this level.
    async fn execute(
        &self,
        request: http::Request<Payload>,
    ) -> Result<http::Response<ResponseBody>, TransportError>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::with_source(TransportErrorKind::Other, e))?;
        Ok(Self { client })
    }

    /// Wrap an existing `reqwest` client.
    #[must_use]
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: http::Request<Payload>,
    ) -> Result<http::Response<ResponseBody>, TransportError> {
        let (parts, payload) = request.into_parts();
        let builder = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers);
        let builder = match payload {
            Payload::Empty => builder,
            Payload::Bytes(bytes) => builder.body(bytes),
            Payload::Reader { reader, .. } => {
                builder.body(reqwest::Body::wrap_stream(ReaderStream::new(reader)))
            }
        };

        let response = builder.send().await.map_err(TransportError::from_reqwest)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = ResponseBody::from_stream(
            response
                .bytes_stream()
                .map_err(TransportError::from_reqwest),
        );
        let mut out = http::Response::new(body);
        *out.status_mut() = status;
        *out.headers_mut() = headers;
        Ok(out)
    }
}
