//! Abstract request descriptors and URL construction.

use std::fmt;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use strato_auth::canonical::{encode_path, encode_query};
use strato_auth::sigv2::resource_path;
use strato_model::region::{BucketAddressing, Region};

use crate::error::Error;
use crate::transport::{BoxReader, Payload};

/// Request body of an [`Operation`].
pub(crate) enum Body {
    Empty,
    Bytes(Bytes),
    /// Sent at most once; `None` after the first attempt took it.
    Stream {
        reader: Option<BoxReader>,
        length: u64,
    },
}

impl Body {
    /// The payload for the next attempt, or `None` when a streamed body was
    /// already sent.
    pub(crate) fn next_payload(&mut self) -> Option<Payload> {
        match self {
            Self::Empty => Some(Payload::Empty),
            Self::Bytes(bytes) => Some(Payload::Bytes(bytes.clone())),
            Self::Stream { reader, length } => reader.take().map(|reader| Payload::Reader {
                reader,
                length: *length,
            }),
        }
    }

    pub(crate) fn is_stream(&self) -> bool {
        matches!(self, Self::Stream { .. })
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Bytes(bytes) => write!(f, "Bytes({})", bytes.len()),
            Self::Stream { length, reader } => {
                write!(f, "Stream({length}, sent: {})", reader.is_none())
            }
        }
    }
}

/// One logical service call: verb, target, parameters, headers and body.
#[derive(Debug)]
pub(crate) struct Operation {
    pub(crate) method: Method,
    pub(crate) bucket: String,
    pub(crate) key: Option<String>,
    pub(crate) params: Vec<(String, String)>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Body,
    /// Success status other than any 2xx, if the call has one.
    pub(crate) expect: Option<StatusCode>,
}

impl Operation {
    pub(crate) fn new(method: Method, bucket: impl Into<String>) -> Self {
        Self {
            method,
            bucket: bucket.into(),
            key: None,
            params: Vec::new(),
            headers: HeaderMap::new(),
            body: Body::Empty,
            expect: None,
        }
    }

    pub(crate) fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub(crate) fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub(crate) fn header(mut self, name: &str, value: &str) -> Result<Self, Error> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::validation(format!("invalid header name {name:?}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| Error::validation(format!("invalid value for header {name}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub(crate) fn bytes(mut self, data: Bytes) -> Self {
        self.body = Body::Bytes(data);
        self
    }

    pub(crate) fn stream(mut self, reader: BoxReader, length: u64) -> Self {
        self.body = Body::Stream {
            reader: Some(reader),
            length,
        };
        self
    }

    pub(crate) fn expect(mut self, status: StatusCode) -> Self {
        self.expect = Some(status);
        self
    }

    /// Whether a 404 refers to the key rather than the bucket.
    pub(crate) fn key_addressed(&self) -> bool {
        self.key.is_some()
    }

    /// Absolute request URI for this operation in `region`.
    pub(crate) fn uri(&self, region: &Region) -> Result<http::Uri, Error> {
        let url = build_url(region, &self.bucket, self.key.as_deref(), &self.params);
        url.parse()
            .map_err(|e| Error::validation(format!("invalid request URL {url}: {e}")))
    }

    /// `/bucket/key` resource used by SigV2.
    pub(crate) fn resource(&self, region: &Region) -> String {
        resource_path(&region.bucket_name(&self.bucket), self.key.as_deref())
    }
}

/// Build the request URL for a bucket and optional key.
///
/// Path-style: `{endpoint}/{bucket}/{key}`; domain-style:
/// `{bucket endpoint}/{key}`. Bucket-level paths end in `/`.
pub(crate) fn build_url<K, V>(
    region: &Region,
    bucket: &str,
    key: Option<&str>,
    params: &[(K, V)],
) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let bucket = region.bucket_name(bucket);
    let key_path = key.map(|k| format!("/{k}")).unwrap_or_else(|| "/".to_owned());
    let (base, path) = match region.addressing(&bucket) {
        BucketAddressing::Path(endpoint) => (endpoint, format!("/{bucket}{key_path}")),
        BucketAddressing::Domain(endpoint) => (endpoint, key_path),
    };
    let mut url = format!("{base}{}", encode_path(&path));
    if !params.is_empty() {
        url.push('?');
        url.push_str(&encode_query(params));
    }
    url
}
