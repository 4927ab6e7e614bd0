//! Bucket and object operations.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, HeaderMap, HeaderName, LAST_MODIFIED};
use http::Method;
use strato_auth::sigv4::SigningParams;
use strato_auth::{presign_url, presign_url_v2};
use strato_model::error::ErrorCode;
use strato_model::types::{CannedAcl, CreateBucketConfiguration, ObjectMeta};
use strato_xml::to_xml;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use crate::attempt::AttemptStrategy;
use crate::checksum::content_md5;
use crate::client::S3;
use crate::config::SigningVersion;
use crate::error::Error;
use crate::request::{Operation, build_url};
use crate::transport::ObjectReader;

const META_PREFIX: &str = "x-amz-meta-";

/// Optional headers of a single-request object upload.
///
/// # Examples
///
/// ```
/// use strato_client::PutOptions;
///
/// let options = PutOptions::builder()
///     .cache_control("max-age=60")
///     .metadata([("origin".to_owned(), "import".to_owned())].into())
///     .build();
/// assert_eq!(options.cache_control.as_deref(), Some("max-age=60"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, TypedBuilder)]
pub struct PutOptions {
    /// Base64 MD5 sent instead of the computed one.
    #[builder(default, setter(strip_option, into))]
    pub content_md5: Option<String>,
    /// User metadata, sent as `x-amz-meta-*`.
    #[builder(default)]
    pub metadata: BTreeMap<String, String>,
    /// `Cache-Control` header.
    #[builder(default, setter(strip_option, into))]
    pub cache_control: Option<String>,
    /// `Content-Disposition` header.
    #[builder(default, setter(strip_option, into))]
    pub content_disposition: Option<String>,
    /// `Content-Encoding` header.
    #[builder(default, setter(strip_option, into))]
    pub content_encoding: Option<String>,
    /// `x-amz-storage-class` header.
    #[builder(default, setter(strip_option, into))]
    pub storage_class: Option<String>,
}

/// Outcome of [`Bucket::probe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reachability {
    /// The bucket exists and is accessible.
    Present,
    /// The endpoint answered that the bucket does not exist.
    Missing,
    /// The endpoint could not be reached.
    Unreachable,
}

/// A named bucket of an [`S3`] client.
///
/// Holds no server-side state; every method is one or more requests.
#[derive(Debug, Clone)]
pub struct Bucket {
    pub(crate) s3: S3,
    pub(crate) name: String,
}

impl Bucket {
    pub(crate) fn new(s3: S3, name: String) -> Self {
        Self { s3, name }
    }

    /// The bucket name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The client this bucket belongs to.
    #[must_use]
    pub fn client(&self) -> &S3 {
        &self.s3
    }

    pub(crate) fn op(&self, method: Method) -> Operation {
        Operation::new(method, self.name.clone())
    }

    pub(crate) fn object_op(&self, method: Method, key: &str) -> Result<Operation, Error> {
        if key.is_empty() {
            return Err(Error::validation("object key must not be empty"));
        }
        Ok(self.op(method).key(key))
    }

    /// Create the bucket.
    ///
    /// Sends a `LocationConstraint` when the region requires one. Creating a
    /// bucket the caller already owns fails with `BucketAlreadyOwnedByYou`.
    pub async fn put_bucket(&self, acl: CannedAcl) -> Result<(), Error> {
        let region = self.s3.region();
        let mut op = self.op(Method::PUT).header("x-amz-acl", acl.as_str())?;
        if region.location_constraint {
            let config = CreateBucketConfiguration {
                location_constraint: region.name.to_string(),
            };
            op = op.bytes(to_xml("CreateBucketConfiguration", &config)?.into());
        }
        self.s3.execute(op).await?;
        info!(bucket = %self.name, acl = %acl, "created bucket");
        Ok(())
    }

    /// Delete the bucket. It must be empty.
    pub async fn del_bucket(&self) -> Result<(), Error> {
        self.s3.execute(self.op(Method::DELETE)).await?;
        info!(bucket = %self.name, "deleted bucket");
        Ok(())
    }

    /// Store `data` under `key` in a single request.
    pub async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        acl: CannedAcl,
        options: PutOptions,
    ) -> Result<(), Error> {
        let md5 = match &options.content_md5 {
            Some(md5) => md5.clone(),
            None => content_md5(&data),
        };
        let length = data.len();
        let op = self
            .object_op(Method::PUT, key)?
            .header("content-md5", &md5)?;
        let op = put_headers(op, content_type, acl, &options)?.bytes(data);
        self.s3.execute(op).await?;
        debug!(bucket = %self.name, key = %key, size = length, "put object");
        Ok(())
    }

    /// Store `length` bytes read from `reader` under `key`.
    ///
    /// The source is sent at most once; a failed attempt is not retried.
    pub async fn put_reader<R>(
        &self,
        key: &str,
        reader: R,
        length: u64,
        content_type: &str,
        acl: CannedAcl,
        options: PutOptions,
    ) -> Result<(), Error>
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        let mut op = self.object_op(Method::PUT, key)?;
        if let Some(md5) = &options.content_md5 {
            op = op.header("content-md5", md5)?;
        }
        let op = put_headers(op, content_type, acl, &options)?.stream(Box::new(reader), length);
        self.s3.execute(op).await?;
        debug!(bucket = %self.name, key = %key, size = length, "put object from reader");
        Ok(())
    }

    /// Fetch the whole object.
    pub async fn get(&self, key: &str) -> Result<Bytes, Error> {
        self.s3.execute_bytes(self.object_op(Method::GET, key)?).await
    }

    /// Open the object for lazy reading.
    ///
    /// Dropping the reader releases the connection.
    pub async fn get_reader(&self, key: &str) -> Result<ObjectReader, Error> {
        let response = self.s3.execute(self.object_op(Method::GET, key)?).await?;
        Ok(response.into_body().into_reader())
    }

    /// Fetch object metadata without the content.
    pub async fn head(&self, key: &str) -> Result<ObjectMeta, Error> {
        let response = self.s3.execute(self.object_op(Method::HEAD, key)?).await?;
        Ok(object_meta(response.headers()))
    }

    /// Delete the object. Deleting an absent key succeeds.
    pub async fn del(&self, key: &str) -> Result<(), Error> {
        match self.s3.execute(self.object_op(Method::DELETE, key)?).await {
            Ok(_) => Ok(()),
            Err(err) if err.has_code(&ErrorCode::NoSuchKey) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Unsigned URL of the object; usable for public-read objects.
    #[must_use]
    pub fn url(&self, key: &str) -> String {
        build_url(self.s3.region(), &self.name, Some(key), &[] as &[(&str, &str)])
    }

    /// Pre-signed GET URL of the object, valid until `expires`.
    ///
    /// An `expires` in the past yields a URL that the service rejects.
    pub fn signed_url(&self, key: &str, expires: DateTime<Utc>) -> Result<String, Error> {
        self.signed_url_at(key, expires, Utc::now())
    }

    pub(crate) fn signed_url_at(
        &self,
        key: &str,
        expires: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<String, Error> {
        let inner = &self.s3.inner;
        let op = self.object_op(Method::GET, key)?;
        let uri = op.uri(&inner.region)?;
        let url = match inner.config.signing_version {
            SigningVersion::V4 => {
                let (time, expires_in) = if expires > now {
                    let remaining = (expires - now).num_seconds();
                    (now, u64::try_from(remaining).unwrap_or(0).max(1))
                } else {
                    (expires - TimeDelta::seconds(1), 1)
                };
                let params = SigningParams {
                    credentials: &inner.credentials,
                    region: &inner.region.name,
                    time,
                };
                presign_url(&Method::GET, &uri, &params, expires_in)?
            }
            SigningVersion::V2 => presign_url_v2(
                &Method::GET,
                &uri,
                &op.resource(&inner.region),
                &inner.credentials,
                expires,
            )?,
        };
        Ok(url)
    }

    /// Whether the bucket exists.
    pub async fn exists(&self) -> Result<bool, Error> {
        match self.s3.execute(self.op(Method::HEAD)).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Check the bucket, treating an unreachable endpoint as an answer.
    pub async fn probe(&self) -> Result<Reachability, Error> {
        match self.s3.execute(self.op(Method::HEAD)).await {
            Ok(_) => Ok(Reachability::Present),
            Err(err) if err.is_not_found() => Ok(Reachability::Missing),
            Err(err) if err.is_unreachable() => {
                debug!(bucket = %self.name, error = %err, "bucket endpoint unreachable");
                Ok(Reachability::Unreachable)
            }
            Err(err) => Err(err),
        }
    }

    /// Delete the bucket along with its objects and pending uploads.
    ///
    /// Repeats under `strategy` while the bucket is reported non-empty.
    /// A missing bucket or an unreachable endpoint counts as done.
    pub async fn teardown(&self, strategy: &AttemptStrategy) -> Result<(), Error> {
        let mut attempt = strategy.start();
        let mut last_error = None;
        while self.s3.next_attempt(&mut attempt).await? {
            match self.del_bucket().await {
                Ok(()) => return Ok(()),
                Err(err) if err.has_code(&ErrorCode::NoSuchBucket) || err.is_unreachable() => {
                    debug!(bucket = %self.name, error = %err, "nothing to tear down");
                    return Ok(());
                }
                Err(err) if err.has_code(&ErrorCode::BucketNotEmpty) => {
                    if let Err(empty_err) = self.empty().await {
                        warn!(bucket = %self.name, error = %empty_err, "emptying bucket failed");
                        last_error = Some(empty_err);
                    } else {
                        last_error = Some(err);
                    }
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(err) => return Err(self.teardown_error(err)),
            }
        }
        let err = last_error
            .unwrap_or_else(|| Error::validation("attempt strategy permits no attempts"));
        Err(self.teardown_error(err))
    }

    async fn empty(&self) -> Result<(), Error> {
        let page = self.s3.config().list_max_keys.min(1000);
        let mut marker = String::new();
        loop {
            let listing = self.list("", "", &marker, page).await?;
            for entry in &listing.contents {
                self.del(&entry.key).await?;
            }
            match listing.continuation_marker() {
                Some(next) => marker = next,
                None => break,
            }
        }

        let (uploads, _) = self.list_multi("", "").await?;
        for multi in uploads {
            match multi.abort().await {
                Err(err) if !err.has_code(&ErrorCode::NoSuchUpload) => return Err(err),
                _ => {}
            }
        }
        Ok(())
    }

    fn teardown_error(&self, source: Error) -> Error {
        Error::Teardown {
            bucket: self.name.clone(),
            source: Box::new(source),
        }
    }
}

fn put_headers(
    mut op: Operation,
    content_type: &str,
    acl: CannedAcl,
    options: &PutOptions,
) -> Result<Operation, Error> {
    op = op
        .header("content-type", content_type)?
        .header("x-amz-acl", acl.as_str())?;
    let optional = [
        ("cache-control", &options.cache_control),
        ("content-disposition", &options.content_disposition),
        ("content-encoding", &options.content_encoding),
        ("x-amz-storage-class", &options.storage_class),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            op = op.header(name, value)?;
        }
    }
    for (name, value) in &options.metadata {
        op = op.header(&format!("{META_PREFIX}{}", name.to_ascii_lowercase()), value)?;
    }
    Ok(op)
}

fn object_meta(headers: &HeaderMap) -> ObjectMeta {
    let text = |name: HeaderName| headers.get(name).and_then(|v| v.to_str().ok());
    let metadata = headers
        .iter()
        .filter_map(|(name, value)| {
            let name = name.as_str().strip_prefix(META_PREFIX)?;
            Some((name.to_owned(), value.to_str().ok()?.to_owned()))
        })
        .collect();
    ObjectMeta {
        content_length: text(CONTENT_LENGTH)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        content_type: text(CONTENT_TYPE).map(ToOwned::to_owned),
        etag: text(ETAG).map(ToOwned::to_owned),
        last_modified: text(LAST_MODIFIED)
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        metadata,
    }
}
