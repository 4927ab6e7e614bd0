//! Multipart uploads.
//!
//! A [`Multi`] is the handle of one upload: created by
//! [`Bucket::init_multi`] or found again by [`Bucket::multi`], it stays
//! valid until [`Multi::complete`] or [`Multi::abort`]. Handles are
//! immutable, so clones may upload parts concurrently.

use std::fmt;

use bytes::Bytes;
use http::Method;
use http::header::ETAG;
use strato_model::ServiceError;
use strato_model::error::ErrorCode;
use strato_model::types::{
    CannedAcl, CompleteMultipartResult, CompleteMultipartUpload, CompletedPart,
    InitiateMultipartResult, Part, PartsPage,
};
use strato_xml::{XmlError, from_xml, is_error_document, to_xml};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

use crate::bucket::Bucket;
use crate::checksum::{compute_etag, content_md5, etag_matches};
use crate::error::Error;
use crate::request::Operation;

/// Highest part number the service accepts.
pub const MAX_PART_NUMBER: u32 = 10_000;

const READ_BUFFER_CAP: usize = 8 * 1024 * 1024;

/// An in-progress multipart upload.
#[derive(Clone)]
pub struct Multi {
    bucket: Bucket,
    key: String,
    upload_id: String,
}

impl fmt::Debug for Multi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Multi")
            .field("bucket", &self.bucket.name())
            .field("key", &self.key)
            .field("upload_id", &self.upload_id)
            .finish()
    }
}

impl Bucket {
    /// Start a new multipart upload for `key`.
    pub async fn init_multi(
        &self,
        key: &str,
        content_type: &str,
        acl: CannedAcl,
    ) -> Result<Multi, Error> {
        let op = self
            .object_op(Method::POST, key)?
            .param("uploads", "")
            .header("content-type", content_type)?
            .header("x-amz-acl", acl.as_str())?;
        let result: InitiateMultipartResult = self.s3.execute_xml(op).await?;
        info!(bucket = %self.name, key = %key, upload_id = %result.upload_id, "initiated multipart upload");
        Ok(Multi::new(self.clone(), key.to_owned(), result.upload_id))
    }

    /// Resume the first in-progress upload for exactly `key`, or start one.
    pub async fn multi(
        &self,
        key: &str,
        content_type: &str,
        acl: CannedAcl,
    ) -> Result<Multi, Error> {
        let (uploads, _) = self.list_multi(key, "").await?;
        if let Some(multi) = uploads.into_iter().find(|m| m.key == key) {
            debug!(bucket = %self.name, key = %key, upload_id = %multi.upload_id, "resuming multipart upload");
            return Ok(multi);
        }
        self.init_multi(key, content_type, acl).await
    }
}

impl Multi {
    pub(crate) fn new(bucket: Bucket, key: String, upload_id: String) -> Self {
        Self {
            bucket,
            key,
            upload_id,
        }
    }

    /// The bucket the upload belongs to.
    #[must_use]
    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    /// The object key being uploaded.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The service-issued upload ID.
    #[must_use]
    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    fn op(&self, method: Method) -> Operation {
        self.bucket
            .op(method)
            .key(self.key.as_str())
            .param("uploadId", self.upload_id.as_str())
    }

    fn part_op(&self, number: u32) -> Result<Operation, Error> {
        if !(1..=MAX_PART_NUMBER).contains(&number) {
            return Err(Error::validation(format!(
                "part number {number} outside 1..={MAX_PART_NUMBER}"
            )));
        }
        Ok(self.op(Method::PUT).param("partNumber", number.to_string()))
    }

    /// Upload part `number` from memory.
    pub async fn put_part(&self, number: u32, data: Bytes) -> Result<Part, Error> {
        let size = data.len() as u64;
        let op = self
            .part_op(number)?
            .header("content-md5", &content_md5(&data))?
            .bytes(data);
        self.send_part(op, number, size).await
    }

    /// Upload part `number` from a reader yielding exactly `length` bytes.
    ///
    /// The source is sent at most once.
    pub async fn put_part_reader<R>(&self, number: u32, reader: R, length: u64) -> Result<Part, Error>
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        let op = self.part_op(number)?.stream(Box::new(reader), length);
        self.send_part(op, number, length).await
    }

    async fn send_part(&self, op: Operation, number: u32, size: u64) -> Result<Part, Error> {
        let response = self.bucket.s3.execute(op).await?;
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned)
            .ok_or_else(|| XmlError::MissingElement("ETag header".to_owned()))?;
        debug!(
            bucket = %self.bucket.name(),
            key = %self.key,
            part = number,
            size,
            "uploaded part"
        );
        Ok(Part {
            number,
            etag,
            size,
            last_modified: None,
        })
    }

    /// Every uploaded part, ascending by part number.
    pub async fn list_parts(&self) -> Result<Vec<Part>, Error> {
        let max = self.bucket.s3.config().list_parts_max;
        let mut marker = 0;
        let mut parts = Vec::new();
        loop {
            let mut op = self.op(Method::GET).param("max-parts", max.to_string());
            if marker > 0 {
                op = op.param("part-number-marker", marker.to_string());
            }
            let page: PartsPage = self.bucket.s3.execute_xml(op).await?;
            parts.extend(page.parts);
            if !page.is_truncated || page.next_part_number_marker <= marker {
                break;
            }
            marker = page.next_part_number_marker;
        }
        parts.sort_by_key(|p| p.number);
        Ok(parts)
    }

    /// Assemble the object from `parts`, in part-number order whatever the
    /// order given.
    pub async fn complete(&self, parts: &[Part]) -> Result<CompleteMultipartResult, Error> {
        let mut sorted: Vec<&Part> = parts.iter().collect();
        sorted.sort_by_key(|p| p.number);
        let manifest = CompleteMultipartUpload {
            parts: sorted.into_iter().map(CompletedPart::from).collect(),
        };
        let body = to_xml("CompleteMultipartUpload", &manifest)?;
        let op = self.op(Method::POST).bytes(body.into());

        let response = self.bucket.s3.execute_buffered(op).await?;
        let status = response.status();
        let body = response.into_body();
        if is_error_document(&body) {
            let mut err = from_xml::<ServiceError>(&body)?.with_status(status);
            if err.bucket_name.is_none() {
                err.bucket_name = Some(self.bucket.name().to_owned());
            }
            return Err(err.into());
        }
        let result: CompleteMultipartResult = from_xml(&body)?;
        info!(
            bucket = %self.bucket.name(),
            key = %self.key,
            parts = manifest.parts.len(),
            "completed multipart upload"
        );
        Ok(result)
    }

    /// Abandon the upload and discard its parts.
    pub async fn abort(&self) -> Result<(), Error> {
        self.bucket.s3.execute(self.op(Method::DELETE)).await?;
        info!(bucket = %self.bucket.name(), key = %self.key, "aborted multipart upload");
        Ok(())
    }

    /// Upload everything `reader` yields in parts of `part_size` bytes.
    ///
    /// Parts already uploaded with the same size and content are kept, so an
    /// interrupted call can be repeated on the same handle. An empty source
    /// uploads one empty part.
    pub async fn put_all<R>(&self, mut reader: R, part_size: u64) -> Result<Vec<Part>, Error>
    where
        R: AsyncRead + Unpin + Send,
    {
        if part_size == 0 {
            return Err(Error::validation("part size must be positive"));
        }
        let existing = match self.list_parts().await {
            Ok(parts) => parts,
            Err(err) if err.has_code(&ErrorCode::NoSuchUpload) => Vec::new(),
            Err(err) => return Err(err),
        };

        let capacity = usize::try_from(part_size).unwrap_or(usize::MAX).min(READ_BUFFER_CAP);
        let mut parts = Vec::new();
        for number in 1..=MAX_PART_NUMBER + 1 {
            let mut chunk = Vec::with_capacity(capacity);
            (&mut reader).take(part_size).read_to_end(&mut chunk).await?;
            if chunk.is_empty() && number > 1 {
                break;
            }
            if number > MAX_PART_NUMBER {
                return Err(Error::validation(format!(
                    "source needs more than {MAX_PART_NUMBER} parts of {part_size} bytes"
                )));
            }

            let size = chunk.len() as u64;
            let etag = compute_etag(&chunk);
            let uploaded = existing
                .iter()
                .find(|p| p.number == number && p.size == size && etag_matches(&p.etag, &etag));
            match uploaded {
                Some(part) => {
                    debug!(key = %self.key, part = number, "part already uploaded");
                    parts.push(part.clone());
                }
                None => parts.push(self.put_part(number, Bytes::from(chunk)).await?),
            }

            if size < part_size {
                break;
            }
        }
        Ok(parts)
    }
}
