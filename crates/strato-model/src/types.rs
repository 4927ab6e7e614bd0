//! Listing, multipart and object types exchanged with the service.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canned access control lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CannedAcl {
    /// Owner gets full control, no one else has access.
    #[default]
    #[serde(rename = "private")]
    Private,
    /// Anyone may read.
    #[serde(rename = "public-read")]
    PublicRead,
    /// Anyone may read and write.
    #[serde(rename = "public-read-write")]
    PublicReadWrite,
    /// Any authenticated user may read.
    #[serde(rename = "authenticated-read")]
    AuthenticatedRead,
    /// The bucket owner may read.
    #[serde(rename = "bucket-owner-read")]
    BucketOwnerRead,
    /// The bucket owner gets full control.
    #[serde(rename = "bucket-owner-full-control")]
    BucketOwnerFullControl,
}

impl CannedAcl {
    /// The `x-amz-acl` header value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::PublicRead => "public-read",
            Self::PublicReadWrite => "public-read-write",
            Self::AuthenticatedRead => "authenticated-read",
            Self::BucketOwnerRead => "bucket-owner-read",
            Self::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }

    /// Parse an `x-amz-acl` value; unknown values yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Self::Private),
            "public-read" => Some(Self::PublicRead),
            "public-read-write" => Some(Self::PublicReadWrite),
            "authenticated-read" => Some(Self::AuthenticatedRead),
            "bucket-owner-read" => Some(Self::BucketOwnerRead),
            "bucket-owner-full-control" => Some(Self::BucketOwnerFullControl),
            _ => None,
        }
    }

    /// Whether anonymous callers may read.
    #[must_use]
    pub fn is_public_read(&self) -> bool {
        matches!(self, Self::PublicRead | Self::PublicReadWrite)
    }
}

impl fmt::Display for CannedAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object owner as reported in listings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Owner {
    /// Canonical user ID.
    pub id: String,
    /// Display name.
    pub display_name: String,
}

/// One object in a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// Object key, the pagination cursor.
    pub key: String,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// Object size in bytes.
    pub size: u64,
    /// Quoted hex content hash.
    pub etag: String,
    /// Storage class, `STANDARD` when the service omits it.
    pub storage_class: String,
    /// Owner, when the service reports it.
    pub owner: Option<Owner>,
}

/// A single page of an object listing (`ListBucketResult`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListPage {
    /// Bucket name.
    pub name: String,
    /// Prefix the listing was filtered by.
    pub prefix: String,
    /// Delimiter the listing was grouped by.
    pub delimiter: String,
    /// Marker the page starts after.
    pub marker: String,
    /// Continuation marker, sent by the service only when a delimiter is used.
    pub next_marker: Option<String>,
    /// Page cap requested.
    pub max_keys: u32,
    /// Whether more matching entries exist beyond this page.
    pub is_truncated: bool,
    /// Entries, ascending by key.
    pub contents: Vec<ListEntry>,
    /// Delimiter-collapsed key groups, ascending.
    pub common_prefixes: Vec<String>,
}

impl ListPage {
    /// The marker to request the following page with.
    ///
    /// `NextMarker` when present, otherwise the greatest of the last key and
    /// the last common prefix. `None` when the page is not truncated.
    #[must_use]
    pub fn continuation_marker(&self) -> Option<String> {
        if !self.is_truncated {
            return None;
        }
        if let Some(next) = self.next_marker.as_ref().filter(|m| !m.is_empty()) {
            return Some(next.clone());
        }
        let last_key = self.contents.last().map(|e| e.key.as_str());
        let last_prefix = self.common_prefixes.last().map(String::as_str);
        last_key.max(last_prefix).map(ToOwned::to_owned)
    }
}

/// One uploaded part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Part {
    /// 1-based part number.
    pub number: u32,
    /// Quoted hex content hash.
    pub etag: String,
    /// Part size in bytes.
    pub size: u64,
    /// Upload time, when reported by a listing.
    pub last_modified: Option<DateTime<Utc>>,
}

/// A single page of a part listing (`ListPartsResult`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartsPage {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Upload ID.
    pub upload_id: String,
    /// Part number the page starts after.
    pub part_number_marker: u32,
    /// Part number to continue after.
    pub next_part_number_marker: u32,
    /// Page cap requested.
    pub max_parts: u32,
    /// Whether more parts exist beyond this page.
    pub is_truncated: bool,
    /// Parts, ascending by number.
    pub parts: Vec<Part>,
}

/// An in-progress multipart upload as seen in an upload listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEntry {
    /// Object key.
    pub key: String,
    /// Upload ID.
    pub upload_id: String,
    /// Initiation time.
    pub initiated: Option<DateTime<Utc>>,
}

/// A single page of an upload listing (`ListMultipartUploadsResult`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadsPage {
    /// Bucket name.
    pub bucket: String,
    /// Key marker the page starts after.
    pub key_marker: String,
    /// Upload ID marker the page starts after.
    pub upload_id_marker: String,
    /// Key marker to continue from.
    pub next_key_marker: String,
    /// Upload ID marker to continue from.
    pub next_upload_id_marker: String,
    /// Prefix the listing was filtered by.
    pub prefix: String,
    /// Delimiter the listing was grouped by.
    pub delimiter: String,
    /// Page cap requested.
    pub max_uploads: u32,
    /// Whether more uploads exist beyond this page.
    pub is_truncated: bool,
    /// Uploads, ascending by key then upload ID.
    pub uploads: Vec<UploadEntry>,
    /// Delimiter-collapsed key groups.
    pub common_prefixes: Vec<String>,
}

/// Response to initiating a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InitiateMultipartResult {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Issued upload ID.
    pub upload_id: String,
}

/// One entry of the completion manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// Part number.
    pub number: u32,
    /// Quoted ETag returned by the part upload.
    pub etag: String,
}

impl From<&Part> for CompletedPart {
    fn from(part: &Part) -> Self {
        Self {
            number: part.number,
            etag: part.etag.clone(),
        }
    }
}

/// The completion manifest (`CompleteMultipartUpload`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompleteMultipartUpload {
    /// Parts in submission order.
    pub parts: Vec<CompletedPart>,
}

/// Response to completing a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompleteMultipartResult {
    /// URL of the assembled object.
    pub location: String,
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// ETag of the assembled object.
    pub etag: String,
}

/// Bucket creation body (`CreateBucketConfiguration`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreateBucketConfiguration {
    /// Region the bucket is created in.
    pub location_constraint: String,
}

/// Object metadata from a HEAD or GET response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectMeta {
    /// Content length in bytes.
    pub content_length: u64,
    /// Content type.
    pub content_type: Option<String>,
    /// Quoted ETag.
    pub etag: Option<String>,
    /// Last modification time.
    pub last_modified: Option<DateTime<Utc>>,
    /// User metadata (`x-amz-meta-*`, prefix stripped).
    pub metadata: BTreeMap<String, String>,
}
