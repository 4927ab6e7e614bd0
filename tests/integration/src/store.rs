//! State of the in-memory service: buckets, objects and pending uploads.
//!
//! Listings follow the version 1 semantics: the marker is exclusive, keys
//! sharing the prefix up to the first delimiter after it collapse into one
//! common prefix, and common prefixes count toward the page cap.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use strato_model::types::{CannedAcl, ListEntry, ListPage, Owner, Part, UploadEntry, UploadsPage};

/// Owner reported for every object.
pub(crate) const OWNER_ID: &str = "75aa57f09aa0c8caeab4f8c24e99d10f8e7faeebf76c078efc7c6caea54ba06a";
pub(crate) const OWNER_NAME: &str = "strato";

#[derive(Debug, Default)]
pub(crate) struct Store {
    pub(crate) buckets: BTreeMap<String, BucketState>,
    next_upload_seq: u64,
}

impl Store {
    /// Sequence number ordering uploads of the same key by initiation.
    pub(crate) fn next_seq(&mut self) -> u64 {
        self.next_upload_seq += 1;
        self.next_upload_seq
    }
}

#[derive(Debug)]
pub(crate) struct BucketState {
    pub(crate) acl: CannedAcl,
    pub(crate) location: String,
    pub(crate) objects: BTreeMap<String, StoredObject>,
    pub(crate) uploads: HashMap<String, Upload>,
}

impl BucketState {
    pub(crate) fn new(acl: CannedAcl, location: String) -> Self {
        Self {
            acl,
            location,
            objects: BTreeMap::new(),
            uploads: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StoredObject {
    pub(crate) data: Bytes,
    pub(crate) etag: String,
    pub(crate) content_type: String,
    pub(crate) last_modified: DateTime<Utc>,
    pub(crate) acl: CannedAcl,
    pub(crate) storage_class: String,
    pub(crate) metadata: BTreeMap<String, String>,
    /// Stored representation headers (`cache-control`, ...), echoed on reads.
    pub(crate) headers: Vec<(String, String)>,
}

impl StoredObject {
    fn entry(&self, key: &str) -> ListEntry {
        ListEntry {
            key: key.to_owned(),
            last_modified: self.last_modified,
            size: self.data.len() as u64,
            etag: self.etag.clone(),
            storage_class: self.storage_class.clone(),
            owner: Some(Owner {
                id: OWNER_ID.to_owned(),
                display_name: OWNER_NAME.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Upload {
    pub(crate) upload_id: String,
    pub(crate) key: String,
    pub(crate) seq: u64,
    pub(crate) initiated: DateTime<Utc>,
    pub(crate) content_type: String,
    pub(crate) acl: CannedAcl,
    pub(crate) parts: BTreeMap<u32, StoredPart>,
}

#[derive(Debug, Clone)]
pub(crate) struct StoredPart {
    pub(crate) data: Bytes,
    pub(crate) etag: String,
    pub(crate) last_modified: DateTime<Utc>,
}

impl StoredPart {
    pub(crate) fn part(&self, number: u32) -> Part {
        Part {
            number,
            etag: self.etag.clone(),
            size: self.data.len() as u64,
            last_modified: Some(self.last_modified),
        }
    }
}

/// Admission of one key into a capped, delimiter-grouped listing.
#[derive(Debug, PartialEq, Eq)]
enum Admit {
    /// List the key itself.
    Entry,
    /// The key was folded into a common prefix or filtered out.
    Skip,
    /// The page is full; more matching entries exist.
    Full,
}

/// Shared prefix filtering, delimiter grouping and page capping.
struct Grouper<'a> {
    prefix: &'a str,
    delimiter: &'a str,
    marker: &'a str,
    max: usize,
    count: usize,
    truncated: bool,
    prefixes: Vec<String>,
    /// Last key or common prefix admitted, for `NextMarker`.
    last: Option<String>,
}

impl<'a> Grouper<'a> {
    fn new(prefix: &'a str, delimiter: &'a str, marker: &'a str, max: usize) -> Self {
        Self {
            prefix,
            delimiter,
            marker,
            max,
            count: 0,
            truncated: false,
            prefixes: Vec::new(),
            last: None,
        }
    }

    fn admit(&mut self, key: &str) -> Admit {
        if !key.starts_with(self.prefix) {
            return Admit::Skip;
        }
        if let Some(common) = common_prefix(key, self.prefix, self.delimiter) {
            if common <= self.marker || self.prefixes.iter().any(|p| p == common) {
                return Admit::Skip;
            }
            if !self.take_slot() {
                return Admit::Full;
            }
            self.prefixes.push(common.to_owned());
            self.last = Some(common.to_owned());
            return Admit::Skip;
        }
        if !self.take_slot() {
            return Admit::Full;
        }
        self.last = Some(key.to_owned());
        Admit::Entry
    }

    fn take_slot(&mut self) -> bool {
        if self.count >= self.max {
            self.truncated = true;
            return false;
        }
        self.count += 1;
        true
    }
}

/// The common prefix `key` collapses into, if `delimiter` occurs after `prefix`.
fn common_prefix<'k>(key: &'k str, prefix: &str, delimiter: &str) -> Option<&'k str> {
    if delimiter.is_empty() {
        return None;
    }
    let rest = key.get(prefix.len()..)?;
    rest.find(delimiter)
        .map(|pos| &key[..prefix.len() + pos + delimiter.len()])
}

/// One page of `ListBucketResult` for `bucket`.
pub(crate) fn list_objects(
    name: &str,
    bucket: &BucketState,
    prefix: &str,
    delimiter: &str,
    marker: &str,
    max_keys: u32,
) -> ListPage {
    let mut grouper = Grouper::new(prefix, delimiter, marker, max_keys as usize);
    let mut contents = Vec::new();

    let range = bucket
        .objects
        .range::<str, _>((Bound::Excluded(marker), Bound::Unbounded));
    for (key, object) in range {
        match grouper.admit(key) {
            Admit::Entry => contents.push(object.entry(key)),
            Admit::Skip => {}
            Admit::Full => break,
        }
    }

    // `NextMarker` is only sent for delimited listings.
    let next_marker = if grouper.truncated && !delimiter.is_empty() {
        grouper.last.clone()
    } else {
        None
    };
    ListPage {
        name: name.to_owned(),
        prefix: prefix.to_owned(),
        delimiter: delimiter.to_owned(),
        marker: marker.to_owned(),
        next_marker,
        max_keys,
        is_truncated: grouper.truncated,
        contents,
        common_prefixes: grouper.prefixes,
    }
}

/// One page of `ListMultipartUploadsResult` for `bucket`.
///
/// Uploads are ordered by key, then by initiation.
pub(crate) fn list_uploads(
    name: &str,
    bucket: &BucketState,
    prefix: &str,
    delimiter: &str,
    key_marker: &str,
    upload_id_marker: &str,
    max_uploads: u32,
) -> UploadsPage {
    let mut uploads: Vec<&Upload> = bucket.uploads.values().collect();
    uploads.sort_by(|a, b| a.key.cmp(&b.key).then(a.seq.cmp(&b.seq)));

    let marker_seq = bucket
        .uploads
        .get(upload_id_marker)
        .map_or(u64::MAX, |upload| upload.seq);
    let after_marker = |upload: &Upload| match upload.key.as_str().cmp(key_marker) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => !upload_id_marker.is_empty() && upload.seq > marker_seq,
    };

    let mut grouper = Grouper::new(prefix, delimiter, key_marker, max_uploads as usize);
    let mut entries: Vec<UploadEntry> = Vec::new();
    for upload in uploads.into_iter().filter(|u| after_marker(u)) {
        match grouper.admit(&upload.key) {
            Admit::Entry => entries.push(UploadEntry {
                key: upload.key.clone(),
                upload_id: upload.upload_id.clone(),
                initiated: Some(upload.initiated),
            }),
            Admit::Skip => {}
            Admit::Full => break,
        }
    }

    let (next_key_marker, next_upload_id_marker) = match (grouper.truncated, grouper.last.clone()) {
        (true, Some(last)) => {
            let upload_id = entries
                .last()
                .filter(|entry| entry.key == last)
                .map(|entry| entry.upload_id.clone())
                .unwrap_or_default();
            (last, upload_id)
        }
        _ => (String::new(), String::new()),
    };
    UploadsPage {
        bucket: name.to_owned(),
        key_marker: key_marker.to_owned(),
        upload_id_marker: upload_id_marker.to_owned(),
        next_key_marker,
        next_upload_id_marker,
        prefix: prefix.to_owned(),
        delimiter: delimiter.to_owned(),
        max_uploads,
        is_truncated: grouper.truncated,
        uploads: entries,
        common_prefixes: grouper.prefixes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(keys: &[&str]) -> BucketState {
        let mut bucket = BucketState::new(CannedAcl::Private, "us-east-1".to_owned());
        for key in keys {
            bucket.objects.insert(
                (*key).to_owned(),
                StoredObject {
                    data: Bytes::new(),
                    etag: "\"d41d8cd98f00b204e9800998ecf8427e\"".to_owned(),
                    content_type: "text/plain".to_owned(),
                    last_modified: Utc::now(),
                    acl: CannedAcl::Private,
                    storage_class: "STANDARD".to_owned(),
                    metadata: BTreeMap::new(),
                    headers: Vec::new(),
                },
            );
        }
        bucket
    }

    fn keys(page: &ListPage) -> Vec<&str> {
        page.contents.iter().map(|e| e.key.as_str()).collect()
    }

    #[test]
    fn test_should_find_common_prefix_after_listing_prefix() {
        assert_eq!(common_prefix("photos/2006/a.jpg", "", "/"), Some("photos/"));
        assert_eq!(common_prefix("photos/2006/a.jpg", "photos/", "/"), Some("photos/2006/"));
        assert_eq!(common_prefix("photos/2006/February/x", "", "Feb"), Some("photos/2006/Feb"));
        assert_eq!(common_prefix("index.html", "", "/"), None);
        assert_eq!(common_prefix("index.html", "", ""), None);
    }

    #[test]
    fn test_should_count_common_prefixes_toward_cap() {
        let bucket = bucket(&["a", "b/1", "b/2", "c/1", "d"]);
        let page = list_objects("bucket", &bucket, "", "/", "", 2);
        assert_eq!(keys(&page), vec!["a"]);
        assert_eq!(page.common_prefixes, vec!["b/"]);
        assert!(page.is_truncated);
        assert_eq!(page.next_marker.as_deref(), Some("b/"));
    }

    #[test]
    fn test_should_not_truncate_on_repeated_prefix() {
        let bucket = bucket(&["photos/a", "test/bar", "test/foo"]);
        let page = list_objects("bucket", &bucket, "", "/", "photos/", 1);
        assert!(keys(&page).is_empty());
        assert_eq!(page.common_prefixes, vec!["test/"]);
        assert!(!page.is_truncated);
    }

    #[test]
    fn test_should_omit_next_marker_without_delimiter() {
        let bucket = bucket(&["a", "b"]);
        let page = list_objects("bucket", &bucket, "", "", "", 1);
        assert!(page.is_truncated);
        assert_eq!(page.next_marker, None);
        assert_eq!(page.continuation_marker().as_deref(), Some("a"));
    }

    #[test]
    fn test_should_list_uploads_after_markers() {
        let mut bucket = bucket(&[]);
        for (seq, (key, id)) in [("a/x", "id1"), ("a/x", "id2"), ("b", "id3")].into_iter().enumerate() {
            bucket.uploads.insert(
                id.to_owned(),
                Upload {
                    upload_id: id.to_owned(),
                    key: key.to_owned(),
                    seq: seq as u64,
                    initiated: Utc::now(),
                    content_type: String::new(),
                    acl: CannedAcl::Private,
                    parts: BTreeMap::new(),
                },
            );
        }

        let page = list_uploads("bucket", &bucket, "", "", "", "", 2);
        let ids: Vec<_> = page.uploads.iter().map(|u| u.upload_id.as_str()).collect();
        assert_eq!(ids, vec!["id1", "id2"]);
        assert!(page.is_truncated);
        assert_eq!(page.next_key_marker, "a/x");
        assert_eq!(page.next_upload_id_marker, "id2");

        let page = list_uploads("bucket", &bucket, "", "", "a/x", "id1", 2);
        let ids: Vec<_> = page.uploads.iter().map(|u| u.upload_id.as_str()).collect();
        assert_eq!(ids, vec!["id2", "id3"]);
        assert!(!page.is_truncated);

        let page = list_uploads("bucket", &bucket, "", "/", "", "", 10);
        assert_eq!(page.common_prefixes, vec!["a/"]);
        assert_eq!(page.uploads.len(), 1);
    }
}
