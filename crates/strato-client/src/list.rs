//! Paginated object and upload listings.
//!
//! Pages are requested strictly one after another. A page is continued from
//! its `NextMarker` when the service sends one, otherwise from the greater
//! of its last key and its last common prefix.

use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use http::Method;
use strato_model::types::{ListPage, UploadsPage};
use tracing::{debug, warn};

use crate::bucket::Bucket;
use crate::error::Error;
use crate::multipart::Multi;

impl Bucket {
    /// List one page of at most `max` keys after `marker`.
    ///
    /// Keys sharing `prefix` up to the first occurrence of `delim` after it
    /// are collapsed into a common prefix, which counts toward `max`. An
    /// empty `delim` disables grouping; `max == 0` leaves the cap to the
    /// service.
    pub async fn list(
        &self,
        prefix: &str,
        delim: &str,
        marker: &str,
        max: u32,
    ) -> Result<ListPage, Error> {
        let mut op = self
            .op(Method::GET)
            .param("prefix", prefix)
            .param("delimiter", delim)
            .param("marker", marker);
        if max > 0 {
            op = op.param("max-keys", max.to_string());
        }
        let page: ListPage = self.s3.execute_xml(op).await?;
        debug!(
            bucket = %self.name,
            prefix = %prefix,
            marker = %marker,
            keys = page.contents.len(),
            prefixes = page.common_prefixes.len(),
            truncated = page.is_truncated,
            "listed page"
        );
        Ok(page)
    }

    /// Stream every page of a listing.
    ///
    /// Page size is [`ClientConfig::list_max_keys`](crate::config::ClientConfig::list_max_keys).
    pub fn list_pages(&self, prefix: &str, delim: &str) -> BoxStream<'static, Result<ListPage, Error>> {
        let bucket = self.clone();
        let prefix = prefix.to_owned();
        let delim = delim.to_owned();
        let max = self.s3.config().list_max_keys;

        stream::try_unfold(Some(String::new()), move |marker| {
            let bucket = bucket.clone();
            let prefix = prefix.clone();
            let delim = delim.clone();
            async move {
                let Some(marker) = marker else {
                    return Ok(None);
                };
                let page = bucket.list(&prefix, &delim, &marker, max).await?;
                let next = match page.continuation_marker() {
                    Some(next) if next > marker => Some(next),
                    Some(next) => {
                        warn!(bucket = %bucket.name, marker = %next, "listing marker did not advance");
                        None
                    }
                    None => None,
                };
                Ok(Some((page, next)))
            }
        })
        .boxed()
    }

    /// List every key under `prefix`, merged into one untruncated page.
    pub async fn list_all(&self, prefix: &str, delim: &str) -> Result<ListPage, Error> {
        let mut pages = self.list_pages(prefix, delim);
        let Some(mut merged) = pages.try_next().await? else {
            return Ok(ListPage::default());
        };
        while let Some(page) = pages.try_next().await? {
            merged.contents.extend(page.contents);
            merged.common_prefixes.extend(page.common_prefixes);
        }
        merged.is_truncated = false;
        merged.next_marker = None;
        Ok(merged)
    }

    /// List in-progress multipart uploads under `prefix`.
    ///
    /// Returns the upload handles and the common prefixes when `delim` is
    /// set.
    pub async fn list_multi(
        &self,
        prefix: &str,
        delim: &str,
    ) -> Result<(Vec<Multi>, Vec<String>), Error> {
        let max = self.s3.config().list_multi_max;
        let mut key_marker = String::new();
        let mut upload_id_marker = String::new();
        let mut uploads = Vec::new();
        let mut prefixes = Vec::new();

        loop {
            let op = self
                .op(Method::GET)
                .param("uploads", "")
                .param("prefix", prefix)
                .param("delimiter", delim)
                .param("key-marker", key_marker.as_str())
                .param("upload-id-marker", upload_id_marker.as_str())
                .param("max-uploads", max.to_string());
            let page: UploadsPage = self.s3.execute_xml(op).await?;

            uploads.extend(
                page.uploads
                    .into_iter()
                    .map(|upload| Multi::new(self.clone(), upload.key, upload.upload_id)),
            );
            prefixes.extend(page.common_prefixes);

            if !page.is_truncated || page.next_key_marker.is_empty() {
                break;
            }
            key_marker = page.next_key_marker;
            upload_id_marker = page.next_upload_id_marker;
        }

        debug!(bucket = %self.name, prefix = %prefix, uploads = uploads.len(), "listed uploads");
        Ok((uploads, prefixes))
    }
}
