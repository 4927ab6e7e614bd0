//! Multipart upload integration tests.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use strato_client::{ClientConfig, ErrorKind, Multi};
    use strato_model::error::ErrorCode;
    use strato_model::types::{CannedAcl, Part};

    use crate::server::{Fault, MIN_PART_SIZE, MemoryS3};
    use crate::{Harness, credentials, fast_attempts, fast_config};

    const EMPTY_ETAG: &str = "\"d41d8cd98f00b204e9800998ecf8427e\"";

    fn part_data(n: u32) -> Bytes {
        Bytes::from(format!("<part {n}>"))
    }

    fn part_puts(harness: &Harness) -> usize {
        harness
            .service
            .requests()
            .iter()
            .filter(|r| r.starts_with("PUT ") && r.contains("partNumber="))
            .count()
    }

    #[tokio::test]
    async fn test_should_init_put_and_list_parts() {
        let config = ClientConfig::builder()
            .attempts(fast_attempts())
            .list_parts_max(2)
            .build();
        let harness = Harness::with_config(config);
        let bucket = harness.create_bucket("multi").await;
        let multi = bucket.init_multi("multi", "text/plain", CannedAcl::Private).await.unwrap();
        assert_eq!(multi.key(), "multi");
        assert!(!multi.upload_id().is_empty());

        let mut sent = Vec::new();
        for n in 1..=5 {
            let part = multi.put_part(n, part_data(n)).await.unwrap();
            assert_eq!(part.number, n);
            assert_eq!(part.size, 8);
            sent.push(part);
        }

        let listed = multi.list_parts().await.unwrap();
        assert_eq!(listed.len(), 5);
        for (listed, sent) in listed.iter().zip(&sent) {
            assert_eq!(listed.number, sent.number);
            assert_eq!(listed.size, 8);
            assert_eq!(listed.etag, sent.etag);
            assert!(listed.last_modified.is_some());
        }
        let pages = harness
            .service
            .requests()
            .iter()
            .filter(|r| r.starts_with("GET ") && r.contains("max-parts=2"))
            .count();
        assert_eq!(pages, 3);

        // Parts below the minimum size cannot be assembled.
        let err = multi.complete(&listed).await.unwrap_err();
        assert!(err.has_code(&ErrorCode::EntityTooSmall));
        assert_eq!(err.kind(), ErrorKind::Validation);

        multi.abort().await.unwrap();
        let err = multi.list_parts().await.unwrap_err();
        assert!(err.has_code(&ErrorCode::NoSuchUpload));
        assert!(err.is_not_found());
        let err = multi.abort().await.unwrap_err();
        assert!(err.has_code(&ErrorCode::NoSuchUpload));
    }

    #[tokio::test]
    async fn test_should_complete_parts_given_in_any_order() {
        let harness = Harness::new();
        let bucket = harness.create_bucket("complete").await;
        let multi = bucket.init_multi("multi", "text/plain", CannedAcl::Private).await.unwrap();

        let first = Bytes::from(vec![b'x'; usize::try_from(MIN_PART_SIZE).unwrap()]);
        let p1 = multi.put_part(1, first.clone()).await.unwrap();
        let p2 = multi.put_part(2, part_data(2)).await.unwrap();

        let result = multi.complete(&[p2, p1]).await.unwrap();
        assert_eq!(result.bucket, bucket.name());
        assert_eq!(result.key, "multi");
        assert!(result.etag.ends_with("-2\""), "composite etag: {}", result.etag);

        let data = bucket.get("multi").await.unwrap();
        assert_eq!(data.len(), first.len() + 8);
        assert_eq!(&data[first.len()..], b"<part 2>");
        assert_eq!(harness.service.upload_count(bucket.name()), 0);

        // A completed upload no longer accepts or lists parts.
        let err = multi.list_parts().await.unwrap_err();
        assert!(err.has_code(&ErrorCode::NoSuchUpload));
        let err = multi.put_part(3, part_data(3)).await.unwrap_err();
        assert!(err.has_code(&ErrorCode::NoSuchUpload));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_upload_parts_concurrently_from_clones() {
        let service = MemoryS3::new(&credentials()).with_min_part_size(1);
        let region = service.region();
        let harness = Harness::with_service(service, region, fast_config());
        let bucket = harness.create_bucket("concurrent").await;
        let multi = bucket.init_multi("multi", "text/plain", CannedAcl::Private).await.unwrap();

        let handles: Vec<_> = [3, 1, 2]
            .into_iter()
            .map(|n| {
                let multi = multi.clone();
                tokio::spawn(async move { multi.put_part(n, part_data(n)).await })
            })
            .collect();
        let mut parts = Vec::new();
        for handle in handles {
            parts.push(handle.await.unwrap().unwrap());
        }

        let listed = multi.list_parts().await.unwrap();
        assert_eq!(listed.iter().map(|p| p.number).collect::<Vec<_>>(), [1, 2, 3]);

        multi.complete(&parts).await.unwrap();
        assert_eq!(
            bucket.get("multi").await.unwrap(),
            Bytes::from_static(b"<part 1><part 2><part 3>")
        );
    }

    #[tokio::test]
    async fn test_should_reject_part_with_unknown_etag() {
        let harness = Harness::new();
        let bucket = harness.create_bucket("badpart").await;
        let multi = bucket.init_multi("multi", "text/plain", CannedAcl::Private).await.unwrap();
        let uploaded = multi.put_part(1, part_data(1)).await.unwrap();

        let forged = Part {
            etag: EMPTY_ETAG.to_owned(),
            ..uploaded
        };
        let err = multi.complete(&[forged]).await.unwrap_err();
        assert!(err.has_code(&ErrorCode::InvalidPart));
    }

    #[tokio::test]
    async fn test_should_list_uploads_with_prefixes() {
        let harness = Harness::new();
        let bucket = harness.create_bucket("listmulti").await;
        for key in ["multi1", "a/multi2", "a/multi3", "b/multi4"] {
            bucket.init_multi(key, "text/plain", CannedAcl::Private).await.unwrap();
        }

        let (uploads, prefixes) = bucket.list_multi("", "").await.unwrap();
        assert_eq!(uploads.len(), 4);
        assert!(prefixes.is_empty());

        let (uploads, prefixes) = bucket.list_multi("", "/").await.unwrap();
        let keys: Vec<&str> = uploads.iter().map(Multi::key).collect();
        assert_eq!(keys, ["multi1"]);
        assert_eq!(prefixes, ["a/", "b/"]);

        let (uploads, prefixes) = bucket.list_multi("a/", "/").await.unwrap();
        let keys: Vec<&str> = uploads.iter().map(Multi::key).collect();
        assert_eq!(keys, ["a/multi2", "a/multi3"]);
        assert!(prefixes.is_empty());
    }

    #[tokio::test]
    async fn test_should_page_through_uploads_of_one_key() {
        let config = ClientConfig::builder()
            .attempts(fast_attempts())
            .list_multi_max(1)
            .build();
        let harness = Harness::with_config(config);
        let bucket = harness.create_bucket("pageuploads").await;
        let first = bucket.init_multi("dup", "text/plain", CannedAcl::Private).await.unwrap();
        let second = bucket.init_multi("dup", "text/plain", CannedAcl::Private).await.unwrap();
        let other = bucket.init_multi("other", "text/plain", CannedAcl::Private).await.unwrap();

        let (uploads, _) = bucket.list_multi("", "").await.unwrap();
        let ids: Vec<&str> = uploads.iter().map(Multi::upload_id).collect();
        assert_eq!(ids, [first.upload_id(), second.upload_id(), other.upload_id()]);
    }

    #[tokio::test]
    async fn test_should_upload_zero_length_source() {
        let harness = Harness::new();
        let bucket = harness.create_bucket("zero").await;
        let multi = bucket.init_multi("empty", "text/plain", CannedAcl::Private).await.unwrap();

        let parts = multi
            .put_all(std::io::Cursor::new(Vec::new()), MIN_PART_SIZE)
            .await
            .unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].number, 1);
        assert_eq!(parts[0].size, 0);
        assert_eq!(parts[0].etag, EMPTY_ETAG);

        multi.complete(&parts).await.unwrap();
        assert!(bucket.get("empty").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_should_resume_interrupted_upload() {
        let service = MemoryS3::new(&credentials()).with_min_part_size(4);
        let region = service.region();
        let harness = Harness::with_service(service, region, fast_config());
        let bucket = harness.create_bucket("resume").await;
        let data = b"0123456789".to_vec();

        let multi = bucket.multi("resumed", "text/plain", CannedAcl::Private).await.unwrap();
        let parts = multi.put_all(std::io::Cursor::new(data.clone()), 4).await.unwrap();
        let sizes: Vec<u64> = parts.iter().map(|p| p.size).collect();
        assert_eq!(sizes, [4, 4, 2]);
        assert_eq!(part_puts(&harness), 3);

        let again = bucket.multi("resumed", "text/plain", CannedAcl::Private).await.unwrap();
        assert_eq!(again.upload_id(), multi.upload_id());
        let resumed = again.put_all(std::io::Cursor::new(data.clone()), 4).await.unwrap();
        let summary = |parts: &[Part]| -> Vec<(u32, String, u64)> {
            parts.iter().map(|p| (p.number, p.etag.clone(), p.size)).collect()
        };
        assert_eq!(summary(&resumed), summary(&parts));
        assert_eq!(part_puts(&harness), 3);

        again.complete(&resumed).await.unwrap();
        assert_eq!(bucket.get("resumed").await.unwrap(), Bytes::from(data));
    }

    #[tokio::test]
    async fn test_should_surface_error_embedded_in_complete_response() {
        let harness = Harness::new();
        let bucket = harness.create_bucket("embedded").await;
        let multi = bucket.init_multi("multi", "text/plain", CannedAcl::Private).await.unwrap();
        let part = multi.put_part(1, part_data(1)).await.unwrap();

        harness
            .service
            .fail_next(Fault::EmbeddedError(ErrorCode::InternalError));
        let err = multi.complete(std::slice::from_ref(&part)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Service);
        assert!(err.has_code(&ErrorCode::InternalError));
        assert_eq!(err.service().unwrap().bucket_name.as_deref(), Some(bucket.name()));

        multi.complete(&[part]).await.unwrap();
        assert_eq!(bucket.get("multi").await.unwrap(), part_data(1));
    }

    #[tokio::test]
    async fn test_should_reject_part_number_out_of_range() {
        let harness = Harness::new();
        let bucket = harness.create_bucket("range").await;
        let multi = bucket.init_multi("multi", "text/plain", CannedAcl::Private).await.unwrap();
        let before = harness.service.request_count();

        let err = multi.put_part(0, part_data(0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = multi.put_part(10_001, part_data(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(harness.service.request_count(), before);
    }
}
