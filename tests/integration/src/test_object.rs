//! Object integration tests.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use strato_client::{ClientConfig, PutOptions, SigningVersion};
    use strato_model::error::ErrorCode;
    use strato_model::types::CannedAcl;
    use tokio::io::AsyncReadExt;

    use crate::server::MemoryS3;
    use crate::{Harness, credentials, fast_attempts, fast_config};

    #[tokio::test]
    async fn test_should_put_get_and_delete_object() {
        let harness = Harness::new();
        let bucket = harness.create_bucket("object").await;

        bucket
            .put("name", Bytes::from_static(b"content"), "text/plain", CannedAcl::Private, PutOptions::default())
            .await
            .unwrap();
        assert_eq!(bucket.get("name").await.unwrap(), Bytes::from_static(b"content"));

        bucket.del("name").await.unwrap();
        let err = bucket.get("name").await.unwrap_err();
        assert!(err.has_code(&ErrorCode::NoSuchKey));
        assert!(err.is_not_found());

        // Deleting an absent key is not an error.
        bucket.del("name").await.unwrap();
    }

    #[tokio::test]
    async fn test_should_stream_object_in_and_out() {
        let harness = Harness::new();
        let bucket = harness.create_bucket("stream").await;
        let data: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();

        bucket
            .put_reader(
                "streamed",
                std::io::Cursor::new(data.clone()),
                data.len() as u64,
                "application/octet-stream",
                CannedAcl::Private,
                PutOptions::default(),
            )
            .await
            .unwrap();

        let mut reader = bucket.get_reader("streamed").await.unwrap();
        let mut read = Vec::new();
        reader.read_to_end(&mut read).await.unwrap();
        assert_eq!(read, data);
    }

    #[tokio::test]
    async fn test_should_return_object_metadata_on_head() {
        let harness = Harness::new();
        let bucket = harness.create_bucket("head").await;
        let options = PutOptions::builder()
            .metadata([("origin".to_owned(), "import".to_owned())].into())
            .cache_control("max-age=60")
            .build();
        bucket
            .put("doc.txt", Bytes::from_static(b"hello"), "text/plain", CannedAcl::Private, options)
            .await
            .unwrap();

        let meta = bucket.head("doc.txt").await.unwrap();
        assert_eq!(meta.content_length, 5);
        assert_eq!(meta.content_type.as_deref(), Some("text/plain"));
        assert_eq!(meta.etag.as_deref(), Some("\"5d41402abc4b2a76b9719d911017c592\""));
        assert!(meta.last_modified.is_some());
        assert_eq!(meta.metadata.get("origin").map(String::as_str), Some("import"));
    }

    #[tokio::test]
    async fn test_should_reject_mismatched_content_md5() {
        let harness = Harness::new();
        let bucket = harness.create_bucket("digest").await;
        let options = PutOptions::builder()
            .content_md5("XUFAKrxLKna5cZ2REBfFkg==")
            .build();

        let err = bucket
            .put("name", Bytes::from_static(b"not hello"), "text/plain", CannedAcl::Private, options)
            .await
            .unwrap_err();
        assert!(err.has_code(&ErrorCode::BadDigest));
        assert!(harness.service.object_keys(bucket.name()).is_empty());
        // Not retryable: exactly one PUT reached the service.
        let puts = harness
            .service
            .requests()
            .iter()
            .filter(|r| r.starts_with("PUT ") && r.ends_with("/name"))
            .count();
        assert_eq!(puts, 1);
    }

    #[tokio::test]
    async fn test_should_serve_public_objects_through_unsigned_url() {
        let harness = Harness::new();
        let bucket = harness.create_bucket("public").await;
        bucket
            .put("open", Bytes::from_static(b"open content"), "text/plain", CannedAcl::PublicRead, PutOptions::default())
            .await
            .unwrap();
        bucket
            .put("closed", Bytes::from_static(b"closed content"), "text/plain", CannedAcl::Private, PutOptions::default())
            .await
            .unwrap();

        let (status, body) = harness.service.fetch(&bucket.url("open")).await.unwrap();
        assert_eq!(status, http::StatusCode::OK);
        assert_eq!(body, Bytes::from_static(b"open content"));

        let (status, body) = harness.service.fetch(&bucket.url("closed")).await.unwrap();
        assert_eq!(status, http::StatusCode::FORBIDDEN);
        assert!(String::from_utf8_lossy(&body).contains("<Code>AccessDenied</Code>"));
    }

    #[tokio::test]
    async fn test_should_round_trip_keys_needing_escapes() {
        let harness = Harness::new();
        let bucket = harness.create_bucket("escape").await;
        let key = "photos/my cat+dog (1).jpg";

        bucket
            .put(key, Bytes::from_static(b"meow"), "image/jpeg", CannedAcl::Private, PutOptions::default())
            .await
            .unwrap();
        assert_eq!(harness.service.object_keys(bucket.name()), vec![key.to_owned()]);
        assert_eq!(bucket.get(key).await.unwrap(), Bytes::from_static(b"meow"));
    }

    #[tokio::test]
    async fn test_should_address_buckets_by_domain() {
        let service = MemoryS3::new(&credentials());
        let region = service.domain_region();
        let harness = Harness::with_service(service, region, fast_config());
        let bucket = harness.create_bucket("domain").await;

        bucket
            .put("name", Bytes::from_static(b"content"), "text/plain", CannedAcl::Private, PutOptions::default())
            .await
            .unwrap();
        assert_eq!(bucket.get("name").await.unwrap(), Bytes::from_static(b"content"));
        assert!(harness.service.requests().iter().any(|r| r == "GET /name"));
    }

    #[tokio::test]
    async fn test_should_sign_with_signature_version_2() {
        let config = ClientConfig::builder()
            .attempts(fast_attempts())
            .signing_version(SigningVersion::V2)
            .build();
        let harness = Harness::with_config(config);
        let bucket = harness.create_bucket("sigv2").await;

        bucket
            .put("dir/name", Bytes::from_static(b"content"), "text/plain", CannedAcl::Private, PutOptions::default())
            .await
            .unwrap();
        assert_eq!(bucket.get("dir/name").await.unwrap(), Bytes::from_static(b"content"));
        let listing = bucket.list("dir/", "", "", 0).await.unwrap();
        assert_eq!(listing.contents.len(), 1);
    }

    #[tokio::test]
    async fn test_should_reject_unknown_access_key() {
        let harness = Harness::new();
        let stranger = strato_client::S3::with_transport(
            strato_auth::Credentials::new("AKIDSTRANGER", "secret"),
            harness.service.region(),
            fast_config(),
            harness.service.clone(),
        );

        let err = stranger
            .bucket("anything")
            .put_bucket(CannedAcl::Private)
            .await
            .unwrap_err();
        assert!(err.has_code(&ErrorCode::InvalidAccessKeyId));
        assert_eq!(err.status(), Some(http::StatusCode::FORBIDDEN));
    }
}
