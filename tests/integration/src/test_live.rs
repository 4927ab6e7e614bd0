//! Tests against a running S3-compatible server.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use strato_client::PutOptions;
    use strato_model::error::ErrorCode;
    use strato_model::types::CannedAcl;

    use crate::{cleanup_bucket, live_client, test_bucket_name};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_round_trip_object_on_live_server() {
        let s3 = live_client().unwrap();
        let bucket = s3.bucket(test_bucket_name("live"));
        bucket.put_bucket(CannedAcl::Private).await.unwrap();

        bucket
            .put("dir/name", Bytes::from_static(b"content"), "text/plain", CannedAcl::Private, PutOptions::default())
            .await
            .unwrap();
        assert_eq!(bucket.get("dir/name").await.unwrap(), Bytes::from_static(b"content"));
        let page = bucket.list_all("", "/").await.unwrap();
        assert_eq!(page.common_prefixes, ["dir/"]);

        cleanup_bucket(&bucket).await;
        assert!(!bucket.exists().await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_complete_multipart_upload_on_live_server() {
        let s3 = live_client().unwrap();
        let bucket = s3.bucket(test_bucket_name("livemulti"));
        bucket.put_bucket(CannedAcl::Private).await.unwrap();

        let multi = bucket.init_multi("multi", "text/plain", CannedAcl::Private).await.unwrap();
        let parts = multi
            .put_all(std::io::Cursor::new(b"single small part".to_vec()), 5 * 1024 * 1024)
            .await
            .unwrap();
        multi.complete(&parts).await.unwrap();
        assert_eq!(
            bucket.get("multi").await.unwrap(),
            Bytes::from_static(b"single small part")
        );

        let err = bucket.del_bucket().await.unwrap_err();
        assert!(err.has_code(&ErrorCode::BucketNotEmpty));
        cleanup_bucket(&bucket).await;
    }
}
