//! Retry, failure classification and cancellation tests.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use strato_client::{AttemptStrategy, ClientConfig, ErrorKind, PutOptions, TransportErrorKind};
    use strato_model::error::ErrorCode;
    use strato_model::types::CannedAcl;

    use crate::Harness;
    use crate::server::Fault;

    /// Exactly three attempts, no waiting.
    fn three_attempts() -> ClientConfig {
        ClientConfig::builder()
            .attempts(AttemptStrategy::new(3, Duration::ZERO, Duration::ZERO))
            .build()
    }

    async fn harness_with_object(config: ClientConfig, prefix: &str) -> (Harness, strato_client::Bucket, usize) {
        let harness = Harness::with_config(config);
        let bucket = harness.create_bucket(prefix).await;
        bucket
            .put("name", Bytes::from_static(b"content"), "text/plain", CannedAcl::Private, PutOptions::default())
            .await
            .unwrap();
        let before = harness.service.request_count();
        (harness, bucket, before)
    }

    #[tokio::test]
    async fn test_should_retry_internal_errors() {
        let (harness, bucket, before) = harness_with_object(three_attempts(), "retry").await;
        harness
            .service
            .fail_times(&Fault::Service(ErrorCode::InternalError), 2);

        assert_eq!(bucket.get("name").await.unwrap(), Bytes::from_static(b"content"));
        assert_eq!(harness.service.request_count() - before, 3);
    }

    #[tokio::test]
    async fn test_should_give_up_after_exhausting_attempts() {
        let (harness, bucket, before) = harness_with_object(three_attempts(), "exhaust").await;
        harness
            .service
            .fail_times(&Fault::Service(ErrorCode::SlowDown), 5);

        let err = bucket.get("name").await.unwrap_err();
        assert!(err.has_code(&ErrorCode::SlowDown));
        assert_eq!(err.status(), Some(http::StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(harness.service.request_count() - before, 3);
    }

    #[tokio::test]
    async fn test_should_not_retry_client_errors() {
        let (harness, bucket, before) = harness_with_object(three_attempts(), "noretry").await;

        let err = bucket.get("missing").await.unwrap_err();
        assert!(err.has_code(&ErrorCode::NoSuchKey));
        assert_eq!(harness.service.request_count() - before, 1);
    }

    #[tokio::test]
    async fn test_should_retry_timeouts_but_not_dns_failures() {
        let (harness, bucket, before) = harness_with_object(three_attempts(), "transport").await;

        harness
            .service
            .fail_next(Fault::Transport(TransportErrorKind::Timeout));
        bucket.get("name").await.unwrap();
        assert_eq!(harness.service.request_count() - before, 2);

        harness
            .service
            .fail_next(Fault::Transport(TransportErrorKind::Dns));
        let err = bucket.get("name").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.is_unreachable());
        assert_eq!(harness.service.request_count() - before, 3);
    }

    #[tokio::test]
    async fn test_should_send_streamed_body_once() {
        let (harness, bucket, before) = harness_with_object(three_attempts(), "stream").await;
        harness
            .service
            .fail_next(Fault::Service(ErrorCode::InternalError));

        let err = bucket
            .put_reader(
                "streamed",
                std::io::Cursor::new(b"streamed".to_vec()),
                8,
                "text/plain",
                CannedAcl::Private,
                PutOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(err.has_code(&ErrorCode::InternalError));
        assert_eq!(harness.service.request_count() - before, 1);
    }

    #[tokio::test]
    async fn test_should_honor_configured_retryable_codes() {
        let config = ClientConfig::builder()
            .attempts(AttemptStrategy::new(3, Duration::ZERO, Duration::ZERO))
            .retryable_codes(vec!["SlowDown".to_owned()])
            .build();
        let (harness, bucket, before) = harness_with_object(config, "codes").await;
        harness
            .service
            .fail_next(Fault::Service(ErrorCode::InternalError));

        let err = bucket.get("name").await.unwrap_err();
        assert!(err.has_code(&ErrorCode::InternalError));
        assert_eq!(harness.service.request_count() - before, 1);
    }

    #[tokio::test]
    async fn test_should_stop_when_cancelled() {
        let (harness, bucket, before) = harness_with_object(three_attempts(), "cancel").await;

        harness.s3.cancel();
        let err = bucket.get("name").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(harness.service.request_count(), before);
    }
}
