//! Request execution: sign, send, classify and retry.
//!
//! Every service call goes through [`S3::execute`]. One call drives an
//! [`Attempt`](crate::attempt::Attempt) cursor; each attempt re-signs the
//! request with a fresh timestamp. Only this module turns responses into
//! errors; callers above it propagate what they get.

use bytes::Bytes;
use chrono::Utc;
use http::header::{CONTENT_LENGTH, HeaderValue};
use http::{Method, Request, Response};
use strato_auth::sigv4::{SigningParams, UNSIGNED_PAYLOAD, hash_payload, sign_request};
use strato_auth::sign_request_v2;
use strato_model::ServiceError;
use strato_xml::{S3Deserialize, from_xml};
use tracing::{debug, warn};

use crate::attempt::Attempt;
use crate::client::S3;
use crate::config::SigningVersion;
use crate::error::Error;
use crate::request::Operation;
use crate::transport::{Payload, ResponseBody};

const REQUEST_ID: &str = "x-amz-request-id";
const HOST_ID: &str = "x-amz-id-2";

impl S3 {
    /// Run an operation to completion under the configured attempt strategy.
    ///
    /// Returns the successful response with its body unread.
    pub(crate) async fn execute(&self, op: Operation) -> Result<Response<ResponseBody>, Error> {
        self.run(op, false).await
    }

    /// Like [`S3::execute`], but the success body is read inside the attempt
    /// loop, so an interrupted body is retried like any transport failure.
    pub(crate) async fn execute_buffered(&self, op: Operation) -> Result<Response<Bytes>, Error> {
        let (parts, body) = self.run(op, true).await?.into_parts();
        Ok(Response::from_parts(parts, body.bytes().await?))
    }

    async fn run(&self, mut op: Operation, buffer: bool) -> Result<Response<ResponseBody>, Error> {
        let inner = &self.inner;
        let uri = op.uri(&inner.region)?;
        let mut attempt = inner.config.attempts.start();
        let mut last_error = None;

        loop {
            if !self.next_attempt(&mut attempt).await? {
                break;
            }
            let Some(payload) = op.body.next_payload() else {
                break;
            };

            let request = self.sign(&op, uri.clone(), payload)?;
            debug!(
                method = %op.method,
                bucket = %op.bucket,
                key = op.key.as_deref().unwrap_or(""),
                attempt = attempt.count(),
                "sending request"
            );

            let result = tokio::select! {
                biased;
                () = inner.cancel.cancelled() => return Err(Error::Cancelled),
                result = self.send(&op, request, buffer) => result,
            };
            let err = match result {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            let retry = self.is_retryable(&err) && !op.body.is_stream() && attempt.has_next();
            if !retry {
                debug!(
                    bucket = %op.bucket,
                    attempt = attempt.count(),
                    error = %err,
                    "request failed"
                );
                return Err(err);
            }
            warn!(
                method = %op.method,
                bucket = %op.bucket,
                key = op.key.as_deref().unwrap_or(""),
                attempt = attempt.count(),
                error = %err,
                "retrying request"
            );
            last_error = Some(err);
        }

        Err(last_error.unwrap_or_else(|| Error::validation("attempt strategy permits no attempts")))
    }

    /// Advance `attempt`, racing the wait against cancellation.
    pub(crate) async fn next_attempt(&self, attempt: &mut Attempt) -> Result<bool, Error> {
        tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => Err(Error::Cancelled),
            proceed = attempt.next() => Ok(proceed),
        }
    }

    /// Run an operation and collect the response body.
    pub(crate) async fn execute_bytes(&self, op: Operation) -> Result<Bytes, Error> {
        Ok(self.execute_buffered(op).await?.into_body())
    }

    /// Run an operation and parse the response body.
    pub(crate) async fn execute_xml<T: S3Deserialize>(&self, op: Operation) -> Result<T, Error> {
        let body = self.execute_bytes(op).await?;
        Ok(from_xml(&body)?)
    }

    fn sign(
        &self,
        op: &Operation,
        uri: http::Uri,
        payload: Payload,
    ) -> Result<Request<Payload>, Error> {
        let inner = &self.inner;
        let mut request = Request::new(payload);
        *request.method_mut() = op.method.clone();
        *request.uri_mut() = uri;
        *request.headers_mut() = op.headers.clone();

        let length = request.body().len();
        if length > 0 || matches!(op.method, Method::PUT | Method::POST) {
            request
                .headers_mut()
                .insert(CONTENT_LENGTH, HeaderValue::from(length));
        }

        let payload_hash = match request.body() {
            Payload::Empty => hash_payload(b""),
            Payload::Bytes(bytes) => hash_payload(bytes),
            Payload::Reader { .. } => UNSIGNED_PAYLOAD.to_owned(),
        };

        let (mut parts, payload) = request.into_parts();
        let now = Utc::now();
        match inner.config.signing_version {
            SigningVersion::V4 => {
                let params = SigningParams {
                    credentials: &inner.credentials,
                    region: &inner.region.name,
                    time: now,
                };
                sign_request(&mut parts, &payload_hash, &params)?;
            }
            SigningVersion::V2 => {
                sign_request_v2(&mut parts, &op.resource(&inner.region), &inner.credentials, now)?;
            }
        }
        Ok(Request::from_parts(parts, payload))
    }

    async fn send(
        &self,
        op: &Operation,
        request: Request<Payload>,
        buffer: bool,
    ) -> Result<Response<ResponseBody>, Error> {
        let response = self.inner.transport.execute(request).await?;
        let status = response.status();
        if status.is_success() || op.expect == Some(status) {
            if !buffer {
                return Ok(response);
            }
            let (parts, body) = response.into_parts();
            let body = body.bytes().await?;
            return Ok(Response::from_parts(parts, ResponseBody::from(body)));
        }

        let (request_id, host_id) = {
            let header = |name: &str| {
                response
                    .headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(ToOwned::to_owned)
            };
            (header(REQUEST_ID), header(HOST_ID))
        };

        let body = response.into_body().bytes().await?;
        let mut err = if body.is_empty() {
            ServiceError::from_status(status, op.key_addressed())
        } else {
            match from_xml::<ServiceError>(&body) {
                Ok(err) => err.with_status(status),
                Err(parse_err) => {
                    debug!(status = %status, error = %parse_err, "unparsable error body");
                    ServiceError::from_status(status, op.key_addressed())
                }
            }
        };
        if err.bucket_name.is_none() && !op.bucket.is_empty() {
            err.bucket_name = Some(op.bucket.clone());
        }
        if err.request_id.is_none() {
            err.request_id = request_id;
        }
        if err.host_id.is_none() {
            err.host_id = host_id;
        }
        Err(err.into())
    }

    fn is_retryable(&self, err: &Error) -> bool {
        match err {
            Error::Transport(err) => err.is_retryable(),
            Error::Service(err) => self.inner.config.is_retryable_code(&err.code),
            _ => false,
        }
    }
}
