//! Service error codes and the structured service error.
//!
//! [`ErrorCode`] covers the codes the client inspects or the in-memory service
//! produces; anything else the service sends is kept verbatim in
//! [`ErrorCode::Other`]. [`ErrorClass`] decides which codes the client retries
//! by default and which it reports as validation failures.

use std::fmt;
use std::str::FromStr;

/// Service-defined error codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    /// AccessDenied error.
    AccessDenied,
    /// BadDigest error.
    BadDigest,
    /// BucketAlreadyExists error.
    BucketAlreadyExists,
    /// BucketAlreadyOwnedByYou error.
    BucketAlreadyOwnedByYou,
    /// BucketNotEmpty error.
    BucketNotEmpty,
    /// EntityTooLarge error.
    EntityTooLarge,
    /// EntityTooSmall error.
    EntityTooSmall,
    /// ExpiredToken error.
    ExpiredToken,
    /// InternalError error.
    InternalError,
    /// InvalidAccessKeyId error.
    InvalidAccessKeyId,
    /// InvalidArgument error.
    InvalidArgument,
    /// InvalidBucketName error.
    InvalidBucketName,
    /// InvalidDigest error.
    InvalidDigest,
    /// InvalidPart error.
    InvalidPart,
    /// InvalidPartOrder error.
    InvalidPartOrder,
    /// InvalidRequest error.
    InvalidRequest,
    /// MalformedXML error.
    MalformedXML,
    /// MethodNotAllowed error.
    MethodNotAllowed,
    /// MissingContentLength error.
    MissingContentLength,
    /// NoSuchBucket error.
    NoSuchBucket,
    /// NoSuchKey error.
    NoSuchKey,
    /// NoSuchUpload error.
    NoSuchUpload,
    /// NotImplemented error.
    NotImplemented,
    /// RequestTimeout error.
    RequestTimeout,
    /// RequestTimeTooSkewed error.
    RequestTimeTooSkewed,
    /// ServiceUnavailable error.
    ServiceUnavailable,
    /// SignatureDoesNotMatch error.
    SignatureDoesNotMatch,
    /// SlowDown error.
    SlowDown,
    /// Any code not listed above, as sent by the service.
    Other(String),
}

/// How a service error should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// May succeed if the same request is repeated.
    Transient,
    /// A resource-state conflict that a higher-level routine may resolve.
    Conflict,
    /// The request itself is wrong; repeating it cannot help.
    Validation,
    /// Final answer from the service.
    Terminal,
}

impl ErrorCode {
    /// Returns the error code as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::BadDigest => "BadDigest",
            Self::BucketAlreadyExists => "BucketAlreadyExists",
            Self::BucketAlreadyOwnedByYou => "BucketAlreadyOwnedByYou",
            Self::BucketNotEmpty => "BucketNotEmpty",
            Self::EntityTooLarge => "EntityTooLarge",
            Self::EntityTooSmall => "EntityTooSmall",
            Self::ExpiredToken => "ExpiredToken",
            Self::InternalError => "InternalError",
            Self::InvalidAccessKeyId => "InvalidAccessKeyId",
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidBucketName => "InvalidBucketName",
            Self::InvalidDigest => "InvalidDigest",
            Self::InvalidPart => "InvalidPart",
            Self::InvalidPartOrder => "InvalidPartOrder",
            Self::InvalidRequest => "InvalidRequest",
            Self::MalformedXML => "MalformedXML",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::MissingContentLength => "MissingContentLength",
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchKey => "NoSuchKey",
            Self::NoSuchUpload => "NoSuchUpload",
            Self::NotImplemented => "NotImplemented",
            Self::RequestTimeout => "RequestTimeout",
            Self::RequestTimeTooSkewed => "RequestTimeTooSkewed",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            Self::SlowDown => "SlowDown",
            Self::Other(code) => code,
        }
    }

    /// Returns the HTTP status the service uses for this code.
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub fn default_status_code(&self) -> http::StatusCode {
        match self {
            Self::BadDigest
            | Self::EntityTooLarge
            | Self::EntityTooSmall
            | Self::ExpiredToken
            | Self::InvalidArgument
            | Self::InvalidBucketName
            | Self::InvalidDigest
            | Self::InvalidPart
            | Self::InvalidPartOrder
            | Self::InvalidRequest
            | Self::MalformedXML
            | Self::RequestTimeout => http::StatusCode::BAD_REQUEST,
            Self::AccessDenied
            | Self::InvalidAccessKeyId
            | Self::RequestTimeTooSkewed
            | Self::SignatureDoesNotMatch => http::StatusCode::FORBIDDEN,
            Self::NoSuchBucket | Self::NoSuchKey | Self::NoSuchUpload => {
                http::StatusCode::NOT_FOUND
            }
            Self::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
            Self::BucketAlreadyExists | Self::BucketAlreadyOwnedByYou | Self::BucketNotEmpty => {
                http::StatusCode::CONFLICT
            }
            Self::MissingContentLength => http::StatusCode::LENGTH_REQUIRED,
            Self::InternalError => http::StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotImplemented => http::StatusCode::NOT_IMPLEMENTED,
            Self::ServiceUnavailable => http::StatusCode::SERVICE_UNAVAILABLE,
            Self::SlowDown => http::StatusCode::SERVICE_UNAVAILABLE,
            Self::Other(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the message the service uses for this code.
    #[must_use]
    pub fn default_message(&self) -> &str {
        match self {
            Self::AccessDenied => "Access Denied",
            Self::BadDigest => "The Content-MD5 you specified did not match what we received.",
            Self::BucketAlreadyExists => "The requested bucket name is not available.",
            Self::BucketAlreadyOwnedByYou => {
                "Your previous request to create the named bucket succeeded and you already own it."
            }
            Self::BucketNotEmpty => "The bucket you tried to delete is not empty",
            Self::EntityTooLarge => "Your proposed upload exceeds the maximum allowed size",
            Self::EntityTooSmall => "Your proposed upload is smaller than the minimum allowed size",
            Self::ExpiredToken => "The provided token has expired.",
            Self::InternalError => "We encountered an internal error. Please try again.",
            Self::InvalidAccessKeyId => {
                "The AWS Access Key Id you provided does not exist in our records."
            }
            Self::InvalidArgument => "Invalid Argument",
            Self::InvalidBucketName => "The specified bucket is not valid.",
            Self::InvalidDigest => "The Content-MD5 you specified is not valid.",
            Self::InvalidPart => {
                "One or more of the specified parts could not be found. The part might not have been uploaded, or the specified entity tag might not have matched the part's entity tag."
            }
            Self::InvalidPartOrder => {
                "The list of parts was not in ascending order. The parts list must be specified in order by part number."
            }
            Self::InvalidRequest => "Invalid Request",
            Self::MalformedXML => {
                "The XML you provided was not well-formed or did not validate against our published schema."
            }
            Self::MethodNotAllowed => "The specified method is not allowed against this resource.",
            Self::MissingContentLength => "You must provide the Content-Length HTTP header.",
            Self::NoSuchBucket => "The specified bucket does not exist",
            Self::NoSuchKey => "The specified key does not exist.",
            Self::NoSuchUpload => {
                "The specified upload does not exist. The upload ID may be invalid, or the upload may have been aborted or completed."
            }
            Self::NotImplemented => {
                "A header you provided implies functionality that is not implemented."
            }
            Self::RequestTimeout => {
                "Your socket connection to the server was not read from or written to within the timeout period."
            }
            Self::RequestTimeTooSkewed => {
                "The difference between the request time and the server's time is too large."
            }
            Self::ServiceUnavailable => "Reduce your request rate.",
            Self::SignatureDoesNotMatch => {
                "The request signature we calculated does not match the signature you provided."
            }
            Self::SlowDown => "Please reduce your request rate.",
            Self::Other(_) => "",
        }
    }

    /// Retry taxonomy for this code.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InternalError
            | Self::ServiceUnavailable
            | Self::SlowDown
            | Self::RequestTimeout => ErrorClass::Transient,
            Self::BucketNotEmpty | Self::BucketAlreadyOwnedByYou | Self::BucketAlreadyExists => {
                ErrorClass::Conflict
            }
            Self::BadDigest
            | Self::EntityTooLarge
            | Self::EntityTooSmall
            | Self::InvalidArgument
            | Self::InvalidBucketName
            | Self::InvalidDigest
            | Self::InvalidPart
            | Self::InvalidPartOrder
            | Self::InvalidRequest
            | Self::MalformedXML
            | Self::MissingContentLength => ErrorClass::Validation,
            _ => ErrorClass::Terminal,
        }
    }

    /// Whether this code reports a missing bucket, key or upload.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoSuchBucket | Self::NoSuchKey | Self::NoSuchUpload)
    }
}

impl FromStr for ErrorCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "AccessDenied" => Self::AccessDenied,
            "BadDigest" => Self::BadDigest,
            "BucketAlreadyExists" => Self::BucketAlreadyExists,
            "BucketAlreadyOwnedByYou" => Self::BucketAlreadyOwnedByYou,
            "BucketNotEmpty" => Self::BucketNotEmpty,
            "EntityTooLarge" => Self::EntityTooLarge,
            "EntityTooSmall" => Self::EntityTooSmall,
            "ExpiredToken" => Self::ExpiredToken,
            "InternalError" => Self::InternalError,
            "InvalidAccessKeyId" => Self::InvalidAccessKeyId,
            "InvalidArgument" => Self::InvalidArgument,
            "InvalidBucketName" => Self::InvalidBucketName,
            "InvalidDigest" => Self::InvalidDigest,
            "InvalidPart" => Self::InvalidPart,
            "InvalidPartOrder" => Self::InvalidPartOrder,
            "InvalidRequest" => Self::InvalidRequest,
            "MalformedXML" => Self::MalformedXML,
            "MethodNotAllowed" => Self::MethodNotAllowed,
            "MissingContentLength" => Self::MissingContentLength,
            "NoSuchBucket" => Self::NoSuchBucket,
            "NoSuchKey" => Self::NoSuchKey,
            "NoSuchUpload" => Self::NoSuchUpload,
            "NotImplemented" => Self::NotImplemented,
            "RequestTimeout" => Self::RequestTimeout,
            "RequestTimeTooSkewed" => Self::RequestTimeTooSkewed,
            "ServiceUnavailable" => Self::ServiceUnavailable,
            "SignatureDoesNotMatch" => Self::SignatureDoesNotMatch,
            "SlowDown" => Self::SlowDown,
            other => Self::Other(other.to_owned()),
        })
    }
}

impl From<&str> for ErrorCode {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(code) => code,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured error returned by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    /// The HTTP status code.
    pub status_code: http::StatusCode,
    /// The service error code.
    pub code: ErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The bucket the error refers to, when applicable.
    pub bucket_name: Option<String>,
    /// The resource (key, upload ID, ...) the error refers to.
    pub resource: Option<String>,
    /// The request ID assigned by the service.
    pub request_id: Option<String>,
    /// The host ID assigned by the service.
    pub host_id: Option<String>,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.code,
            self.status_code.as_u16(),
            self.message
        )?;
        if let Some(bucket) = &self.bucket_name {
            write!(f, " [bucket {bucket}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for ServiceError {}

impl ServiceError {
    /// Create an error with the code's default status and message.
    #[must_use]
    pub fn new(code: ErrorCode) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: code.default_message().to_owned(),
            code,
            bucket_name: None,
            resource: None,
            request_id: None,
            host_id: None,
        }
    }

    /// Create an error with a custom message.
    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::new(code)
        }
    }

    /// Create an error from a bare HTTP status, for responses without a body.
    ///
    /// `key_addressed` picks `NoSuchKey` over `NoSuchBucket` for a 404.
    #[must_use]
    pub fn from_status(status_code: http::StatusCode, key_addressed: bool) -> Self {
        let code = match status_code {
            http::StatusCode::NOT_FOUND if key_addressed => ErrorCode::NoSuchKey,
            http::StatusCode::NOT_FOUND => ErrorCode::NoSuchBucket,
            http::StatusCode::FORBIDDEN => ErrorCode::AccessDenied,
            http::StatusCode::CONFLICT => ErrorCode::BucketNotEmpty,
            http::StatusCode::SERVICE_UNAVAILABLE => ErrorCode::ServiceUnavailable,
            http::StatusCode::INTERNAL_SERVER_ERROR => ErrorCode::InternalError,
            other => ErrorCode::Other(
                other
                    .canonical_reason()
                    .unwrap_or("UnknownError")
                    .replace(' ', ""),
            ),
        };
        Self {
            status_code,
            ..Self::new(code)
        }
    }

    /// Override the HTTP status code.
    #[must_use]
    pub fn with_status(mut self, status_code: http::StatusCode) -> Self {
        self.status_code = status_code;
        self
    }

    /// Set the bucket name.
    #[must_use]
    pub fn with_bucket(mut self, bucket_name: impl Into<String>) -> Self {
        self.bucket_name = Some(bucket_name.into());
        self
    }

    /// Set the resource.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Set the request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Retry taxonomy of the code.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        self.code.class()
    }

    /// Whether the service refused access.
    ///
    /// Expired pre-signed URLs are reported as `AccessDenied`; when a proxy
    /// strips the code, the message is the only signal left.
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        match &self.code {
            ErrorCode::AccessDenied => true,
            ErrorCode::Other(_) => {
                let message = self.message.to_ascii_lowercase();
                message.contains("access denied") || message.contains("request has expired")
            }
            _ => false,
        }
    }
}

/// Create a [`ServiceError`] from an error code name.
///
/// # Examples
///
/// ```
/// use strato_model::service_error;
/// use strato_model::error::ErrorCode;
///
/// let err = service_error!(NoSuchBucket);
/// assert_eq!(err.code, ErrorCode::NoSuchBucket);
///
/// let err = service_error!(EntityTooSmall, "part 1 is too small");
/// assert_eq!(err.message, "part 1 is too small");
/// ```
#[macro_export]
macro_rules! service_error {
    ($code:ident) => {
        $crate::error::ServiceError::new($crate::error::ErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::ServiceError::with_message($crate::error::ErrorCode::$code, $msg)
    };
}
