//! Client error type.
//!
//! Every failing call returns [`Error`]. [`Error::kind`] gives the coarse
//! category callers branch on; [`Error::service`] exposes the structured
//! service error when there is one.

use strato_auth::AuthError;
use strato_model::ServiceError;
use strato_model::error::{ErrorClass, ErrorCode};
use strato_xml::XmlError;

use crate::transport::TransportError;

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No HTTP response was obtained, or its body could not be received.
    Transport,
    /// The service answered with an error, or with a response the client
    /// could not parse.
    Service,
    /// The request was rejected before it was sent, or the service rejected
    /// it as malformed (`EntityTooSmall`, `InvalidPart`, `MalformedXML`, ...).
    Validation,
    /// The client's cancellation token fired.
    Cancelled,
    /// Bucket teardown gave up.
    Teardown,
}

/// Errors returned by the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // -- Wire --
    /// Connectivity, DNS, timeout or body transfer failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A response body could not be parsed.
    #[error("malformed response: {0}")]
    Xml(#[from] XmlError),

    /// Reading a caller-supplied source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // -- Service --
    /// Structured error returned by the service.
    #[error(transparent)]
    Service(Box<ServiceError>),

    // -- Caller --
    /// Invalid input, rejected without contacting the service.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The request could not be signed.
    #[error("signing failed: {0}")]
    Auth(#[from] AuthError),

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Bucket teardown failed; `source` is the last error observed.
    #[error("cannot delete bucket {bucket}: {source}")]
    Teardown {
        /// The bucket that could not be deleted.
        bucket: String,
        /// The last error observed.
        #[source]
        source: Box<Error>,
    },
}

impl From<ServiceError> for Error {
    fn from(err: ServiceError) -> Self {
        Self::Service(Box::new(err))
    }
}

impl Error {
    /// Coarse category of the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::Io(_) => ErrorKind::Transport,
            Self::Service(err) if err.class() == ErrorClass::Validation => ErrorKind::Validation,
            Self::Service(_) | Self::Xml(_) => ErrorKind::Service,
            Self::Validation(_) | Self::Auth(_) => ErrorKind::Validation,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Teardown { .. } => ErrorKind::Teardown,
        }
    }

    /// The structured service error, if any.
    #[must_use]
    pub fn service(&self) -> Option<&ServiceError> {
        match self {
            Self::Service(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    /// The service error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&ErrorCode> {
        self.service().map(|err| &err.code)
    }

    /// The HTTP status of a service error.
    #[must_use]
    pub fn status(&self) -> Option<http::StatusCode> {
        self.service().map(|err| err.status_code)
    }

    /// Whether the error is a service error with the given code.
    #[must_use]
    pub fn has_code(&self, code: &ErrorCode) -> bool {
        self.code() == Some(code)
    }

    /// Whether the addressed bucket, key or upload does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code().is_some_and(ErrorCode::is_not_found)
    }

    /// Whether the service refused access, including expired signatures.
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        self.service().is_some_and(ServiceError::is_access_denied)
    }

    /// Whether the endpoint could not be reached at all.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_unreachable())
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
