//! Error types for request signing and verification.
//!
//! Signing failures and verification failures share [`AuthError`]; the
//! verification variants are only produced by the `verify_*` functions.

/// Errors that can occur while signing or verifying a request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // -- Credentials --
    /// No credentials could be found in the environment.
    #[error("Missing credentials: {0} not set in environment")]
    MissingCredentials(&'static str),

    /// The access key ID was not found in the credential store.
    #[error("Access key not found: {0}")]
    AccessKeyNotFound(String),

    // -- Signing --
    /// A computed value could not be stored as an HTTP header.
    #[error("Invalid header value for {0}")]
    InvalidHeaderValue(&'static str),

    /// The request URI has no host to sign.
    #[error("Request URI has no host")]
    MissingHost,

    // -- Verification --
    /// The `Authorization` header is missing from the request.
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    /// The `Authorization` header could not be parsed.
    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    /// The signing algorithm is not supported.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A required HTTP header referenced in `SignedHeaders` is missing.
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// The `Credential` component does not match
    /// `AKID/date/region/service/aws4_request`.
    #[error("Invalid credential format")]
    InvalidCredential,

    /// The computed signature does not match the provided signature.
    #[error("Signature does not match")]
    SignatureDoesNotMatch,

    /// The pre-signed URL is past its expiry.
    #[error("Request has expired")]
    RequestExpired,

    /// A required query parameter for pre-signed URL authentication is missing.
    #[error("Missing required query parameter: {0}")]
    MissingQueryParam(String),
}
