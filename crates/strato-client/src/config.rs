//! Client configuration.
//!
//! Provides [`ClientConfig`] for tuning signing, retries and listing page
//! sizes. Values can be loaded from environment variables via
//! [`ClientConfig::from_env`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strato_model::error::{ErrorClass, ErrorCode};
use typed_builder::TypedBuilder;

use crate::attempt::AttemptStrategy;

/// Request signature version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningVersion {
    /// Legacy HMAC-SHA1 signatures.
    V2,
    /// `AWS4-HMAC-SHA256` signatures.
    #[default]
    V4,
}

impl SigningVersion {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "v2" | "2" => Some(Self::V2),
            "v4" | "4" => Some(Self::V4),
            _ => None,
        }
    }
}

/// Client configuration.
///
/// # Examples
///
/// ```
/// use strato_client::config::{ClientConfig, SigningVersion};
///
/// let config = ClientConfig::builder().list_max_keys(2).build();
/// assert_eq!(config.list_max_keys, 2);
/// assert_eq!(config.signing_version, SigningVersion::V4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Signature version used for requests and pre-signed URLs.
    #[builder(default)]
    pub signing_version: SigningVersion,

    /// Retry policy of the request executor.
    #[builder(default)]
    pub attempts: AttemptStrategy,

    /// Page cap for object listings.
    #[builder(default = 1000)]
    pub list_max_keys: u32,

    /// Page cap for part listings.
    #[builder(default = 1000)]
    pub list_parts_max: u32,

    /// Page cap for multipart upload listings.
    #[builder(default = 1000)]
    pub list_multi_max: u32,

    /// Service error codes that are retried. `None` retries every code of
    /// class [`ErrorClass::Transient`].
    #[builder(default, setter(strip_option))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable_codes: Option<Vec<String>>,

    /// Per-request timeout of the default transport.
    #[builder(default = Duration::from_secs(30))]
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            signing_version: SigningVersion::default(),
            attempts: AttemptStrategy::default(),
            list_max_keys: 1000,
            list_parts_max: 1000,
            list_multi_max: 1000,
            retryable_codes: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `S3_SIGNATURE_VERSION` | `v4` |
    /// | `S3_ATTEMPT_MIN` | `5` |
    /// | `S3_ATTEMPT_TOTAL_MS` | `5000` |
    /// | `S3_ATTEMPT_DELAY_MS` | `200` |
    /// | `S3_LIST_MAX_KEYS` | `1000` |
    /// | `S3_LIST_PARTS_MAX` | `1000` |
    /// | `S3_LIST_MULTI_MAX` | `1000` |
    /// | `S3_RETRYABLE_CODES` | transient codes (`InternalError`, `ServiceUnavailable`, `SlowDown`, `RequestTimeout`) |
    /// | `S3_REQUEST_TIMEOUT_MS` | `30000` |
    ///
    /// Unparsable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_var("S3_SIGNATURE_VERSION").and_then(|v| SigningVersion::parse(&v)) {
            config.signing_version = v;
        }
        if let Some(n) = env_parse::<u32>("S3_ATTEMPT_MIN") {
            config.attempts.min = n;
        }
        if let Some(ms) = env_parse::<u64>("S3_ATTEMPT_TOTAL_MS") {
            config.attempts.total = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("S3_ATTEMPT_DELAY_MS") {
            config.attempts.delay = Duration::from_millis(ms);
        }
        if let Some(n) = env_parse::<u32>("S3_LIST_MAX_KEYS").filter(|n| *n > 0) {
            config.list_max_keys = n;
        }
        if let Some(n) = env_parse::<u32>("S3_LIST_PARTS_MAX").filter(|n| *n > 0) {
            config.list_parts_max = n;
        }
        if let Some(n) = env_parse::<u32>("S3_LIST_MULTI_MAX").filter(|n| *n > 0) {
            config.list_multi_max = n;
        }
        if let Some(v) = env_var("S3_RETRYABLE_CODES") {
            config.retryable_codes = Some(parse_code_list(&v));
        }
        if let Some(ms) = env_parse::<u64>("S3_REQUEST_TIMEOUT_MS") {
            config.request_timeout = Duration::from_millis(ms);
        }

        config
    }

    /// Whether a service error code is in the retryable set.
    #[must_use]
    pub fn is_retryable_code(&self, code: &ErrorCode) -> bool {
        match &self.retryable_codes {
            Some(codes) => codes.iter().any(|c| c == code.as_str()),
            None => code.class() == ErrorClass::Transient,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_var(name).and_then(|v| v.trim().parse().ok())
}

fn parse_code_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
