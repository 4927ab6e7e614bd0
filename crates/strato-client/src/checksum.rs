//! MD5 digests in the encodings the service uses.
//!
//! `Content-MD5` carries the base64 digest; ETags of single-part objects and
//! of parts are the quoted hex digest.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use md5::{Digest, Md5};

/// Base64 MD5 digest of `data`, for the `Content-MD5` header.
///
/// # Examples
///
/// ```
/// use strato_client::checksum::content_md5;
///
/// assert_eq!(content_md5(b""), "1B2M2Y8AsgTpgAmY7PhCfg==");
/// ```
#[must_use]
pub fn content_md5(data: &[u8]) -> String {
    BASE64_STANDARD.encode(Md5::digest(data))
}

/// Quoted hex MD5 digest of `data`, as the service reports it in an ETag.
///
/// # Examples
///
/// ```
/// use strato_client::checksum::compute_etag;
///
/// assert_eq!(compute_etag(b""), "\"d41d8cd98f00b204e9800998ecf8427e\"");
/// ```
#[must_use]
pub fn compute_etag(data: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Md5::digest(data)))
}

/// Compare two ETags ignoring surrounding quotes and hex case.
#[must_use]
pub fn etag_matches(a: &str, b: &str) -> bool {
    a.trim_matches('"').eq_ignore_ascii_case(b.trim_matches('"'))
}
