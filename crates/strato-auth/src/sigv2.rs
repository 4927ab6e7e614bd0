//! AWS Signature Version 2.
//!
//! SigV2 uses HMAC-SHA1. Header-signed requests carry
//!
//! ```text
//! Authorization: AWS <AWSAccessKeyId>:<Signature>
//! ```
//!
//! where `Signature = Base64(HMAC-SHA1(SecretKey, StringToSign))` and
//!
//! ```text
//! StringToSign = HTTP-Verb + "\n" +
//!                Content-MD5 + "\n" +
//!                Content-Type + "\n" +
//!                Date + "\n" +
//!                CanonicalizedAmzHeaders +
//!                CanonicalizedResource
//! ```
//!
//! Pre-signed URLs put the expiry (unix seconds) where the date goes and carry
//! `AWSAccessKeyId`, `Expires` and `Signature` in the query string.
//!
//! The canonicalized resource always starts with `/bucket`, also for
//! domain-style requests whose URI path does not contain the bucket, so every
//! function here takes that resource path explicitly.

use std::collections::{BTreeMap, HashMap};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hmac::{Hmac, KeyInit, Mac};
use http::HeaderMap;
use sha1::Sha1;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::canonical::{encode_query, uri_encode};
use crate::credentials::{CredentialProvider, Credentials};
use crate::error::AuthError;
use crate::sigv4::{AuthResult, ensure_host, set_header};

type HmacSha1 = Hmac<Sha1>;

/// `Date` header format.
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Query parameters that belong to the canonicalized resource.
const SUB_RESOURCES: &[&str] = &[
    "acl",
    "cors",
    "delete",
    "lifecycle",
    "location",
    "logging",
    "notification",
    "partNumber",
    "policy",
    "requestPayment",
    "response-cache-control",
    "response-content-disposition",
    "response-content-encoding",
    "response-content-language",
    "response-content-type",
    "response-expires",
    "restore",
    "tagging",
    "torrent",
    "uploadId",
    "uploads",
    "versionId",
    "versioning",
    "versions",
    "website",
];

/// Whether an `Authorization` value is SigV2 (`AWS AKID:sig`).
#[must_use]
pub fn is_sigv2(auth_header: &str) -> bool {
    auth_header.starts_with("AWS ") && !auth_header.starts_with("AWS4-")
}

/// Sign a request in place with SigV2.
///
/// Sets `host`, `date` (unless `x-amz-date` is already present),
/// `x-amz-security-token` when needed, and `authorization`.
///
/// # Errors
///
/// Returns [`AuthError::MissingHost`] when the host cannot be determined.
pub fn sign_request_v2(
    parts: &mut http::request::Parts,
    resource_path: &str,
    credentials: &Credentials,
    time: DateTime<Utc>,
) -> Result<(), AuthError> {
    ensure_host(parts)?;
    if !parts.headers.contains_key("x-amz-date") {
        set_header(
            &mut parts.headers,
            "date",
            &time.format(HTTP_DATE_FORMAT).to_string(),
        )?;
    }
    if let Some(token) = credentials.session_token() {
        set_header(&mut parts.headers, "x-amz-security-token", token)?;
    }

    let string_to_sign = build_string_to_sign(
        parts.method.as_str(),
        &parts.headers,
        resource_path,
        parts.uri.query().unwrap_or(""),
    );
    let signature = compute_sigv2_signature(credentials.secret_access_key(), &string_to_sign);
    let authorization = format!("AWS {}:{signature}", credentials.access_key_id());
    set_header(&mut parts.headers, "authorization", &authorization)?;

    debug!(method = %parts.method, resource = resource_path, "signed request with SigV2");
    Ok(())
}

/// Build a SigV2 pre-signed URL valid until `expires_at`.
///
/// # Errors
///
/// Returns [`AuthError::MissingHost`] when `uri` is not absolute.
pub fn presign_url_v2(
    method: &http::Method,
    uri: &http::Uri,
    resource_path: &str,
    credentials: &Credentials,
    expires_at: DateTime<Utc>,
) -> Result<String, AuthError> {
    let host = uri.authority().ok_or(AuthError::MissingHost)?.as_str();
    let scheme = uri.scheme_str().unwrap_or("https");
    let expires = expires_at.timestamp().to_string();
    let existing_query = uri.query().unwrap_or("");

    let amz_headers = credentials
        .session_token()
        .map(|token| format!("x-amz-security-token:{token}\n"))
        .unwrap_or_default();
    let resource = build_canonicalized_resource(resource_path, existing_query);
    let string_to_sign = format!("{}\n\n\n{expires}\n{amz_headers}{resource}", method.as_str());
    let signature = compute_sigv2_signature(credentials.secret_access_key(), &string_to_sign);

    let mut params = vec![
        ("AWSAccessKeyId", credentials.access_key_id().to_owned()),
        ("Expires", expires),
        ("Signature", signature),
    ];
    if let Some(token) = credentials.session_token() {
        params.push(("x-amz-security-token", token.to_owned()));
    }
    let auth_query = encode_query(&params);
    let query = if existing_query.is_empty() {
        auth_query
    } else {
        format!("{existing_query}&{auth_query}")
    };

    Ok(format!("{scheme}://{host}{}?{query}", uri.path()))
}

/// Verify a SigV2 header-signed request.
///
/// # Errors
///
/// Returns an [`AuthError`] if the header is malformed, the access key is not
/// found, or the signature does not match.
pub fn verify_sigv2(
    parts: &http::request::Parts,
    resource_path: &str,
    credential_provider: &dyn CredentialProvider,
) -> Result<AuthResult, AuthError> {
    let auth_header = parts
        .headers
        .get(http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let (access_key_id, provided_signature) = parse_sigv2_header(auth_header)?;
    let secret_key = credential_provider.get_secret_key(&access_key_id)?;

    let string_to_sign = build_string_to_sign(
        parts.method.as_str(),
        &parts.headers,
        resource_path,
        parts.uri.query().unwrap_or(""),
    );
    let expected_signature = compute_sigv2_signature(&secret_key, &string_to_sign);

    if provided_signature
        .as_bytes()
        .ct_eq(expected_signature.as_bytes())
        .into()
    {
        Ok(v2_result(access_key_id))
    } else {
        debug!(string_to_sign = ?string_to_sign, "SigV2 signature mismatch");
        Err(AuthError::SignatureDoesNotMatch)
    }
}

/// Verify a SigV2 pre-signed request as of `now`.
///
/// # Errors
///
/// Returns [`AuthError::RequestExpired`] once `now` is past `Expires`, and the
/// usual parse, lookup and mismatch errors otherwise.
pub fn verify_presigned_v2(
    parts: &http::request::Parts,
    resource_path: &str,
    credential_provider: &dyn CredentialProvider,
    now: DateTime<Utc>,
) -> Result<AuthResult, AuthError> {
    let query = parts.uri.query().unwrap_or("");
    let params: HashMap<&str, String> = query
        .split('&')
        .filter_map(|param| param.split_once('='))
        .map(|(k, v)| {
            let decoded = percent_encoding::percent_decode_str(v)
                .decode_utf8_lossy()
                .into_owned();
            (k, decoded)
        })
        .collect();

    let param = |name: &str| {
        params
            .get(name)
            .cloned()
            .ok_or_else(|| AuthError::MissingQueryParam(name.to_owned()))
    };
    let access_key_id = param("AWSAccessKeyId")?;
    let expires = param("Expires")?;
    let provided_signature = param("Signature")?;

    let expires_at: i64 = expires
        .parse()
        .map_err(|_| AuthError::MissingQueryParam("Expires (invalid integer)".to_owned()))?;
    if now.timestamp() > expires_at {
        return Err(AuthError::RequestExpired);
    }

    let secret_key = credential_provider.get_secret_key(&access_key_id)?;
    let amz_headers = params
        .get("x-amz-security-token")
        .map(|token| format!("x-amz-security-token:{token}\n"))
        .unwrap_or_default();
    let resource = build_canonicalized_resource(resource_path, query);
    let string_to_sign = format!(
        "{}\n\n\n{expires}\n{amz_headers}{resource}",
        parts.method.as_str()
    );
    let expected_signature = compute_sigv2_signature(&secret_key, &string_to_sign);

    if provided_signature
        .as_bytes()
        .ct_eq(expected_signature.as_bytes())
        .into()
    {
        Ok(v2_result(access_key_id))
    } else {
        Err(AuthError::SignatureDoesNotMatch)
    }
}

fn v2_result(access_key_id: String) -> AuthResult {
    AuthResult {
        access_key_id,
        region: String::new(),
        service: "s3".to_owned(),
        signed_headers: Vec::new(),
    }
}

fn parse_sigv2_header(header: &str) -> Result<(String, String), AuthError> {
    let rest = header
        .strip_prefix("AWS ")
        .ok_or(AuthError::InvalidAuthHeader)?;

    let (access_key_id, signature) = rest.split_once(':').ok_or(AuthError::InvalidAuthHeader)?;

    if access_key_id.is_empty() || signature.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }

    Ok((access_key_id.to_owned(), signature.to_owned()))
}

/// Build the SigV2 string to sign for a header-signed request.
///
/// The `Date` line is empty when `x-amz-date` is present.
#[must_use]
pub fn build_string_to_sign(
    method: &str,
    headers: &HeaderMap,
    resource_path: &str,
    query: &str,
) -> String {
    let content_md5 = header_value(headers, "content-md5");
    let content_type = header_value(headers, "content-type");
    let date = if headers.contains_key("x-amz-date") {
        ""
    } else {
        header_value(headers, "date")
    };

    let amz_headers = build_canonicalized_amz_headers(headers);
    let resource = build_canonicalized_resource(resource_path, query);

    format!("{method}\n{content_md5}\n{content_type}\n{date}\n{amz_headers}{resource}")
}

/// `x-amz-*` headers, lowercased and sorted, one `name:value\n` line each.
fn build_canonicalized_amz_headers(headers: &HeaderMap) -> String {
    let mut amz_headers: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (name, value) in headers {
        if name.as_str().starts_with("x-amz-") {
            amz_headers
                .entry(name.as_str())
                .or_default()
                .push(value.to_str().unwrap_or("").trim());
        }
    }

    amz_headers
        .iter()
        .map(|(name, values)| format!("{name}:{}\n", values.join(",")))
        .collect()
}

/// Resource path plus the sorted sub-resource parameters from `query`.
///
/// ```
/// use strato_auth::sigv2::build_canonicalized_resource;
///
/// assert_eq!(
///     build_canonicalized_resource("/bucket/key", "uploadId=abc&partNumber=2&max-parts=5"),
///     "/bucket/key?partNumber=2&uploadId=abc"
/// );
/// assert_eq!(build_canonicalized_resource("/bucket/key", "uploads="), "/bucket/key?uploads");
/// ```
#[must_use]
pub fn build_canonicalized_resource(resource_path: &str, query: &str) -> String {
    let mut sub_params: Vec<(&str, Option<String>)> = query
        .split('&')
        .filter(|param| !param.is_empty())
        .map(|param| match param.split_once('=') {
            Some((k, v)) => {
                let decoded = percent_encoding::percent_decode_str(v)
                    .decode_utf8_lossy()
                    .into_owned();
                (k, (!decoded.is_empty()).then_some(decoded))
            }
            None => (param, None),
        })
        .filter(|(k, _)| SUB_RESOURCES.contains(k))
        .collect();

    if sub_params.is_empty() {
        return resource_path.to_owned();
    }

    sub_params.sort_by(|a, b| a.0.cmp(b.0));
    let params: Vec<String> = sub_params
        .into_iter()
        .map(|(k, v)| match v {
            Some(val) => format!("{k}={val}"),
            None => k.to_owned(),
        })
        .collect();
    format!("{resource_path}?{}", params.join("&"))
}

/// `/bucket/key` resource path for a bucket and an optional raw key.
#[must_use]
pub fn resource_path(bucket: &str, key: Option<&str>) -> String {
    match key {
        Some(key) => {
            let encoded: Vec<String> = key.split('/').map(uri_encode).collect();
            format!("/{bucket}/{}", encoded.join("/"))
        }
        None => format!("/{bucket}/"),
    }
}

fn compute_sigv2_signature(secret_key: &str, string_to_sign: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(secret_key.as_bytes()).expect("HMAC can accept any key length");
    mac.update(string_to_sign.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}
