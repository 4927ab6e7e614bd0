//! Pre-signed URLs for Signature Version 4.
//!
//! A pre-signed URL carries its authentication in the query string:
//!
//! - `X-Amz-Algorithm` - `AWS4-HMAC-SHA256`
//! - `X-Amz-Credential` - `AKID/date/region/s3/aws4_request`
//! - `X-Amz-Date` - signing instant (`YYYYMMDDTHHMMSSZ`)
//! - `X-Amz-Expires` - validity in seconds from `X-Amz-Date`
//! - `X-Amz-SignedHeaders` - always `host` here
//! - `X-Amz-Signature` - hex signature
//!
//! The payload hash is always `UNSIGNED-PAYLOAD`. Signing never looks at the
//! clock: the caller chooses `X-Amz-Date` and `X-Amz-Expires`, so the same
//! inputs always give the same URL.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::canonical::{
    build_canonical_headers, build_canonical_query_string, build_canonical_request,
    build_canonical_uri, build_signed_headers_string, encode_query,
};
use crate::credentials::CredentialProvider;
use crate::error::AuthError;
use crate::sigv4::{
    ALGORITHM, AMZ_DATE_FORMAT, AuthResult, SigningParams, UNSIGNED_PAYLOAD,
    build_string_to_sign, compute_signature, derive_signing_key,
};

/// Longest validity SigV4 accepts, seven days.
pub const MAX_EXPIRES_SECS: u64 = 604_800;

/// Parsed components from pre-signed URL query parameters.
#[derive(Debug, Clone)]
pub struct ParsedPresignedParams {
    /// The access key ID.
    pub access_key_id: String,
    /// The scope date (YYYYMMDD).
    pub date: String,
    /// The scope region.
    pub region: String,
    /// The scope service.
    pub service: String,
    /// The `X-Amz-Date` timestamp.
    pub timestamp: String,
    /// Validity in seconds.
    pub expires: u64,
    /// Signed header names.
    pub signed_headers: Vec<String>,
    /// Hex signature.
    pub signature: String,
}

/// Build a pre-signed URL for `method` on `uri`, valid for `expires_in`
/// seconds from `params.time`.
///
/// Any query already on `uri` must be encoded (see
/// [`encode_query`](crate::canonical::encode_query)) and is covered by the
/// signature. `expires_in` is clamped to [`MAX_EXPIRES_SECS`].
///
/// # Errors
///
/// Returns [`AuthError::MissingHost`] when `uri` is not absolute.
pub fn presign_url(
    method: &http::Method,
    uri: &http::Uri,
    params: &SigningParams<'_>,
    expires_in: u64,
) -> Result<String, AuthError> {
    let host = uri.authority().ok_or(AuthError::MissingHost)?.as_str();
    let scheme = uri.scheme_str().unwrap_or("https");
    let path = uri.path();

    let credential = format!(
        "{}/{}",
        params.credentials.access_key_id(),
        params.credential_scope()
    );
    let mut auth_params = vec![
        ("X-Amz-Algorithm", ALGORITHM.to_owned()),
        ("X-Amz-Credential", credential),
        ("X-Amz-Date", params.timestamp()),
        ("X-Amz-Expires", expires_in.min(MAX_EXPIRES_SECS).to_string()),
        ("X-Amz-SignedHeaders", "host".to_owned()),
    ];
    if let Some(token) = params.credentials.session_token() {
        auth_params.push(("X-Amz-Security-Token", token.to_owned()));
    }

    let auth_query = encode_query(&auth_params);
    let query = match uri.query() {
        Some(existing) if !existing.is_empty() => {
            build_canonical_query_string(&format!("{existing}&{auth_query}"))
        }
        _ => auth_query,
    };

    let canonical_request = build_canonical_request(
        method.as_str(),
        path,
        &query,
        &[("host", host)],
        &["host"],
        UNSIGNED_PAYLOAD,
    );
    let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
    let string_to_sign =
        build_string_to_sign(&params.timestamp(), &params.credential_scope(), &canonical_hash);
    let signature = compute_signature(&params.signing_key(), &string_to_sign);

    Ok(format!(
        "{scheme}://{host}{path}?{query}&X-Amz-Signature={signature}"
    ))
}

/// Parse pre-signed URL query parameters.
///
/// # Errors
///
/// Returns [`AuthError::MissingQueryParam`] if a parameter is absent or
/// malformed, [`AuthError::UnsupportedAlgorithm`] or
/// [`AuthError::InvalidCredential`].
pub fn parse_presigned_params(query: &str) -> Result<ParsedPresignedParams, AuthError> {
    let params: HashMap<String, String> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .filter_map(|param| {
            let (key, value) = param.split_once('=')?;
            Some((key.to_owned(), url_decode(value)))
        })
        .collect();

    let algorithm = required_param(&params, "X-Amz-Algorithm")?;
    if algorithm != ALGORITHM {
        return Err(AuthError::UnsupportedAlgorithm(algorithm));
    }

    let credential = required_param(&params, "X-Amz-Credential")?;
    let timestamp = required_param(&params, "X-Amz-Date")?;
    let expires = required_param(&params, "X-Amz-Expires")?
        .parse()
        .map_err(|_| AuthError::MissingQueryParam("X-Amz-Expires (invalid integer)".to_owned()))?;
    let signed_headers = required_param(&params, "X-Amz-SignedHeaders")?;
    let signature = required_param(&params, "X-Amz-Signature")?;

    let scope: Vec<&str> = credential.splitn(5, '/').collect();
    if scope.len() != 5 || scope[4] != "aws4_request" {
        return Err(AuthError::InvalidCredential);
    }

    Ok(ParsedPresignedParams {
        access_key_id: scope[0].to_owned(),
        date: scope[1].to_owned(),
        region: scope[2].to_owned(),
        service: scope[3].to_owned(),
        timestamp,
        expires,
        signed_headers: signed_headers.split(';').map(ToOwned::to_owned).collect(),
        signature,
    })
}

/// Verify a pre-signed request as of `now`.
///
/// # Errors
///
/// Returns [`AuthError::RequestExpired`] once `now` is past
/// `X-Amz-Date + X-Amz-Expires`, and the usual parse, lookup and mismatch
/// errors otherwise.
pub fn verify_presigned(
    parts: &http::request::Parts,
    credential_provider: &dyn CredentialProvider,
    now: DateTime<Utc>,
) -> Result<AuthResult, AuthError> {
    let query = parts.uri.query().unwrap_or("");
    let parsed = parse_presigned_params(query)?;

    debug!(
        access_key_id = %parsed.access_key_id,
        timestamp = %parsed.timestamp,
        expires = parsed.expires,
        "verifying presigned URL"
    );

    check_expiration(&parsed.timestamp, parsed.expires, now)?;

    let secret_key = credential_provider.get_secret_key(&parsed.access_key_id)?;

    let signed_header_refs: Vec<&str> = parsed.signed_headers.iter().map(String::as_str).collect();
    let mut header_pairs = Vec::with_capacity(signed_header_refs.len());
    for &name in &signed_header_refs {
        let value = parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AuthError::MissingHeader(name.to_owned()))?;
        header_pairs.push((name, value));
    }

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n\n{}\n{UNSIGNED_PAYLOAD}",
        parts.method.as_str(),
        build_canonical_uri(parts.uri.path()),
        query_without_signature(query),
        build_canonical_headers(&header_pairs, &signed_header_refs),
        build_signed_headers_string(&signed_header_refs),
    );
    let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));

    let credential_scope = format!(
        "{}/{}/{}/aws4_request",
        parsed.date, parsed.region, parsed.service
    );
    let string_to_sign =
        build_string_to_sign(&parsed.timestamp, &credential_scope, &canonical_hash);
    let signing_key =
        derive_signing_key(&secret_key, &parsed.date, &parsed.region, &parsed.service);
    let expected_signature = compute_signature(&signing_key, &string_to_sign);

    if parsed
        .signature
        .as_bytes()
        .ct_eq(expected_signature.as_bytes())
        .into()
    {
        Ok(AuthResult {
            access_key_id: parsed.access_key_id,
            region: parsed.region,
            service: parsed.service,
            signed_headers: parsed.signed_headers,
        })
    } else {
        debug!(canonical_request, "presigned URL signature mismatch");
        Err(AuthError::SignatureDoesNotMatch)
    }
}

fn query_without_signature(query: &str) -> String {
    let filtered: String = query
        .split('&')
        .filter(|param| !param.starts_with("X-Amz-Signature="))
        .collect::<Vec<_>>()
        .join("&");
    build_canonical_query_string(&filtered)
}

fn check_expiration(timestamp: &str, expires: u64, now: DateTime<Utc>) -> Result<(), AuthError> {
    let signed_at = NaiveDateTime::parse_from_str(timestamp, AMZ_DATE_FORMAT)
        .map_err(|_| AuthError::MissingQueryParam("X-Amz-Date (invalid format)".to_owned()))?;

    let expires = i64::try_from(expires).map_err(|_| AuthError::RequestExpired)?;
    let expiry = signed_at + chrono::Duration::seconds(expires);

    if now.naive_utc() > expiry {
        return Err(AuthError::RequestExpired);
    }
    Ok(())
}

fn url_decode(input: &str) -> String {
    percent_encoding::percent_decode_str(input)
        .decode_utf8_lossy()
        .into_owned()
}

fn required_param(params: &HashMap<String, String>, name: &str) -> Result<String, AuthError> {
    params
        .get(name)
        .cloned()
        .ok_or_else(|| AuthError::MissingQueryParam(name.to_owned()))
}
