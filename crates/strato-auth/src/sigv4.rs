//! AWS Signature Version 4.
//!
//! Signing ([`sign_request`]) and verification ([`verify_sigv4`]) share every
//! step of the derivation:
//!
//! 1. Canonical request from method, path, query, signed headers and payload hash.
//! 2. String to sign from the timestamp, credential scope and canonical request hash.
//! 3. Signing key from the secret and the scope (`date/region/s3/aws4_request`).
//! 4. Hex HMAC-SHA256 of the string to sign.
//!
//! Verification compares signatures in constant time.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use hmac::{Hmac, KeyInit, Mac};
use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::canonical::{build_canonical_request, build_signed_headers_string};
use crate::credentials::{CredentialProvider, Credentials};
use crate::error::AuthError;

/// The only algorithm supported by this implementation.
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Payload hash used when the body is streamed or not signed.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Service name in the credential scope.
pub const SERVICE: &str = "s3";

/// `x-amz-date` timestamp format.
pub const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

type HmacSha256 = Hmac<Sha256>;

/// Inputs that identify who signs and when.
#[derive(Debug, Clone, Copy)]
pub struct SigningParams<'a> {
    /// Credentials to sign with.
    pub credentials: &'a Credentials,
    /// Region name placed in the credential scope.
    pub region: &'a str,
    /// Signing instant.
    pub time: DateTime<Utc>,
}

impl SigningParams<'_> {
    /// `YYYYMMDDTHHMMSSZ` form of the signing instant.
    #[must_use]
    pub fn timestamp(&self) -> String {
        self.time.format(AMZ_DATE_FORMAT).to_string()
    }

    /// `YYYYMMDD` form of the signing instant.
    #[must_use]
    pub fn date(&self) -> String {
        self.time.format("%Y%m%d").to_string()
    }

    /// `date/region/s3/aws4_request`.
    #[must_use]
    pub fn credential_scope(&self) -> String {
        format!("{}/{}/{SERVICE}/aws4_request", self.date(), self.region)
    }

    /// Signing key for this scope.
    #[must_use]
    pub fn signing_key(&self) -> Vec<u8> {
        derive_signing_key(
            self.credentials.secret_access_key(),
            &self.date(),
            self.region,
            SERVICE,
        )
    }
}

/// The result of a successful verification.
#[derive(Debug, Clone)]
pub struct AuthResult {
    /// The access key ID that signed the request.
    pub access_key_id: String,
    /// The region from the credential scope (empty for SigV2).
    pub region: String,
    /// The service from the credential scope.
    pub service: String,
    /// The headers covered by the signature.
    pub signed_headers: Vec<String>,
}

/// Parsed components of a SigV4 `Authorization` header.
#[derive(Debug, Clone)]
pub struct ParsedAuth {
    /// The signing algorithm.
    pub algorithm: String,
    /// The access key ID.
    pub access_key_id: String,
    /// The scope date (YYYYMMDD).
    pub date: String,
    /// The scope region.
    pub region: String,
    /// The scope service.
    pub service: String,
    /// Signed header names (lowercase).
    pub signed_headers: Vec<String>,
    /// Hex signature.
    pub signature: String,
}

/// Sign a request in place.
///
/// Sets `host` (from the URI when absent), `x-amz-date`,
/// `x-amz-content-sha256`, `x-amz-security-token` (when the credentials carry
/// one) and `authorization`. The signature covers `host`, `content-type`,
/// `content-md5` and every `x-amz-*` header present.
///
/// # Errors
///
/// Returns [`AuthError::MissingHost`] when the request has neither a `host`
/// header nor an authority in its URI.
pub fn sign_request(
    parts: &mut http::request::Parts,
    payload_hash: &str,
    params: &SigningParams<'_>,
) -> Result<(), AuthError> {
    ensure_host(parts)?;

    let timestamp = params.timestamp();
    set_header(&mut parts.headers, "x-amz-date", &timestamp)?;
    set_header(&mut parts.headers, "x-amz-content-sha256", payload_hash)?;
    if let Some(token) = params.credentials.session_token() {
        set_header(&mut parts.headers, "x-amz-security-token", token)?;
    }

    let names = signable_header_names(&parts.headers);
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let pairs = header_pairs(&parts.headers, &name_refs);

    let canonical_request = build_canonical_request(
        parts.method.as_str(),
        parts.uri.path(),
        parts.uri.query().unwrap_or(""),
        &pairs,
        &name_refs,
        payload_hash,
    );
    let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));

    let scope = params.credential_scope();
    let string_to_sign = build_string_to_sign(&timestamp, &scope, &canonical_hash);
    let signature = compute_signature(&params.signing_key(), &string_to_sign);

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope},SignedHeaders={},Signature={signature}",
        params.credentials.access_key_id(),
        build_signed_headers_string(&name_refs),
    );
    set_header(&mut parts.headers, "authorization", &authorization)?;

    debug!(
        method = %parts.method,
        path = parts.uri.path(),
        scope = %scope,
        "signed request with SigV4"
    );
    Ok(())
}

/// Parse an `Authorization` header value of the form
/// `AWS4-HMAC-SHA256 Credential=..., SignedHeaders=..., Signature=...`.
///
/// # Errors
///
/// Returns [`AuthError::InvalidAuthHeader`] for a malformed value,
/// [`AuthError::UnsupportedAlgorithm`] for any other algorithm and
/// [`AuthError::InvalidCredential`] for a malformed credential scope.
pub fn parse_authorization_header(header: &str) -> Result<ParsedAuth, AuthError> {
    let (algorithm, rest) = header.split_once(' ').ok_or(AuthError::InvalidAuthHeader)?;

    if algorithm != ALGORITHM {
        return Err(AuthError::UnsupportedAlgorithm(algorithm.to_owned()));
    }

    let mut credential = None;
    let mut signed_headers = None;
    let mut signature = None;

    for part in rest.split(',') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix("Credential=") {
            credential = Some(value);
        } else if let Some(value) = part.strip_prefix("SignedHeaders=") {
            signed_headers = Some(value);
        } else if let Some(value) = part.strip_prefix("Signature=") {
            signature = Some(value);
        }
    }

    let credential = credential.ok_or(AuthError::InvalidAuthHeader)?;
    let signed_headers = signed_headers.ok_or(AuthError::InvalidAuthHeader)?;
    let signature = signature.ok_or(AuthError::InvalidAuthHeader)?;

    let scope: Vec<&str> = credential.splitn(5, '/').collect();
    if scope.len() != 5 || scope[4] != "aws4_request" {
        return Err(AuthError::InvalidCredential);
    }

    Ok(ParsedAuth {
        algorithm: algorithm.to_owned(),
        access_key_id: scope[0].to_owned(),
        date: scope[1].to_owned(),
        region: scope[2].to_owned(),
        service: scope[3].to_owned(),
        signed_headers: signed_headers.split(';').map(ToOwned::to_owned).collect(),
        signature: signature.to_owned(),
    })
}

/// Build the SigV4 string to sign.
///
/// ```
/// use strato_auth::sigv4::build_string_to_sign;
///
/// let sts = build_string_to_sign("20130524T000000Z", "20130524/us-east-1/s3/aws4_request", "abc");
/// assert_eq!(sts, "AWS4-HMAC-SHA256\n20130524T000000Z\n20130524/us-east-1/s3/aws4_request\nabc");
/// ```
#[must_use]
pub fn build_string_to_sign(
    timestamp: &str,
    credential_scope: &str,
    canonical_request_hash: &str,
) -> String {
    format!("{ALGORITHM}\n{timestamp}\n{credential_scope}\n{canonical_request_hash}")
}

/// Derive the signing key with the HMAC-SHA256 chain
/// `"AWS4" + secret -> date -> region -> service -> "aws4_request"`.
#[must_use]
pub fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let date_key = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let date_region_key = hmac_sha256(&date_key, region.as_bytes());
    let date_region_service_key = hmac_sha256(&date_region_key, service.as_bytes());
    hmac_sha256(&date_region_service_key, b"aws4_request")
}

/// Hex HMAC-SHA256 of `data` under `signing_key`.
#[must_use]
pub fn compute_signature(signing_key: &[u8], data: &str) -> String {
    hex::encode(hmac_sha256(signing_key, data.as_bytes()))
}

/// Hex SHA-256 of a payload, the `x-amz-content-sha256` value for signed bodies.
///
/// ```
/// use strato_auth::sigv4::hash_payload;
///
/// assert_eq!(
///     hash_payload(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
#[must_use]
pub fn hash_payload(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Verify a SigV4 header-signed request.
///
/// `body_hash` is the payload hash the verifier expects; callers usually pass
/// the request's own `x-amz-content-sha256` after checking it against the body.
///
/// # Errors
///
/// Returns an [`AuthError`] when the header is missing or malformed, the key
/// is unknown, a signed header is absent, or the signature does not match.
pub fn verify_sigv4(
    parts: &http::request::Parts,
    body_hash: &str,
    credential_provider: &dyn CredentialProvider,
) -> Result<AuthResult, AuthError> {
    let auth_header = parts
        .headers
        .get(http::header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let parsed = parse_authorization_header(auth_header)?;
    let secret_key = credential_provider.get_secret_key(&parsed.access_key_id)?;
    let timestamp = required_header(parts, "x-amz-date")?;

    debug!(
        access_key_id = %parsed.access_key_id,
        date = %parsed.date,
        region = %parsed.region,
        "verifying SigV4 signature"
    );

    let signed_header_refs: Vec<&str> = parsed.signed_headers.iter().map(String::as_str).collect();
    for name in &signed_header_refs {
        if !parts.headers.contains_key(*name) {
            return Err(AuthError::MissingHeader((*name).to_owned()));
        }
    }
    let pairs = header_pairs(&parts.headers, &signed_header_refs);

    let canonical_request = build_canonical_request(
        parts.method.as_str(),
        parts.uri.path(),
        parts.uri.query().unwrap_or(""),
        &pairs,
        &signed_header_refs,
        body_hash,
    );
    let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));

    let credential_scope = format!(
        "{}/{}/{}/aws4_request",
        parsed.date, parsed.region, parsed.service
    );
    let string_to_sign = build_string_to_sign(timestamp, &credential_scope, &canonical_hash);
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
        debug!(canonical_request, "SigV4 signature mismatch");
        Err(AuthError::SignatureDoesNotMatch)
    }
}

/// Insert the `host` header from the URI authority when it is missing.
pub(crate) fn ensure_host(parts: &mut http::request::Parts) -> Result<(), AuthError> {
    if parts.headers.contains_key(http::header::HOST) {
        return Ok(());
    }
    let authority = parts.uri.authority().ok_or(AuthError::MissingHost)?;
    set_header(&mut parts.headers, "host", authority.as_str())
}

pub(crate) fn set_header(
    headers: &mut HeaderMap,
    name: &'static str,
    value: &str,
) -> Result<(), AuthError> {
    let value = HeaderValue::from_str(value).map_err(|_| AuthError::InvalidHeaderValue(name))?;
    headers.insert(HeaderName::from_static(name), value);
    Ok(())
}

fn required_header<'a>(parts: &'a http::request::Parts, name: &str) -> Result<&'a str, AuthError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AuthError::MissingHeader(name.to_owned()))
}

/// Header names that participate in a client signature, sorted and unique.
fn signable_header_names(headers: &HeaderMap) -> Vec<String> {
    headers
        .keys()
        .map(HeaderName::as_str)
        .filter(|name| {
            *name == "host"
                || *name == "content-type"
                || *name == "content-md5"
                || name.starts_with("x-amz-")
        })
        .map(ToOwned::to_owned)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Every value of the named headers; non-UTF-8 values sign as empty.
fn header_pairs<'a>(headers: &'a HeaderMap, names: &[&'a str]) -> Vec<(&'a str, &'a str)> {
    names
        .iter()
        .flat_map(|&name| {
            headers
                .get_all(name)
                .iter()
                .map(move |value| (name, value.to_str().unwrap_or("")))
        })
        .collect()
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
