//! Request signing for calls to cluster nodes.
//!
//! A node accepts a request when its `Authorization` header carries
//! `system admin:<signature>`, where the signature is the base64
//! HMAC-SHA1 of six newline-joined fields:
//!
//! ```text
//! METHOD
//! application/json          (accept, fixed)
//! CONTENT_MD5               (base64 md5 of the JSON body, or empty)
//! CONTENT_TYPE
//! DATE                      (RFC 1123, GMT)
//! PATH                      (including the query string)
//! ```
//!
//! POST, PUT and PATCH carry a JSON body and its MD5. Every other method
//! sends no body: its fields are folded into the query string instead and
//! the MD5 field is empty.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use http::header::{AUTHORIZATION, CONTENT_TYPE, DATE, HeaderName};
use http::{HeaderMap, HeaderValue, Method};
use serde_json::Value;
use sha1::Sha1;
use tracing::debug;

use crate::error::SignError;
use crate::query;

type HmacSha1 = Hmac<Sha1>;

/// Accept value covered by the signature.
pub const ACCEPT: &str = "application/json";

/// Content type used when the request does not set one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Prefix of the `Authorization` header value.
pub const AUTH_PREFIX: &str = "system admin:";

/// `Content-MD5` header name.
pub const CONTENT_MD5: HeaderName = HeaderName::from_static("content-md5");

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// An outbound request before signing.
#[derive(Debug, Clone, Default)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Path with optional query string, e.g. `/api/apps?ips=10.0.0.1`.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A request ready to send: final path, auth headers and encoded body.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    /// JSON body, only for methods that carry one.
    pub body: Option<Bytes>,
    pub signature: String,
}

/// Sign a request with the current time.
pub fn sign(request: &RequestDescriptor, secret: &str) -> Result<SignedRequest, SignError> {
    sign_at(request, secret, Utc::now())
}

/// Sign a request as of `date`.
///
/// Identical inputs at the same second always give the same signature.
pub fn sign_at(
    request: &RequestDescriptor,
    secret: &str,
    date: DateTime<Utc>,
) -> Result<SignedRequest, SignError> {
    if secret.is_empty() {
        return Err(SignError::MissingSecret);
    }

    let date = http_date(date);
    let content_type = match request.headers.get(CONTENT_TYPE) {
        Some(value) => value
            .to_str()
            .map_err(|_| SignError::InvalidHeader("content-type"))?
            .to_string(),
        None => DEFAULT_CONTENT_TYPE.to_string(),
    };

    let (path, body, md5) = if carries_body(&request.method) {
        let bytes = match &request.body {
            Some(body) if !body.is_null() => Bytes::from(serde_json::to_vec(body)?),
            _ => Bytes::new(),
        };
        let md5 = content_md5(&bytes);
        (request.path.clone(), Some(bytes).filter(|b| !b.is_empty()), md5)
    } else {
        let path = match &request.body {
            Some(body) => query::merge_into_path(&request.path, body),
            None => request.path.clone(),
        };
        (path, None, String::new())
    };

    let to_sign = string_to_sign(&request.method, &md5, &content_type, &date, &path);
    debug!(string_to_sign = %to_sign.escape_debug(), %path, "signing cluster request");
    let signature = signature(&to_sign, secret)?;

    let mut headers = request.headers.clone();
    headers.insert(CONTENT_TYPE, header_value(&content_type, "content-type")?);
    headers.insert(CONTENT_MD5, header_value(&md5, "content-md5")?);
    headers.insert(DATE, header_value(&date, "date")?);
    headers.insert(
        AUTHORIZATION,
        header_value(&format!("{AUTH_PREFIX}{signature}"), "authorization")?,
    );

    Ok(SignedRequest {
        method: request.method.clone(),
        path,
        headers,
        body,
        signature,
    })
}

/// Check a received request the way a cluster node does.
///
/// `path` is the request path with its query string as received.
pub fn verify(
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    body: &[u8],
    secret: &str,
) -> Result<(), SignError> {
    if secret.is_empty() {
        return Err(SignError::MissingSecret);
    }

    let auth = header_str(headers, AUTHORIZATION, "authorization")?;
    let given = auth
        .strip_prefix(AUTH_PREFIX)
        .ok_or(SignError::InvalidHeader("authorization"))?;
    let given = BASE64
        .decode(given)
        .map_err(|_| SignError::InvalidHeader("authorization"))?;

    let date = header_str(headers, DATE, "date")?;
    let content_type = header_str(headers, CONTENT_TYPE, "content-type")?;
    let md5 = headers
        .get(CONTENT_MD5)
        .map(|v| v.to_str().map_err(|_| SignError::InvalidHeader("content-md5")))
        .transpose()?
        .unwrap_or_default();

    let expected_md5 = if carries_body(method) {
        content_md5(body)
    } else {
        String::new()
    };
    if md5 != expected_md5 {
        return Err(SignError::ContentMd5Mismatch);
    }

    let to_sign = string_to_sign(method, md5, content_type, date, path);
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| SignError::MissingSecret)?;
    mac.update(to_sign.as_bytes());
    mac.verify_slice(&given).map_err(|_| SignError::BadSignature)
}

/// The six newline-joined fields covered by the signature.
pub fn string_to_sign(
    method: &Method,
    content_md5: &str,
    content_type: &str,
    date: &str,
    path: &str,
) -> String {
    format!("{method}\n{ACCEPT}\n{content_md5}\n{content_type}\n{date}\n{path}")
}

/// Base64 HMAC-SHA1 of `to_sign` keyed by `secret`.
pub fn signature(to_sign: &str, secret: &str) -> Result<String, SignError> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| SignError::MissingSecret)?;
    mac.update(to_sign.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Base64 MD5 digest, as sent in `Content-MD5`.
pub fn content_md5(body: &[u8]) -> String {
    BASE64.encode(md5::compute(body).0)
}

/// RFC 1123 date in GMT, e.g. `Mon, 19 Oct 2026 08:30:00 GMT`.
pub fn http_date(date: DateTime<Utc>) -> String {
    date.format(HTTP_DATE_FORMAT).to_string()
}

fn carries_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

fn header_value(value: &str, name: &'static str) -> Result<HeaderValue, SignError> {
    HeaderValue::from_str(value).map_err(|_| SignError::InvalidHeader(name))
}

fn header_str<'a>(
    headers: &'a HeaderMap,
    key: HeaderName,
    name: &'static str,
) -> Result<&'a str, SignError> {
    headers
        .get(key)
        .ok_or(SignError::MissingHeader(name))?
        .to_str()
        .map_err(|_| SignError::InvalidHeader(name))
}
