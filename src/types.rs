//! Core request/response value types shared across the pipeline.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// PATCH
    Patch,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
}

impl Method {
    /// Returns the wire representation, e.g. `"GET"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }

    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, case-insensitive-on-lookup header collection.
///
/// Insertion order is preserved for emission; lookups normalize the header
/// name to lowercase, matching how most HTTP servers treat header names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header, preserving the first-seen position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let key = name.to_ascii_lowercase();
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|(n, _)| n.to_ascii_lowercase() == key)
        {
            existing.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Insert a header only if absent.
    pub fn insert_if_absent(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if self.get(&name).is_none() {
            self.insert(name, value);
        }
    }

    /// Look up a header value by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        let key = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| n.to_ascii_lowercase() == key)
            .map(|(_, v)| v.as_str())
    }

    /// True if the header set has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Merge `other` under `self`: entries already present in `self` win.
    pub fn merge_under(&mut self, other: &Headers) {
        for (name, value) in other.iter() {
            self.insert_if_absent(name.to_string(), value.to_string());
        }
    }
}

impl From<HashMap<String, String>> for Headers {
    fn from(map: HashMap<String, String>) -> Self {
        let mut headers = Headers::new();
        for (k, v) in map {
            headers.insert(k, v);
        }
        headers
    }
}

/// One named part of a [`Body::Multipart`] body.
#[derive(Debug, Clone)]
pub struct MultipartPart {
    /// Form field name.
    pub name: String,
    /// Filename to advertise, if this part represents a file.
    pub filename: Option<String>,
    /// `Content-Type` of this part's bytes.
    pub content_type: String,
    /// Part body.
    pub bytes: Bytes,
}

impl MultipartPart {
    /// Build a part carrying `bytes` under `name`.
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Attach a filename, as for a file upload field.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// An already-encoded request body plus its content type.
#[derive(Debug, Clone)]
pub enum Body {
    /// Raw bytes with an explicit content type.
    Raw {
        /// Body bytes.
        bytes: Bytes,
        /// `Content-Type` value to attach.
        content_type: String,
    },
    /// `application/x-www-form-urlencoded` key/value pairs.
    Form(Vec<(String, String)>),
    /// Pre-serialized JSON bytes.
    Json(Bytes),
    /// `multipart/form-data` parts.
    Multipart(Vec<MultipartPart>),
}

/// Derive a boundary string from the parts themselves, so encoding stays a
/// pure function of its input rather than depending on randomness or time.
fn multipart_boundary(parts: &[MultipartPart]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.name.as_bytes());
        hasher.update(part.content_type.as_bytes());
        hasher.update(part.bytes.len().to_le_bytes());
    }
    format!("netpipe-{}", hex::encode(&hasher.finalize()[..16]))
}

impl Body {
    /// Encode this body into wire bytes and its content type.
    pub fn encode(&self) -> (Bytes, String) {
        match self {
            Body::Raw { bytes, content_type } => (bytes.clone(), content_type.clone()),
            Body::Json(bytes) => (bytes.clone(), "application/json".to_string()),
            Body::Form(pairs) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs)
                    .finish();
                (
                    Bytes::from(encoded.into_bytes()),
                    "application/x-www-form-urlencoded".to_string(),
                )
            }
            Body::Multipart(parts) => {
                let boundary = multipart_boundary(parts);
                let mut buf = Vec::new();
                for part in parts {
                    buf.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
                    let mut disposition =
                        format!("Content-Disposition: form-data; name=\"{}\"", part.name);
                    if let Some(filename) = &part.filename {
                        disposition.push_str(&format!("; filename=\"{filename}\""));
                    }
                    buf.extend_from_slice(disposition.as_bytes());
                    buf.extend_from_slice(
                        format!("\r\nContent-Type: {}\r\n\r\n", part.content_type).as_bytes(),
                    );
                    buf.extend_from_slice(&part.bytes);
                    buf.extend_from_slice(b"\r\n");
                }
                buf.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
                (
                    Bytes::from(buf),
                    format!("multipart/form-data; boundary={boundary}"),
                )
            }
        }
    }
}

/// Request caching policy. See the cache interceptor for semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Serve a fresh cached response if present; otherwise fetch and store.
    #[default]
    UseCache,
    /// Bypass the cache entirely; always fetch; still store the result.
    IgnoreCache,
    /// Always attempt conditional revalidation against the origin.
    Revalidate,
    /// Defer to the stored entry's own `Cache-Control` directives.
    RespectHeaders,
}

/// Scheduling hint a transport may use to prioritize among in-flight calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Priority {
    /// Background work.
    Low,
    /// Default priority.
    #[default]
    Normal,
    /// User-interactive work.
    High,
}

/// An immutable outbound request.
#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) headers: Headers,
    pub(crate) body: Option<Body>,
    pub(crate) timeout: Option<std::time::Duration>,
    pub(crate) cache_policy: CachePolicy,
    pub(crate) priority: Priority,
}

impl Request {
    /// Start building a request for `method` against `url`.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
            timeout: None,
            cache_policy: CachePolicy::default(),
            priority: Priority::default(),
        }
    }

    /// Convenience constructor for a `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Set the request body.
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a single header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the per-request timeout override.
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the cache policy for this request.
    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Set the scheduling priority for this request.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Absolute or relative URL as supplied by the caller.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable access to request headers, used by interceptors.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Request body, if any.
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Per-request timeout override, if any.
    pub fn timeout(&self) -> Option<std::time::Duration> {
        self.timeout
    }

    /// Cache policy for this request.
    pub fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }

    /// Scheduling priority for this request.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns a copy of this request with a replaced URL, used when resolving
    /// against a base URL.
    pub(crate) fn with_url(mut self, url: String) -> Self {
        self.url = url;
        self
    }
}

/// An immutable response value.
#[derive(Clone)]
pub struct Response {
    pub(crate) request: Request,
    pub(crate) status: u16,
    pub(crate) headers: Headers,
    pub(crate) body: Option<Bytes>,
}

impl Response {
    /// Build a response value directly, carrying a reference to the request
    /// that produced it; used by interceptors that synthesize responses
    /// (cache hits, short-circuits) as well as by transports.
    pub fn new(request: Request, status: u16, headers: Headers, body: Option<Bytes>) -> Self {
        Self {
            request,
            status,
            headers,
            body,
        }
    }

    /// The request that produced this response.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Response body bytes, if any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// True if `status` is in `[200, 300)`.
    pub fn is_successful(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("request_url", &self.request.url)
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.as_ref().map(|b| b.len()))
            .finish()
    }
}
