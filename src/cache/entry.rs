//! Cached response values and the HTTP caching metadata parsed from them.

use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};

use crate::types::{Headers, Response};

/// Parsed `Cache-Control` directives relevant to this pipeline.
///
/// Directives this crate does not act on (e.g. `s-maxage`, `stale-while-revalidate`)
/// are intentionally not represented; add them here if a future policy needs them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheControlDirectives {
    /// `max-age=N`, in seconds.
    pub max_age: Option<u64>,
    /// `no-cache` — entry may be stored but must be revalidated before use.
    pub no_cache: bool,
    /// `no-store` — entry must never be written to storage.
    pub no_store: bool,
    /// `must-revalidate` — a stale entry must not be served without revalidation.
    pub must_revalidate: bool,
    /// `public`.
    pub public: bool,
    /// `private`.
    pub private: bool,
}

impl CacheControlDirectives {
    /// Parse a raw `Cache-Control` header value.
    pub fn parse(value: &str) -> Self {
        let mut directives = Self::default();
        for part in value.split(',') {
            let part = part.trim();
            let mut pieces = part.splitn(2, '=');
            let name = pieces.next().unwrap_or("").trim().to_ascii_lowercase();
            let arg = pieces.next().map(str::trim);
            match name.as_str() {
                "max-age" => directives.max_age = arg.and_then(|a| a.parse().ok()),
                "no-cache" => directives.no_cache = true,
                "no-store" => directives.no_store = true,
                "must-revalidate" => directives.must_revalidate = true,
                "public" => directives.public = true,
                "private" => directives.private = true,
                _ => {}
            }
        }
        directives
    }
}

/// Parse an `Expires` header value in any of the three formats RFC 7231
/// grandfathers in: RFC 1123, RFC 850, and ANSI C `asctime`.
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    let formats = [
        "%a, %d %b %Y %H:%M:%S GMT", // RFC 1123
        "%A, %d-%b-%y %H:%M:%S GMT", // RFC 850
        "%a %b %e %H:%M:%S %Y",      // ANSI C asctime
    ];
    for format in formats {
        if let Ok(parsed) = DateTime::parse_from_str(value, format) {
            return Some(SystemTime::from(parsed));
        }
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(value, format) {
            let utc = DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc);
            return Some(SystemTime::from(utc));
        }
    }
    None
}

/// A response plus the bookkeeping the cache needs to decide freshness and
/// build conditional revalidation requests.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached response.
    pub response: Response,
    /// When this entry was stored (or last revalidated).
    pub timestamp: SystemTime,
    /// When this entry was last read, used by the hybrid storage's LRU.
    pub last_accessed: SystemTime,
    /// `ETag` response header, if present.
    pub etag: Option<String>,
    /// `Last-Modified` response header, if present.
    pub last_modified: Option<String>,
    /// Absolute expiration instant, computed once at store time.
    pub expires_at: Option<SystemTime>,
    /// Parsed `Cache-Control` directives from the stored response.
    pub directives: CacheControlDirectives,
}

impl CacheEntry {
    /// Build an entry from a freshly received response, computing expiry and
    /// extracting caching metadata. Returns `None` if the response carries
    /// `Cache-Control: no-store` and must never be written.
    pub fn from_response(response: Response, now: SystemTime) -> Option<Self> {
        let directives = response
            .headers()
            .get("cache-control")
            .map(CacheControlDirectives::parse)
            .unwrap_or_default();

        if directives.no_store {
            return None;
        }

        let expires_at = directives
            .max_age
            .map(|secs| now + Duration::from_secs(secs))
            .or_else(|| {
                response
                    .headers()
                    .get("expires")
                    .and_then(parse_http_date)
            });

        let etag = response.headers().get("etag").map(str::to_string);
        let last_modified = response.headers().get("last-modified").map(str::to_string);

        Some(Self {
            response,
            timestamp: now,
            last_accessed: now,
            etag,
            last_modified,
            expires_at,
            directives,
        })
    }

    /// Fresh if `now` is still before the explicit expiry, or (when no
    /// expiry was recorded) within `default_ttl` of the store timestamp.
    pub fn is_fresh(&self, now: SystemTime, default_ttl: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => now
                .duration_since(self.timestamp)
                .map(|age| age < default_ttl)
                .unwrap_or(true),
        }
    }

    /// Build the conditional-request headers for a revalidation attempt.
    pub fn conditional_headers(&self) -> Headers {
        let mut headers = Headers::new();
        if let Some(etag) = &self.etag {
            headers.insert("If-None-Match", etag.clone());
        }
        if let Some(last_modified) = &self.last_modified {
            headers.insert("If-Modified-Since", last_modified.clone());
        }
        headers
    }
}
