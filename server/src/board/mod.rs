//! Board admission and lifecycle engine.
//!
//! A board is one signed HTML document published under a self-certifying
//! public key. The server keeps the newest document per key, serves it to
//! readers, and forgets it `TTL_DAYS` after its last update.
//!
//! Storage layout: `{content_dir}/{key}.html` plus `{content_dir}/{key}.json`
//! (recorded headers, ingest time, document digest).

pub mod difficulty;
pub mod headers;
pub mod index;
pub mod key;
pub mod listing;
pub mod meta_tag;
pub mod pipeline;
pub mod routes;
pub mod signature;
pub mod store;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::BTreeMap;

use axum::body::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Maximum document size in bytes.
pub const MAX_CONTENT_LENGTH: usize = 2217;

/// Occupancy at which the board refuses all new writes.
pub const MAX_BOARDS: usize = 10_000_000;

/// Days a board survives without being refreshed.
pub const TTL_DAYS: i64 = 22;

/// How far into the future an `If-Unmodified-Since` claim may reach.
pub const FUTURE_FUDGE_SECS: i64 = 6;

pub const CONTENT_TYPE: &str = "text/html;charset=utf-8";
pub const SPRING_VERSION: &str = "83";

pub const SPRING_VERSION_HEADER: &str = "spring-version";
pub const SPRING_SIGNATURE_HEADER: &str = "spring-signature";
pub const SPRING_DIFFICULTY_HEADER: &str = "spring-difficulty";

/// Prefix of the `Authorization` header value, followed by `=<hex signature>`.
pub const SIGNATURE_PREAMBLE: &str = "Spring-83 Signature";

/// Hosted boards may not run scripts or embed anything except `data:` images.
pub const BOARD_CSP: &str = "default-src 'none'; style-src 'self' 'unsafe-inline'; font-src 'self'; \
script-src 'none'; object-src 'none'; frame-src 'none'; img-src data:; \
form-action *; connect-src 'none'";

/// Metadata persisted next to each document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardMeta {
    /// Every request header recorded at ingest, lowercased names.
    pub headers: BTreeMap<String, String>,
    /// Server-observed acceptance time. Diagnostic only.
    pub ingest: DateTime<Utc>,
    /// Hex SHA-256 of the document, used to detect torn writes on reload.
    pub body_sha256: String,
}

/// A stored board.
#[derive(Debug, Clone)]
pub struct Board {
    pub body: Bytes,
    pub meta: BoardMeta,
    /// Whole days left before eviction, refreshed by the sweeper. Display only.
    pub days_ttl: Option<i64>,
}

impl Board {
    pub fn new(body: Bytes, meta: BoardMeta) -> Self {
        Self {
            body,
            meta,
            days_ttl: None,
        }
    }

    /// The stored `If-Unmodified-Since`, which is both the board's version and its TTL anchor.
    pub fn if_unmodified_since(&self) -> Option<DateTime<Utc>> {
        self.meta
            .headers
            .get("if-unmodified-since")
            .and_then(|v| parse_http_date(v))
    }

    /// Hex signature extracted from the stored `Authorization` header.
    pub fn signature_hex(&self) -> Option<&str> {
        self.meta
            .headers
            .get("authorization")
            .and_then(|v| headers::signature_from_authorization(v))
    }
}

/// Start of the retention window: boards last updated before this are expired.
pub fn ttl_horizon(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(TTL_DAYS)
}

/// Rounded days between `stamp` and the TTL horizon.
pub fn days_to_live(stamp: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let remaining = stamp - ttl_horizon(now);
    (remaining.num_milliseconds() as f64 / Duration::days(1).num_milliseconds() as f64).round()
        as i64
}

/// Parse an HTTP date (`Tue, 14 Dec 2021 05:23:29 GMT`).
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format an instant as an HTTP date.
pub fn format_http_date(stamp: DateTime<Utc>) -> String {
    stamp.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_http_date_roundtrip() {
        let stamp = Utc.with_ymd_and_hms(2021, 12, 14, 5, 23, 29).unwrap();
        let formatted = format_http_date(stamp);
        assert_eq!(formatted, "Tue, 14 Dec 2021 05:23:29 GMT");
        assert_eq!(parse_http_date(&formatted), Some(stamp));
    }

    #[test]
    fn test_parse_http_date_rejects_garbage() {
        assert_eq!(parse_http_date("yesterday"), None);
        assert_eq!(parse_http_date(""), None);
    }

    #[test]
    fn test_days_to_live() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        assert_eq!(days_to_live(now, now), TTL_DAYS);
        assert_eq!(days_to_live(now - Duration::days(21), now), 1);
        assert_eq!(days_to_live(ttl_horizon(now), now), 0);
        assert_eq!(days_to_live(now - Duration::hours(12), now), 22);
    }
}
