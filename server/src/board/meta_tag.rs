//! Extraction of the `<meta http-equiv="last-modified">` tag every board carries.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

static LAST_MODIFIED_META: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)<meta\s+http-equiv\s*=\s*["']?last-modified["']?\s+content\s*=\s*["']([^"']+)["']\s*/?>"#,
    )
    .expect("meta tag regex is valid")
});

/// Timestamp declared by the document's last-modified meta tag, if any.
pub fn last_modified(body: &[u8]) -> Option<DateTime<Utc>> {
    let html = std::str::from_utf8(body).ok()?;
    let content = LAST_MODIFIED_META.captures(html)?.get(1)?.as_str();
    DateTime::parse_from_rfc3339(content.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
