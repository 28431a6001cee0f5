//! Public key identifiers with an embedded expiry.
//!
//! A key is 32 bytes of Ed25519 public key, hex encoded, whose last seven hex
//! characters read `83e` followed by `MMYY`. The key stops being usable at the
//! end of month `MM` of year `20YY`, and is refused if that instant is more
//! than two years away.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use regex::Regex;

static KEY_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-f]{57}83e(0[1-9]|1[0-2])(\d\d)$").expect("key format regex is valid")
});

/// Length of the validity window in months.
const VALIDITY_MONTHS: u32 = 24;

/// A format-valid, in-window board key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoardKey {
    hex: String,
    bytes: [u8; 32],
    month: u32,
    year: i32,
}

impl BoardKey {
    /// Parse a key the way the server does. Returns `None` on any failure.
    pub fn parse(key_hex: &str, now: DateTime<Utc>) -> Option<Self> {
        Self::parse_with(key_hex, now, false)
    }

    /// Parse a key requiring it to be the freshest one mintable right now:
    /// its expiry falls on the first day of the current month, two years on.
    pub fn parse_strict(key_hex: &str, now: DateTime<Utc>) -> Option<Self> {
        Self::parse_with(key_hex, now, true)
    }

    fn parse_with(key_hex: &str, now: DateTime<Utc>, strict: bool) -> Option<Self> {
        let hex_str = key_hex.to_ascii_lowercase();
        let caps = KEY_FORMAT.captures(&hex_str)?;
        let month: u32 = caps.get(1)?.as_str().parse().ok()?;
        let year = 2000 + caps.get(2)?.as_str().parse::<i32>().ok()?;

        let expires_at = expiry_instant(month, year)?;
        if expires_at <= now {
            return None;
        }
        let ceiling = now.checked_add_months(Months::new(VALIDITY_MONTHS))?;
        if expires_at > ceiling {
            return None;
        }
        if strict {
            let this_month = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)?
                .checked_add_months(Months::new(VALIDITY_MONTHS))?;
            if expires_at.date_naive() != this_month {
                return None;
            }
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&hex_str, &mut bytes).ok()?;

        Some(Self {
            hex: hex_str,
            bytes,
            month,
            year,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.hex
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// End of the encoded month, after which the key is dead.
    pub fn expires_at(&self) -> DateTime<Utc> {
        // Constructed from a regex-checked month, so always representable.
        expiry_instant(self.month, self.year).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl fmt::Display for BoardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

/// Whether `key_hex` has the right shape, ignoring the validity window.
pub fn is_well_formed(key_hex: &str) -> bool {
    KEY_FORMAT.is_match(key_hex)
}

/// First instant of the month after `month`/`year`.
fn expiry_instant(month: u32, year: i32) -> Option<DateTime<Utc>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = first.checked_add_months(Months::new(1))?;
    Some(Utc.from_utc_datetime(&next.and_hms_opt(0, 0, 0)?))
}

/// Build a key string with the given 57-character hex body and expiry tag.
#[cfg(test)]
pub(crate) fn key_with_tag(body: &str, month: u32, year: i32) -> String {
    format!("{}83e{:02}{:02}", body, month, year % 100)
}
