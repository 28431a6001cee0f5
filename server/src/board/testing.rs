//! Fixtures shared by the board unit tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue};
use chrono::{DateTime, Datelike, Months, SecondsFormat, Utc};
use sha2::{Digest, Sha512};

use crate::board::index::BoardIndex;
use crate::board::signature::SignatureVerifier;
use crate::board::store::BoardStore;
use crate::board::{
    format_http_date, CONTENT_TYPE, SIGNATURE_PREAMBLE, SPRING_VERSION, SPRING_VERSION_HEADER,
};
use crate::state::AppState;

/// Signature scheme for tests: SHA-512 of `public_key || message`.
///
/// Format-valid keys have to be mined, so tests cannot hold real Ed25519 key
/// pairs for them.
pub struct DigestVerifier;

impl SignatureVerifier for DigestVerifier {
    fn verify(&self, signature: &[u8], message: &[u8], public_key: &[u8]) -> bool {
        signature == digest_signature(public_key, message).as_slice()
    }
}

pub fn digest_signature(public_key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut hasher = Sha512::new();
    hasher.update(public_key);
    hasher.update(message);
    hasher.finalize().to_vec()
}

pub fn test_state(dir: &Path) -> AppState {
    AppState {
        index: Arc::new(BoardIndex::new()),
        store: BoardStore::open(dir).unwrap(),
        verifier: Arc::new(DigestVerifier),
        fqdn: "board.test".to_string(),
        contact_email: None,
        io_timeout: Duration::from_secs(5),
    }
}

/// A key starting with `prefix` that stays valid for a year after `now`.
pub fn test_key(prefix: &str, now: DateTime<Utc>) -> String {
    let expiry = now.checked_add_months(Months::new(12)).unwrap();
    format!(
        "{}{}83e{:02}{:02}",
        prefix,
        "0".repeat(57 - prefix.len()),
        expiry.month(),
        expiry.year() % 100
    )
}

pub fn board_html(modified: DateTime<Utc>, text: &str) -> Bytes {
    Bytes::from(format!(
        "<meta http-equiv=\"last-modified\" content=\"{}\">\n<p>{}</p>",
        modified.to_rfc3339_opts(SecondsFormat::Secs, true),
        text
    ))
}

pub fn signed_headers(key: &str, body: &[u8], if_unmodified_since: DateTime<Utc>) -> HeaderMap {
    let key_bytes = hex::decode(key).unwrap();
    let signature = hex::encode(digest_signature(&key_bytes, body));

    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static(CONTENT_TYPE));
    headers.insert(SPRING_VERSION_HEADER, HeaderValue::from_static(SPRING_VERSION));
    headers.insert(
        "if-unmodified-since",
        HeaderValue::from_str(&format_http_date(if_unmodified_since)).unwrap(),
    );
    headers.insert(
        "authorization",
        HeaderValue::from_str(&format!("{}={}", SIGNATURE_PREAMBLE, signature)).unwrap(),
    );
    headers.insert(
        "content-length",
        HeaderValue::from_str(&body.len().to_string()).unwrap(),
    );
    headers
}
