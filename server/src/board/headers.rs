//! Per-header validation table for board uploads.
//!
//! Each known header maps to either an exact expected value or a computed
//! check. Headers not in the table pass through unchecked. Rules run in table
//! order and the first failure wins.

use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};

use crate::board::key::BoardKey;
use crate::board::signature::SignatureVerifier;
use crate::board::{
    parse_http_date, CONTENT_TYPE, FUTURE_FUDGE_SECS, MAX_CONTENT_LENGTH, SIGNATURE_PREAMBLE,
    SPRING_VERSION, SPRING_VERSION_HEADER,
};
use crate::error::BoardError;

/// Headers that must be present on every upload.
pub const REQUIRED_HEADERS: &[&str] = &[
    "content-type",
    SPRING_VERSION_HEADER,
    "if-unmodified-since",
    "authorization",
];

/// Everything a computed rule may look at.
pub struct HeaderContext<'a> {
    /// All values sent for the header under test, in request order.
    pub values: Vec<&'a str>,
    pub body: &'a [u8],
    pub key: &'a BoardKey,
    pub verifier: &'a dyn SignatureVerifier,
    pub now: DateTime<Utc>,
}

pub type ComputedRule = fn(&HeaderContext<'_>) -> Result<(), BoardError>;

pub enum HeaderRule {
    Exact(&'static str),
    Computed(ComputedRule),
}

pub struct HeaderValidator {
    pub name: &'static str,
    pub rule: HeaderRule,
}

/// The upload validation table. Size comes first so an oversized claim is
/// always reported as such.
pub const VALIDATORS: &[HeaderValidator] = &[
    HeaderValidator {
        name: "content-length",
        rule: HeaderRule::Computed(check_content_length),
    },
    HeaderValidator {
        name: "content-type",
        rule: HeaderRule::Exact(CONTENT_TYPE),
    },
    HeaderValidator {
        name: SPRING_VERSION_HEADER,
        rule: HeaderRule::Exact(SPRING_VERSION),
    },
    HeaderValidator {
        name: "if-unmodified-since",
        rule: HeaderRule::Computed(check_if_unmodified_since),
    },
    HeaderValidator {
        name: "authorization",
        rule: HeaderRule::Computed(check_authorization),
    },
];

/// Name of the first required header missing from `headers`, if any.
pub fn first_missing(headers: &HeaderMap) -> Option<&'static str> {
    REQUIRED_HEADERS
        .iter()
        .copied()
        .find(|name| !headers.contains_key(*name))
}

/// Run every applicable rule against the request headers.
pub fn validate(
    headers: &HeaderMap,
    body: &[u8],
    key: &BoardKey,
    verifier: &dyn SignatureVerifier,
    now: DateTime<Utc>,
) -> Result<(), BoardError> {
    for validator in VALIDATORS {
        if !headers.contains_key(validator.name) {
            continue;
        }
        let mut values = Vec::new();
        for value in headers.get_all(validator.name) {
            let value = value.to_str().map_err(|_| {
                BoardError::malformed(format!("{} is not valid ASCII", validator.name))
            })?;
            values.push(value);
        }

        match &validator.rule {
            HeaderRule::Exact(expected) => {
                if values.iter().any(|v| v != expected) {
                    return Err(BoardError::malformed(format!(
                        "{} must be {}",
                        validator.name, expected
                    )));
                }
            }
            HeaderRule::Computed(check) => check(&HeaderContext {
                values,
                body,
                key,
                verifier,
                now,
            })?,
        }
    }
    Ok(())
}

/// Pull the hex signature out of `Spring-83 Signature=<hex>`.
pub fn signature_from_authorization(value: &str) -> Option<&str> {
    let (preamble, signature) = value.trim().split_once('=')?;
    if preamble.trim() != SIGNATURE_PREAMBLE {
        return None;
    }
    let signature = signature.trim();
    if signature.is_empty() || !signature.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(signature)
}

fn single<'a>(ctx: &HeaderContext<'a>, name: &str) -> Result<&'a str, BoardError> {
    match ctx.values.as_slice() {
        [value] => Ok(*value),
        _ => Err(BoardError::malformed(format!("{} must be sent exactly once", name))),
    }
}

fn check_content_length(ctx: &HeaderContext<'_>) -> Result<(), BoardError> {
    for value in &ctx.values {
        // Non-numeric lengths are left to the HTTP layer.
        if let Ok(size) = value.trim().parse::<usize>() {
            if size > MAX_CONTENT_LENGTH {
                return Err(BoardError::TooLarge {
                    size,
                    max: MAX_CONTENT_LENGTH,
                });
            }
        }
    }
    Ok(())
}

fn check_if_unmodified_since(ctx: &HeaderContext<'_>) -> Result<(), BoardError> {
    let raw = single(ctx, "if-unmodified-since")?;
    let stamp = parse_http_date(raw)
        .ok_or_else(|| BoardError::malformed("if-unmodified-since is not an HTTP date"))?;
    if stamp > ctx.now + Duration::seconds(FUTURE_FUDGE_SECS) {
        return Err(BoardError::malformed("if-unmodified-since is in the future"));
    }
    Ok(())
}

fn check_authorization(ctx: &HeaderContext<'_>) -> Result<(), BoardError> {
    let raw = single(ctx, "authorization")
        .map_err(|_| BoardError::Unauthorized("authorization must be sent exactly once".into()))?;
    let signature_hex = signature_from_authorization(raw)
        .ok_or_else(|| BoardError::Unauthorized("malformed authorization header".into()))?;
    let signature = hex::decode(signature_hex)
        .map_err(|_| BoardError::Unauthorized("signature is not hex".into()))?;

    if !ctx
        .verifier
        .verify(&signature, ctx.body, ctx.key.as_bytes())
    {
        return Err(BoardError::Unauthorized("signature does not verify".into()));
    }
    Ok(())
}
