//! Upload pipeline for `PUT /{key}`.
//!
//! Stages run in order and the first failing gate rejects the request:
//! 1. global admission (board full)
//! 2. structural checks (key, body, required headers, meta tag)
//! 3. conflict and per-key difficulty against an existing board
//! 4. body size and per-header validation, including the signature
//! 5. commit to disk, then to the index
//!
//! Stages 1-4 have no side effects. Stages 3-5 run under the key's lock.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};

use crate::board::key::BoardKey;
use crate::board::store::{self, body_digest};
use crate::board::{
    days_to_live, difficulty, headers, meta_tag, parse_http_date, Board, BoardMeta,
    MAX_CONTENT_LENGTH,
};
use crate::error::BoardError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    Updated,
}

/// Validate and store an uploaded board.
pub async fn put_board(
    state: &AppState,
    key_hex: &str,
    body: Bytes,
    request_headers: &HeaderMap,
    now: DateTime<Utc>,
) -> Result<PutOutcome, BoardError> {
    let occupancy = state.index.len();
    check_admission(occupancy)?;

    if body.is_empty() || key_hex.is_empty() {
        return Err(BoardError::malformed("key and body are required"));
    }
    let key = BoardKey::parse(key_hex, now)
        .ok_or_else(|| BoardError::malformed("key is malformed or outside its validity window"))?;
    if let Some(missing) = headers::first_missing(request_headers) {
        return Err(BoardError::malformed(format!("missing {} header", missing)));
    }
    let modified = meta_tag::last_modified(&body)
        .ok_or_else(|| BoardError::malformed("missing or invalid last-modified meta tag"))?;

    let guard = state.index.lock_key(key.as_str()).await;

    // New keys are gated only by the global check above; the per-key
    // threshold applies to updates.
    let existing = state.index.get(key.as_str());
    if let Some(existing) = &existing {
        if let Some(stored) = existing.if_unmodified_since() {
            if modified <= stored {
                return Err(BoardError::Conflict);
            }
            let claimed = request_headers
                .get("if-unmodified-since")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_http_date);
            if claimed.is_some_and(|claimed| claimed <= stored) {
                return Err(BoardError::Conflict);
            }
        }
        if !difficulty::key_under_threshold(&key, occupancy) {
            return Err(BoardError::Throttled(
                "key is above the current difficulty threshold".into(),
            ));
        }
    }

    if body.len() > MAX_CONTENT_LENGTH {
        return Err(BoardError::TooLarge {
            size: body.len(),
            max: MAX_CONTENT_LENGTH,
        });
    }
    headers::validate(
        request_headers,
        &body,
        &key,
        state.verifier.as_ref(),
        now,
    )?;

    let meta = BoardMeta {
        headers: record_headers(request_headers),
        ingest: now,
        body_sha256: body_digest(&body),
    };
    let anchor = meta
        .headers
        .get("if-unmodified-since")
        .and_then(|v| parse_http_date(v))
        .unwrap_or(now);

    let mut board = Board::new(body, meta);
    board.days_ttl = Some(days_to_live(anchor, now));

    let board_store = state.store.clone();
    let index = state.index.clone();
    let key_for_store = key.as_str().to_string();
    let replaced = store::run_blocking(state.io_timeout, move || {
        let _guard = guard;
        board_store.write_board(&key_for_store, &board.body, &board.meta)?;
        Ok(index.upsert(&key_for_store, board))
    })
    .await?;

    if replaced {
        tracing::info!("Updated board {}", key);
        Ok(PutOutcome::Updated)
    } else {
        tracing::info!("Created board {} ({} boards)", key, state.index.len());
        Ok(PutOutcome::Created)
    }
}

/// Global gate: refuse every write once the board is full.
fn check_admission(occupancy: usize) -> Result<(), BoardError> {
    if difficulty::board_is_full(occupancy) {
        return Err(BoardError::Throttled("board is full".into()));
    }
    Ok(())
}

/// Request headers as stored in metadata. Repeated headers are comma-joined.
fn record_headers(request_headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut recorded: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in request_headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        recorded
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    recorded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::testing::{board_html, signed_headers, test_key, test_state};
    use crate::board::{MAX_BOARDS, TTL_DAYS};
    use axum::http::HeaderValue;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_create_then_update() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let key = test_key("01", now());

        let earlier = now() - Duration::minutes(5);
        let body = board_html(earlier, "first");
        let outcome = put_board(&state, &key, body.clone(), &signed_headers(&key, &body, earlier), now())
            .await
            .unwrap();
        assert_eq!(outcome, PutOutcome::Created);

        let body2 = board_html(now(), "second");
        let outcome = put_board(&state, &key, body2.clone(), &signed_headers(&key, &body2, now()), now())
            .await
            .unwrap();
        assert_eq!(outcome, PutOutcome::Updated);

        let stored = state.index.get(&key).unwrap();
        assert_eq!(stored.body, body2);
        assert_eq!(stored.days_ttl, Some(TTL_DAYS));
        assert_eq!(stored.meta.ingest, now());
        assert!(state.store.read_board(&key).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_identical_resubmission_conflicts() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let key = test_key("02", now());
        let body = board_html(now(), "same");
        let headers = signed_headers(&key, &body, now());

        put_board(&state, &key, body.clone(), &headers, now()).await.unwrap();
        let err = put_board(&state, &key, body, &headers, now()).await.unwrap_err();
        assert!(matches!(err, BoardError::Conflict));
    }

    #[tokio::test]
    async fn test_stale_update_conflicts_even_with_bad_signature() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let key = test_key("03", now());
        let body = board_html(now(), "current");
        put_board(&state, &key, body.clone(), &signed_headers(&key, &body, now()), now())
            .await
            .unwrap();

        let older = now() - Duration::hours(1);
        let stale = board_html(older, "stale");
        let mut headers = signed_headers(&key, &stale, older);
        headers.insert("authorization", HeaderValue::from_static("Spring-83 Signature=00"));
        let err = put_board(&state, &key, stale, &headers, now()).await.unwrap_err();
        assert!(matches!(err, BoardError::Conflict));
    }

    #[tokio::test]
    async fn test_newer_meta_with_stale_header_conflicts() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let key = test_key("04", now());
        let body = board_html(now(), "current");
        put_board(&state, &key, body.clone(), &signed_headers(&key, &body, now()), now())
            .await
            .unwrap();

        let body2 = board_html(now() + Duration::seconds(1), "meta only");
        let err = put_board(&state, &key, body2.clone(), &signed_headers(&key, &body2, now()), now())
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::Conflict));
    }

    #[tokio::test]
    async fn test_oversized_claim_is_too_large() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let key = test_key("05", now());
        let body = board_html(now(), &"x".repeat(400));
        let mut headers = signed_headers(&key, &body, now());
        headers.insert("content-length", HeaderValue::from_static("3000"));

        let err = put_board(&state, &key, body, &headers, now()).await.unwrap_err();
        assert!(matches!(err, BoardError::TooLarge { size: 3000, .. }));
        assert!(state.index.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_body_is_too_large() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let key = test_key("06", now());
        let body = board_html(now(), &"x".repeat(MAX_CONTENT_LENGTH));
        let mut headers = signed_headers(&key, &body, now());
        headers.remove("content-length");

        let err = put_board(&state, &key, body, &headers, now()).await.unwrap_err();
        assert!(matches!(err, BoardError::TooLarge { .. }));
    }

    #[tokio::test]
    async fn test_oversized_body_reports_earlier_failures_first() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let key = test_key("09", now());
        let padding = "x".repeat(MAX_CONTENT_LENGTH + 100);

        let big = board_html(now(), &padding);
        let mut headers = signed_headers(&key, &big, now());
        headers.remove("content-length");

        let err = put_board(&state, "deadbeef", big.clone(), &headers, now()).await.unwrap_err();
        assert!(matches!(err, BoardError::Malformed(_)));

        let mut unsigned = headers.clone();
        unsigned.remove("authorization");
        let err = put_board(&state, &key, big.clone(), &unsigned, now()).await.unwrap_err();
        assert!(matches!(err, BoardError::Malformed(_)));

        let current = board_html(now(), "current");
        put_board(&state, &key, current.clone(), &signed_headers(&key, &current, now()), now())
            .await
            .unwrap();
        let older = now() - Duration::hours(1);
        let stale_big = board_html(older, &padding);
        let mut stale_headers = signed_headers(&key, &stale_big, older);
        stale_headers.remove("content-length");
        let err = put_board(&state, &key, stale_big, &stale_headers, now()).await.unwrap_err();
        assert!(matches!(err, BoardError::Conflict));
        assert_eq!(state.index.get(&key).unwrap().body, current);
    }

    #[tokio::test]
    async fn test_concurrent_identical_uploads_commit_once() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let key = test_key("0a", now());
        let first = board_html(now(), "first writer");
        let second = board_html(now(), "second writer");
        let first_headers = signed_headers(&key, &first, now());
        let second_headers = signed_headers(&key, &second, now());

        let (a, b) = tokio::join!(
            put_board(&state, &key, first.clone(), &first_headers, now()),
            put_board(&state, &key, second.clone(), &second_headers, now()),
        );

        let results = [a, b];
        let created = results
            .iter()
            .filter(|r| matches!(r, Ok(PutOutcome::Created)))
            .count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(BoardError::Conflict)))
            .count();
        assert_eq!((created, conflicts), (1, 1));

        let indexed = state.index.get(&key).unwrap();
        let stored = state.store.read_board(&key).unwrap().unwrap();
        assert_eq!(indexed.body, stored.body);
        assert!(indexed.body == first || indexed.body == second);
    }

    #[tokio::test]
    async fn test_structural_failures_are_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let key = test_key("07", now());
        let body = board_html(now(), "hello");
        let headers = signed_headers(&key, &body, now());

        let err = put_board(&state, &key, Bytes::new(), &headers, now()).await.unwrap_err();
        assert!(matches!(err, BoardError::Malformed(_)));

        let err = put_board(&state, "deadbeef", body.clone(), &headers, now()).await.unwrap_err();
        assert!(matches!(err, BoardError::Malformed(_)));

        let mut missing = headers.clone();
        missing.remove("spring-version");
        let err = put_board(&state, &key, body.clone(), &missing, now()).await.unwrap_err();
        assert!(matches!(err, BoardError::Malformed(_)));

        let no_meta = Bytes::from_static(b"<p>no meta tag</p>");
        let err = put_board(&state, &key, no_meta.clone(), &signed_headers(&key, &no_meta, now()), now())
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::Malformed(_)));

        assert!(state.index.is_empty());
        assert!(state.store.load_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_signature_is_unauthorized() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        let key = test_key("08", now());
        let body = board_html(now(), "hello");
        let other = board_html(now(), "something else");

        let err = put_board(&state, &key, body, &signed_headers(&key, &other, now()), now())
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::Unauthorized(_)));
        assert!(state.index.is_empty());
    }

    #[test]
    fn test_full_board_is_throttled() {
        assert!(check_admission(0).is_ok());
        assert!(check_admission(MAX_BOARDS - 1).is_ok());
        assert!(matches!(
            check_admission(MAX_BOARDS),
            Err(BoardError::Throttled(_))
        ));
    }

    #[tokio::test]
    async fn test_update_above_threshold_is_throttled() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path());
        // Leading 64 bits all ones never clear `u64::MAX * (1 - factor)`.
        let key = test_key("ffffffffffffffff", now());

        let earlier = now() - Duration::minutes(5);
        let body = board_html(earlier, "first");
        let outcome = put_board(&state, &key, body.clone(), &signed_headers(&key, &body, earlier), now())
            .await
            .unwrap();
        assert_eq!(outcome, PutOutcome::Created);

        let body2 = board_html(now(), "second");
        let err = put_board(&state, &key, body2.clone(), &signed_headers(&key, &body2, now()), now())
            .await
            .unwrap_err();
        assert!(matches!(err, BoardError::Throttled(_)));
    }

    #[test]
    fn test_record_headers_joins_repeats() {
        let mut headers = HeaderMap::new();
        headers.append("x-tag", HeaderValue::from_static("a"));
        headers.append("x-tag", HeaderValue::from_static("b"));
        headers.insert("content-type", HeaderValue::from_static("text/html;charset=utf-8"));

        let recorded = record_headers(&headers);
        assert_eq!(recorded.get("x-tag").map(String::as_str), Some("a, b"));
        assert_eq!(
            recorded.get("content-type").map(String::as_str),
            Some("text/html;charset=utf-8")
        );
    }
}
