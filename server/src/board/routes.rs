//! HTTP endpoints for boards.
//!
//! GET / — Index page listing held boards, with the current difficulty
//! PUT /{key} — Publish or update a board
//! GET /{key} — Fetch a board with its signature

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::board::key::BoardKey;
use crate::board::pipeline::{self, PutOutcome};
use crate::board::{
    difficulty, format_http_date, listing, parse_http_date, BOARD_CSP, CONTENT_TYPE,
    SPRING_DIFFICULTY_HEADER, SPRING_SIGNATURE_HEADER, SPRING_VERSION, SPRING_VERSION_HEADER,
};
use crate::error::BoardError;
use crate::state::AppState;

const SPRING_VERSION_NAME: HeaderName = HeaderName::from_static(SPRING_VERSION_HEADER);
const SPRING_SIGNATURE_NAME: HeaderName = HeaderName::from_static(SPRING_SIGNATURE_HEADER);
const SPRING_DIFFICULTY_NAME: HeaderName = HeaderName::from_static(SPRING_DIFFICULTY_HEADER);

const EXPOSED_HEADERS: &str = "content-type, last-modified, spring-signature, spring-version, spring-difficulty";

/// Headers every response from this server carries.
fn protocol_headers(headers: &mut HeaderMap) {
    headers.insert(SPRING_VERSION_NAME, HeaderValue::from_static(SPRING_VERSION));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSED_HEADERS),
    );
}

/// PUT /{key}
///
/// Body is the HTML document. Responds 201 for a new board, 200 for an update.
pub async fn put_board_route(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match pipeline::put_board(&state, &key, body, &headers, Utc::now()).await {
        Ok(outcome) => {
            let (status, text) = match outcome {
                PutOutcome::Created => (StatusCode::CREATED, "created"),
                PutOutcome::Updated => (StatusCode::OK, "updated"),
            };
            let mut response = (status, text).into_response();
            protocol_headers(response.headers_mut());
            response
        }
        Err(e) => {
            tracing::debug!("Rejected board {}: {}", key, e);
            let mut response = e.into_response();
            protocol_headers(response.headers_mut());
            response
        }
    }
}

/// GET /{key}
///
/// Returns the stored document with its signature, or 404. The signature is
/// served as recorded; it was verified on upload.
pub async fn get_board_route(
    State(state): State<AppState>,
    Path(key): Path<String>,
    request_headers: HeaderMap,
) -> Result<Response, BoardError> {
    let key = BoardKey::parse(&key, Utc::now()).ok_or(BoardError::NotFound)?;
    let board = state.index.get(key.as_str()).ok_or(BoardError::NotFound)?;
    if board.body.is_empty() {
        return Err(BoardError::NotFound);
    }
    let stamp = board.if_unmodified_since().ok_or(BoardError::NotFound)?;
    let signature = board
        .signature_hex()
        .and_then(|sig| HeaderValue::from_str(sig).ok())
        .ok_or(BoardError::NotFound)?;
    let last_modified =
        HeaderValue::from_str(&format_http_date(stamp)).map_err(|_| BoardError::NotFound)?;

    let not_modified = request_headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date)
        .is_some_and(|since| stamp <= since);

    let mut response = if not_modified {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        board.body.into_response()
    };

    let headers = response.headers_mut();
    protocol_headers(headers);
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
    headers.insert(header::LAST_MODIFIED, last_modified);
    headers.insert(SPRING_SIGNATURE_NAME, signature);
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(BOARD_CSP),
    );

    Ok(response)
}

/// GET /
///
/// Index page of held boards. Carries the difficulty factor but not the board
/// CSP, since this page is the server's own.
pub async fn list_boards_route(State(state): State<AppState>) -> Response {
    let occupancy = state.index.len();
    let factor = difficulty::current_factor(occupancy);
    let html = listing::render_index(
        &state.fqdn,
        state.contact_email.as_deref(),
        factor,
        &state.index.summaries(),
    );

    let mut response = html.into_response();
    let headers = response.headers_mut();
    protocol_headers(headers);
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
    if let Ok(value) = HeaderValue::from_str(&factor.to_string()) {
        headers.insert(SPRING_DIFFICULTY_NAME, value);
    }
    response
}

/// OPTIONS /{key}
///
/// CORS preflight so browser clients can publish.
pub async fn preflight_route() -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    let headers = response.headers_mut();
    protocol_headers(headers);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, PUT, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(
            "content-type, if-unmodified-since, if-modified-since, spring-version, authorization",
        ),
    );
    response
}
