//! Server-rendered index page for `GET /`.
//!
//! Lists held boards by key prefix with their remaining days, plus the
//! operator details and current difficulty.

use crate::board::index::BoardSummary;
use crate::board::TTL_DAYS;

/// Characters of the key shown as the board's short name.
const DISPLAY_PREFIX_LEN: usize = 12;

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub fn display_prefix(key: &str) -> &str {
    key.get(..DISPLAY_PREFIX_LEN).unwrap_or(key)
}

/// Render the server's index page: who runs it and which boards it holds.
pub fn render_index(
    fqdn: &str,
    contact_email: Option<&str>,
    difficulty: f64,
    boards: &[BoardSummary],
) -> String {
    let contact = contact_email
        .map(|email| {
            let email = html_escape(email);
            format!(r#"<p>Contact: <a href="mailto:{email}">{email}</a></p>"#)
        })
        .unwrap_or_default();

    let rows: String = boards
        .iter()
        .map(|board| {
            let key = html_escape(&board.key);
            let days = board
                .days_ttl
                .map(|d| d.to_string())
                .unwrap_or_else(|| "?".to_string());
            format!(
                "        <li><a href=\"/{key}\" title=\"{key}\"><code>{prefix}</code></a> <span class=\"ttl\">{days} days left</span></li>\n",
                key = key,
                prefix = html_escape(display_prefix(&board.key)),
                days = days,
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{fqdn}</title>
    <style>
        body {{ font-family: ui-monospace, Menlo, monospace; max-width: 40rem; margin: 2rem auto; padding: 0 1rem; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ margin: 0.25rem 0; }}
        .ttl {{ color: #777; }}
    </style>
</head>
<body>
    <h1>{fqdn}</h1>
    <p>{count} boards held for up to {ttl} days. Difficulty {difficulty:.6}.</p>
    {contact}
    <ul>
{rows}    </ul>
</body>
</html>"#,
        fqdn = html_escape(fqdn),
        count = boards.len(),
        ttl = TTL_DAYS,
        difficulty = difficulty,
        contact = contact,
        rows = rows,
    )
}
