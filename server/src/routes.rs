use axum::{extract::DefaultBodyLimit, Router};

use crate::board::routes as board_routes;
use crate::board::MAX_CONTENT_LENGTH;
use crate::state::AppState;

/// Bodies beyond this are cut off before reaching the upload pipeline, which
/// enforces the protocol limit itself.
const BODY_LIMIT_BYTES: usize = MAX_CONTENT_LENGTH * 4;

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let board_routes = Router::new()
        .route("/", axum::routing::get(board_routes::list_boards_route))
        .route(
            "/{key}",
            axum::routing::get(board_routes::get_board_route)
                .put(board_routes::put_board_route)
                .options(board_routes::preflight_route),
        )
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES));

    // Health check
    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(board_routes)
        .merge(health)
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
