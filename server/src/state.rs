use std::sync::Arc;
use std::time::Duration;

use crate::board::index::BoardIndex;
use crate::board::signature::SignatureVerifier;
use crate::board::store::BoardStore;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Live boards, the single source of truth for admission and listing
    pub index: Arc<BoardIndex>,
    /// Document and metadata files under the content directory
    pub store: BoardStore,
    /// Signature check applied to every upload
    pub verifier: Arc<dyn SignatureVerifier>,
    /// Externally advertised hostname, shown on the index page
    pub fqdn: String,
    /// Optional operator contact, shown on the index page
    pub contact_email: Option<String>,
    /// Upper bound on any single storage operation
    pub io_timeout: Duration,
}
