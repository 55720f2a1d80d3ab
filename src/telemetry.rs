//! Span helpers for the `tracing` feature.
//!
//! Call sites enter these spans with `let _span = ...entered();` so the span covers the rest of
//! the enclosing scope. Without the feature nothing here is compiled and the crate logs through
//! the `log` facade only.

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    /// Longest statement prefix recorded on a query span
    const STATEMENT_PREVIEW_LEN: usize = 120;

    fn preview(query: &str) -> &str {
        let trimmed = query.trim();
        match trimmed.char_indices().nth(STATEMENT_PREVIEW_LEN) {
            Some((idx, _)) => &trimmed[..idx],
            None => trimmed,
        }
    }

    pub fn execute_query_span(query: &str) -> Span {
        info_span!("tidemark.execute", statement = preview(query))
    }

    pub fn acquire_connection_span() -> Span {
        info_span!("tidemark.connect")
    }

    pub fn begin_transaction_span() -> Span {
        info_span!("tidemark.transaction.begin")
    }

    pub fn commit_transaction_span() -> Span {
        info_span!("tidemark.transaction.commit")
    }

    pub fn rollback_transaction_span() -> Span {
        info_span!("tidemark.transaction.rollback")
    }

    /// Span covering one migration unit: action, ledger write and commit
    pub fn migration_span(identifier: &str, direction: &'static str) -> Span {
        info_span!("tidemark.migrate", identifier, direction)
    }

    /// Span covering one batch operation (`up`, `down`, `up_to`, `down_to`)
    pub fn batch_span(operation: &str) -> Span {
        info_span!("tidemark.batch", operation)
    }

}
