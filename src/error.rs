// src/error.rs

use thiserror::Error;

/// Errors surfaced by the catalog and the rewrite engine.
///
/// "View does not cover this query" is never an error; matchers report that
/// through the not-applicable [`Compensation`](crate::rewrite::context::Compensation)
/// sentinel and the driver falls back to the unmodified subtree.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// An unresolved column reference reached a matcher. The engine's input
    /// contract is an analyzed, fully bound plan; this is a violation of that
    /// precondition upstream, not a matching outcome.
    #[error("unresolved column reference '{column}' in analyzed plan")]
    UnresolvedInput { column: String },

    /// A view was registered under a name that is already taken.
    #[error("view '{name}' is already registered")]
    DuplicateView { name: String },
}

pub type Result<T> = std::result::Result<T, RewriteError>;
