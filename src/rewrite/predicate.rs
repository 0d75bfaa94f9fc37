// src/rewrite/predicate.rs

use crate::error::{Result, RewriteError};
use crate::plan::expr::Expr;
use crate::rewrite::context::Compensation;

////////////////////////////////////////////////////////////////////////////////
// Expression/Predicate Matcher
////////////////////////////////////////////////////////////////////////////////

/// Subsumption test between the query's filter conjuncts `query` and the
/// view's filter conjuncts `view` (both already AND-flattened).
///
/// The view covers the query iff every view conjunct is semantically present
/// among the query's conjuncts — the view's restriction is no stricter than
/// the query's. The residual is then `query − view` (set difference under
/// semantic equality, order preserved from `query`): the extra filter to
/// re-apply on top of the view scan.
///
/// An unresolved column reference in either input violates the analyzed-plan
/// precondition and is reported as an error, not as "no match".
pub fn match_conjuncts(query: &[Expr], view: &[Expr]) -> Result<Compensation> {
    for conjunct in query.iter().chain(view) {
        if let Some(column) = conjunct.find_unbound() {
            return Err(RewriteError::UnresolvedInput { column });
        }
    }

    for view_conjunct in view {
        if !query.iter().any(|q| q.semantic_eq(view_conjunct)) {
            return Ok(Compensation::not_applicable());
        }
    }

    let residual = query
        .iter()
        .filter(|q| !view.iter().any(|v| v.semantic_eq(q)))
        .cloned()
        .collect();
    Ok(Compensation::of(residual))
}
