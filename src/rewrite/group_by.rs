// src/rewrite/group_by.rs

use crate::error::{Result, RewriteError};
use crate::plan::expr::Expr;
use crate::plan::node::LogicalPlan;
use crate::rewrite::context::Compensation;

////////////////////////////////////////////////////////////////////////////////
// Group-By Matcher
////////////////////////////////////////////////////////////////////////////////

/// Coverage test between the query's grouping+aggregate expression list and
/// the view's.
///
/// The query cannot demand more grouping detail than the view retained, so
/// `query.len() > view.len()` is an immediate non-match. Every query element
/// must be semantically present in `view` (matched on value, not position),
/// and every column referenced anywhere in `query` must appear among the
/// column references of the view's top-level output list — a query cannot
/// reach a column the view does not expose.
///
/// On success the residual is the *entire* query list: the view is consumed
/// as a pre-grouped relation and the query's own grouping is reproduced
/// against it. When the grains coincide the re-grouping is redundant but
/// harmless.
pub fn match_grouping(
    view_plan: &LogicalPlan,
    query: &[Expr],
    view: &[Expr],
) -> Result<Compensation> {
    for expr in query.iter().chain(view) {
        if let Some(column) = expr.find_unbound() {
            return Err(RewriteError::UnresolvedInput { column });
        }
    }

    if query.len() > view.len() {
        return Ok(Compensation::not_applicable());
    }

    for query_expr in query {
        if !view.iter().any(|v| v.semantic_eq(query_expr)) {
            return Ok(Compensation::not_applicable());
        }
    }

    // Columns exposed by the view's output list.
    let mut exposed = Vec::new();
    for expr in view_plan.output_exprs() {
        expr.column_refs(&mut exposed);
    }
    let mut referenced = Vec::new();
    for expr in query {
        expr.column_refs(&mut referenced);
    }
    for col in &referenced {
        if !exposed.iter().any(|e| e.semantic_eq(col)) {
            return Ok(Compensation::not_applicable());
        }
    }

    Ok(Compensation::of(query.to_vec()))
}
