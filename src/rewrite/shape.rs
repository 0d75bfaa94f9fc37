// src/rewrite/shape.rs

use crate::plan::node::{JoinType, LogicalPlan};

////////////////////////////////////////////////////////////////////////////////
// Canonical-Shape Classifier
////////////////////////////////////////////////////////////////////////////////

/// Decide whether `plan` is an SPJG candidate the rewriter may consider.
///
/// Pure structural test. A plan containing, anywhere in its subtree, a
/// `SubqueryAlias` directly wrapping a `Projection`, any `Union`, or a
/// non-inner join is never a candidate, regardless of its root shape.
pub fn is_eligible(plan: &LogicalPlan) -> bool {
    if has_blocked_shape(plan) {
        return false;
    }
    use LogicalPlan::*;
    match plan {
        Projection { input, .. } => match input.as_ref() {
            Join { .. } => true,
            Filter { .. } => true,
            SubqueryAlias { input: inner, .. } => matches!(inner.as_ref(), Scan { .. }),
            _ => false,
        },
        Aggregate { input, .. } => match input.as_ref() {
            Join { .. } => true,
            Filter { .. } => true,
            SubqueryAlias { input: inner, .. } => matches!(inner.as_ref(), Scan { .. }),
            _ => false,
        },
        _ => false,
    }
}

/// True if the subtree contains a shape the rewriter never touches.
fn has_blocked_shape(plan: &LogicalPlan) -> bool {
    use LogicalPlan::*;
    match plan {
        Union { .. } => true,
        SubqueryAlias { input, .. } => {
            matches!(input.as_ref(), Projection { .. }) || has_blocked_shape(input)
        }
        Join {
            left,
            right,
            join_type,
            ..
        } => {
            *join_type != JoinType::Inner || has_blocked_shape(left) || has_blocked_shape(right)
        }
        Scan { .. } => false,
        Filter { input, .. } | Projection { input, .. } | Aggregate { input, .. } => {
            has_blocked_shape(input)
        }
    }
}
