// src/rewrite/driver.rs

use crate::catalog::view::{ViewCatalog, ViewDefinition};
use crate::error::{Result, RewriteError};
use crate::plan::expr::{ColumnId, Expr};
use crate::plan::node::LogicalPlan;
use crate::rewrite::context::{Compensation, RewriteContext};
use crate::rewrite::group_by;
use crate::rewrite::join::JoinGraph;
use crate::rewrite::predicate;
use crate::rewrite::shape;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Cap on whole-plan rewrite passes. Bounds pathological oscillation between
/// structurally-equal-but-not-reference-equal plans; hitting it is a defined
/// termination condition, not an error.
pub const MAX_REWRITE_PASSES: usize = 100;

////////////////////////////////////////////////////////////////////////////////
// SPJG decomposition
////////////////////////////////////////////////////////////////////////////////

/// An SPJG candidate pulled apart into the pieces the matchers consume.
#[derive(Debug)]
struct SpjgParts {
    /// Top-level output expression list (for an aggregate root: grouping
    /// expressions followed by aggregate expressions).
    output: Vec<Expr>,
    /// Grouping and aggregate lists when the root is an `Aggregate`.
    grouping: Option<(Vec<Expr>, Vec<Expr>)>,
    /// AND-flattened filter conjuncts, including non-equi join conjuncts.
    conjuncts: Vec<Expr>,
    graph: JoinGraph,
}

fn decompose(plan: &LogicalPlan) -> Option<SpjgParts> {
    let (output, grouping, body) = match plan {
        LogicalPlan::Projection { input, exprs } => (exprs.clone(), None, input.as_ref()),
        LogicalPlan::Aggregate {
            input,
            group_exprs,
            agg_exprs,
        } => (
            plan.output_exprs(),
            Some((group_exprs.clone(), agg_exprs.clone())),
            input.as_ref(),
        ),
        _ => return None,
    };
    let (mut conjuncts, source) = match body {
        LogicalPlan::Filter { input, predicate } => {
            (predicate.split_conjuncts(), input.as_ref())
        }
        other => (Vec::new(), other),
    };
    let mut graph = JoinGraph::from_plan(source);
    conjuncts.append(&mut graph.residual_conditions);
    Some(SpjgParts {
        output,
        grouping,
        conjuncts,
        graph,
    })
}

////////////////////////////////////////////////////////////////////////////////
// Rewrite Driver
////////////////////////////////////////////////////////////////////////////////

/// Walks a query plan bottom-up, replacing view-covered SPJG subtrees with a
/// view scan plus compensation, until a fixed point is reached.
pub struct Rewriter<'a> {
    catalog: &'a ViewCatalog,
}

impl<'a> Rewriter<'a> {
    pub fn new(catalog: &'a ViewCatalog) -> Self {
        Rewriter { catalog }
    }

    /// Entry point. Constructs a fresh context, iterates classify-and-rewrite
    /// passes to a fixed point (or the pass budget), then repairs column
    /// references that still point into replaced subtrees.
    pub fn rewrite(&self, plan: &LogicalPlan) -> Result<LogicalPlan> {
        let mut ctx = RewriteContext::new();
        let mut current = plan.clone();
        let mut converged = false;
        for pass in 0..MAX_REWRITE_PASSES {
            let next = self.rewrite_node(&current, &mut ctx)?;
            if next == current {
                converged = true;
                break;
            }
            debug!(pass, plan = %plan_json(&next), "rewrite pass changed plan");
            current = next;
        }
        if !converged {
            warn!(
                budget = MAX_REWRITE_PASSES,
                "rewrite did not converge within pass budget; returning last plan"
            );
        }
        if ctx.has_replacements() {
            current = current.map_exprs(&|e| remap_expr(e, &ctx));
        }
        Ok(current)
    }

    /// One bottom-up pass: children are rewritten first, then the rebuilt
    /// node is offered to the matchers if it has canonical shape.
    fn rewrite_node(&self, plan: &LogicalPlan, ctx: &mut RewriteContext) -> Result<LogicalPlan> {
        let rebuilt = match plan {
            LogicalPlan::Scan { .. } => plan.clone(),
            LogicalPlan::Filter { input, predicate } => LogicalPlan::Filter {
                input: Box::new(self.rewrite_node(input, ctx)?),
                predicate: predicate.clone(),
            },
            LogicalPlan::Projection { input, exprs } => LogicalPlan::Projection {
                input: Box::new(self.rewrite_node(input, ctx)?),
                exprs: exprs.clone(),
            },
            LogicalPlan::Join {
                left,
                right,
                join_type,
                condition,
            } => LogicalPlan::Join {
                left: Box::new(self.rewrite_node(left, ctx)?),
                right: Box::new(self.rewrite_node(right, ctx)?),
                join_type: *join_type,
                condition: condition.clone(),
            },
            LogicalPlan::Aggregate {
                input,
                group_exprs,
                agg_exprs,
            } => LogicalPlan::Aggregate {
                input: Box::new(self.rewrite_node(input, ctx)?),
                group_exprs: group_exprs.clone(),
                agg_exprs: agg_exprs.clone(),
            },
            LogicalPlan::SubqueryAlias { alias, input } => LogicalPlan::SubqueryAlias {
                alias: alias.clone(),
                input: Box::new(self.rewrite_node(input, ctx)?),
            },
            LogicalPlan::Union { inputs } => LogicalPlan::Union {
                inputs: inputs
                    .iter()
                    .map(|p| self.rewrite_node(p, ctx))
                    .collect::<Result<Vec<_>>>()?,
            },
        };

        if shape::is_eligible(&rebuilt) && !self.reads_from_view(&rebuilt) {
            if let Some(replacement) = self.try_views(&rebuilt, ctx)? {
                return Ok(replacement);
            }
        }
        Ok(rebuilt)
    }

    /// A subtree that already scans a registered view was rewritten earlier;
    /// rules never re-match it.
    fn reads_from_view(&self, plan: &LogicalPlan) -> bool {
        let mut tables = BTreeSet::new();
        plan.base_tables(&mut tables);
        tables.iter().any(|t| self.catalog.contains(t))
    }

    /// Try every registered view against the candidate, in registration
    /// order, running the rule families in fixed priority order. The first
    /// applicable result wins.
    fn try_views(
        &self,
        plan: &LogicalPlan,
        ctx: &mut RewriteContext,
    ) -> Result<Option<LogicalPlan>> {
        check_resolved(plan)?;
        let Some(parts) = decompose(plan) else {
            return Ok(None);
        };
        for view in self.catalog.all() {
            let Some(view_parts) = decompose(&view.plan) else {
                continue;
            };
            debug!(view = %view.name, "trying candidate against view");
            if let Some(r) = self.try_filter_project(&parts, &view_parts, view, ctx)? {
                return Ok(Some(r));
            }
            if let Some(r) = self.try_group_no_join(&parts, &view_parts, view, ctx)? {
                return Ok(Some(r));
            }
            if let Some(r) = self.try_spjg(&parts, &view_parts, view, ctx)? {
                return Ok(Some(r));
            }
        }
        Ok(None)
    }

    /// Rule family (a): pure filter/project over a single relation, no
    /// grouping on either side.
    fn try_filter_project(
        &self,
        parts: &SpjgParts,
        view_parts: &SpjgParts,
        view: &ViewDefinition,
        ctx: &mut RewriteContext,
    ) -> Result<Option<LogicalPlan>> {
        if parts.grouping.is_some()
            || view_parts.grouping.is_some()
            || !parts.graph.edges.is_empty()
            || parts.graph.tables.len() != 1
        {
            return Ok(None);
        }
        if !view_parts.graph.covers(&parts.graph) {
            return Ok(None);
        }
        let filter = predicate::match_conjuncts(&parts.conjuncts, &view_parts.conjuncts)?;
        if !filter.applicable {
            return Ok(None);
        }
        if !view_can_source(parts, &filter, view_parts) {
            return Ok(None);
        }
        Ok(Some(self.build_replacement(parts, view_parts, view, &filter, ctx)))
    }

    /// Rule family (b): grouping over a single relation, no join.
    fn try_group_no_join(
        &self,
        parts: &SpjgParts,
        view_parts: &SpjgParts,
        view: &ViewDefinition,
        ctx: &mut RewriteContext,
    ) -> Result<Option<LogicalPlan>> {
        if parts.grouping.is_none()
            || !parts.graph.edges.is_empty()
            || parts.graph.tables.len() != 1
        {
            return Ok(None);
        }
        if !view_parts.graph.covers(&parts.graph) {
            return Ok(None);
        }
        let filter = predicate::match_conjuncts(&parts.conjuncts, &view_parts.conjuncts)?;
        if !filter.applicable {
            return Ok(None);
        }
        let grouping = group_by::match_grouping(&view.plan, &parts.output, &view_parts.output)?;
        if !grouping.applicable {
            return Ok(None);
        }
        if !view_can_source(parts, &filter, view_parts) {
            return Ok(None);
        }
        Ok(Some(self.build_replacement(parts, view_parts, view, &filter, ctx)))
    }

    /// Rule family (c): general select-project-(filter)-join-(group).
    /// Pipeline order: join coverage, then predicate coverage, then group-by
    /// coverage when the candidate root aggregates.
    fn try_spjg(
        &self,
        parts: &SpjgParts,
        view_parts: &SpjgParts,
        view: &ViewDefinition,
        ctx: &mut RewriteContext,
    ) -> Result<Option<LogicalPlan>> {
        if parts.graph.edges.is_empty() && parts.graph.tables.len() <= 1 {
            return Ok(None);
        }
        // A pre-aggregated view yields one row per group; it can never stand
        // in for a candidate that does not aggregate.
        if view_parts.grouping.is_some() && parts.grouping.is_none() {
            return Ok(None);
        }
        if !view_parts.graph.covers(&parts.graph) {
            return Ok(None);
        }
        let filter = predicate::match_conjuncts(&parts.conjuncts, &view_parts.conjuncts)?;
        if !filter.applicable {
            return Ok(None);
        }
        if parts.grouping.is_some() {
            let grouping =
                group_by::match_grouping(&view.plan, &parts.output, &view_parts.output)?;
            if !grouping.applicable {
                return Ok(None);
            }
        }
        if !view_can_source(parts, &filter, view_parts) {
            return Ok(None);
        }
        Ok(Some(self.build_replacement(parts, view_parts, view, &filter, ctx)))
    }

    /// Build the replacement subtree: a scan of the view's materialized
    /// relation, the residual filter, the residual grouping when the
    /// candidate aggregates, and a re-projection to the original output list.
    /// Original column identities are mapped to the view scan's fresh columns
    /// in the context; references keep their original qualifiers so the plan
    /// type-checks identically for downstream consumers.
    fn build_replacement(
        &self,
        parts: &SpjgParts,
        view_parts: &SpjgParts,
        view: &ViewDefinition,
        filter: &Compensation,
        ctx: &mut RewriteContext,
    ) -> LogicalPlan {
        ctx.begin_subplan(&view.name);

        // One scan column per view output expression, in schema order.
        let scan_columns: Vec<Expr> = view
            .schema
            .iter()
            .map(|(name, data_type)| Expr::Column {
                qualifier: Some(view.name.clone()),
                name: name.clone(),
                data_type: data_type.clone(),
                nullable: false,
                id: ColumnId::fresh(),
            })
            .collect();

        // Map every column identity in the candidate to the view column of
        // the same name.
        let mut candidate_refs = Vec::new();
        for expr in parts.output.iter().chain(&parts.conjuncts) {
            expr.column_refs(&mut candidate_refs);
        }
        for col in &candidate_refs {
            let Expr::Column { name, id, .. } = col else {
                continue;
            };
            if let Some(view_col) = scan_columns
                .iter()
                .find(|c| matches!(c, Expr::Column { name: n, .. } if n.eq_ignore_ascii_case(name)))
            {
                ctx.record_replacement(*id, view_col.clone());
            }
        }

        let mut plan = LogicalPlan::Scan {
            table: view.name.clone(),
            columns: scan_columns.clone(),
        };

        let residual: Vec<Expr> = filter
            .residual
            .iter()
            .map(|e| remap_to_view(e, &view_parts.output, &scan_columns, ctx))
            .collect();
        if let Some(predicate) = Expr::conjoin(residual) {
            plan = LogicalPlan::Filter {
                input: Box::new(plan),
                predicate,
            };
        }

        match &parts.grouping {
            Some((group_exprs, agg_exprs)) => {
                // The entire query grouping is reproduced against the view,
                // consumed as a pre-grouped relation.
                plan = LogicalPlan::Aggregate {
                    input: Box::new(plan),
                    group_exprs: group_exprs
                        .iter()
                        .map(|e| remap_to_view(e, &view_parts.output, &scan_columns, ctx))
                        .collect(),
                    agg_exprs: agg_exprs
                        .iter()
                        .map(|e| remap_to_view(e, &view_parts.output, &scan_columns, ctx))
                        .collect(),
                };
            }
            None => {
                plan = LogicalPlan::Projection {
                    input: Box::new(plan),
                    exprs: parts
                        .output
                        .iter()
                        .map(|e| remap_to_view(e, &view_parts.output, &scan_columns, ctx))
                        .collect(),
                };
            }
        }

        debug!(view = %view.name, plan = %plan_json(&plan), "substituted view scan");
        plan
    }
}

/// Whether the view's output list can source `expr`: either the view
/// computes the whole expression, or every part of it reduces to exposed
/// output columns. A column leaf with no counterpart would leave the
/// replacement referencing the subtree being deleted.
fn computable_from_view(expr: &Expr, view_outputs: &[Expr]) -> bool {
    if view_outputs.iter().any(|v| v.semantic_eq(expr)) {
        return true;
    }
    match expr {
        Expr::Column { .. } => false,
        Expr::Literal { .. } => true,
        Expr::BinaryOp { left, right, .. } => {
            computable_from_view(left, view_outputs) && computable_from_view(right, view_outputs)
        }
        Expr::And(children) | Expr::Or(children) => children
            .iter()
            .all(|c| computable_from_view(c, view_outputs)),
        Expr::AggregateCall { arg, .. } => arg
            .as_ref()
            .is_none_or(|a| computable_from_view(a, view_outputs)),
        Expr::Cast { expr, .. } => computable_from_view(expr, view_outputs),
        Expr::Function { args, .. } => args
            .iter()
            .all(|a| computable_from_view(a, view_outputs)),
    }
}

/// Applicability gate shared by every rule family: the candidate's output
/// list and the residual filter must be computable from the view's output,
/// or the view cannot answer the query.
fn view_can_source(parts: &SpjgParts, filter: &Compensation, view_parts: &SpjgParts) -> bool {
    parts
        .output
        .iter()
        .chain(&filter.residual)
        .all(|e| computable_from_view(e, &view_parts.output))
}

/// Re-source an expression to the view scan. A whole expression the view's
/// output list computes becomes a reference to the corresponding scan
/// column — an aggregate call keeps its call shape, re-applied over the
/// pre-aggregated column — and anything else is rebuilt with its column
/// leaves remapped through the context's identity map. Column qualifiers
/// are preserved throughout.
fn remap_to_view(
    expr: &Expr,
    view_outputs: &[Expr],
    scan_columns: &[Expr],
    ctx: &RewriteContext,
) -> Expr {
    if let Some((_, scan_col)) = view_outputs
        .iter()
        .zip(scan_columns)
        .find(|(v, _)| v.semantic_eq(expr))
    {
        return match expr {
            Expr::Column { qualifier, .. } => match scan_col.clone() {
                Expr::Column {
                    name,
                    data_type,
                    nullable,
                    id,
                    ..
                } => Expr::Column {
                    qualifier: qualifier.clone(),
                    name,
                    data_type,
                    nullable,
                    id,
                },
                other => other,
            },
            Expr::AggregateCall { func, distinct, .. } => Expr::AggregateCall {
                func: *func,
                arg: Some(Box::new(scan_col.clone())),
                distinct: *distinct,
            },
            _ => scan_col.clone(),
        };
    }
    match expr {
        Expr::Column { .. } => remap_expr(expr, ctx),
        Expr::Literal { .. } => expr.clone(),
        Expr::BinaryOp { op, left, right } => Expr::BinaryOp {
            op: *op,
            left: Box::new(remap_to_view(left, view_outputs, scan_columns, ctx)),
            right: Box::new(remap_to_view(right, view_outputs, scan_columns, ctx)),
        },
        Expr::And(children) => Expr::And(
            children
                .iter()
                .map(|c| remap_to_view(c, view_outputs, scan_columns, ctx))
                .collect(),
        ),
        Expr::Or(children) => Expr::Or(
            children
                .iter()
                .map(|c| remap_to_view(c, view_outputs, scan_columns, ctx))
                .collect(),
        ),
        Expr::AggregateCall {
            func,
            arg,
            distinct,
        } => Expr::AggregateCall {
            func: *func,
            arg: arg
                .as_ref()
                .map(|a| Box::new(remap_to_view(a, view_outputs, scan_columns, ctx))),
            distinct: *distinct,
        },
        Expr::Cast {
            expr: inner,
            data_type,
        } => Expr::Cast {
            expr: Box::new(remap_to_view(inner, view_outputs, scan_columns, ctx)),
            data_type: data_type.clone(),
        },
        Expr::Function { name, args } => Expr::Function {
            name: name.clone(),
            args: args
                .iter()
                .map(|a| remap_to_view(a, view_outputs, scan_columns, ctx))
                .collect(),
        },
    }
}

/// Replace each column whose identity token has a recorded view-sourced
/// replacement, keeping the qualifier the reference already carries.
fn remap_expr(expr: &Expr, ctx: &RewriteContext) -> Expr {
    expr.map_columns(&|col| {
        if let Expr::Column { qualifier, id, .. } = col {
            if let Some(Expr::Column {
                name,
                data_type,
                nullable,
                id: view_id,
                ..
            }) = ctx.replacement_for(*id)
            {
                return Expr::Column {
                    qualifier: qualifier.clone(),
                    name: name.clone(),
                    data_type: data_type.clone(),
                    nullable: *nullable,
                    id: *view_id,
                };
            }
        }
        col.clone()
    })
}

/// Contract check: analyzed plans never contain unresolved references.
fn check_resolved(plan: &LogicalPlan) -> Result<()> {
    let mut unbound = None;
    plan.for_each_expr(&mut |expr| {
        if unbound.is_none() {
            unbound = expr.find_unbound();
        }
    });
    match unbound {
        Some(column) => Err(RewriteError::UnresolvedInput { column }),
        None => Ok(()),
    }
}

/// Compact JSON rendering of a plan for debug logging.
pub fn plan_json(plan: &LogicalPlan) -> String {
    serde_json::to_string(plan).unwrap_or_else(|_| "<unserializable plan>".to_string())
}
