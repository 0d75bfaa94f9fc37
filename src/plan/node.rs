// src/plan/node.rs

use crate::plan::expr::{DataType, Expr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

////////////////////////////////////////////////////////////////////////////////
// Logical Plan Definition
////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
}

/// A relational expression over already-analyzed inputs.
///
/// Every node owns its children exclusively; rewriting produces new nodes
/// rather than mutating in place, so a reference to a pre-rewrite subtree
/// stays valid while rewriting proceeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogicalPlan {
    /// A scan of an entire base table (or materialized view relation).
    Scan {
        table: String,
        /// The scan's output columns, as resolved `Expr::Column` references.
        columns: Vec<Expr>,
    },

    /// Filter rows from input.
    Filter {
        input: Box<LogicalPlan>,
        predicate: Expr,
    },

    /// Project expressions from input.
    Projection {
        input: Box<LogicalPlan>,
        exprs: Vec<Expr>,
    },

    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        join_type: JoinType,
        condition: Expr,
    },

    Aggregate {
        input: Box<LogicalPlan>,
        group_exprs: Vec<Expr>,
        agg_exprs: Vec<Expr>,
    },

    /// Renames the relation produced by its child.
    SubqueryAlias {
        alias: String,
        input: Box<LogicalPlan>,
    },

    /// Set union. Never eligible for view rewriting; carried so the
    /// classifier's rejection is an exhaustiveness-checked match arm.
    Union { inputs: Vec<LogicalPlan> },
}

impl LogicalPlan {
    pub fn children(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::Scan { .. } => vec![],
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Projection { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::SubqueryAlias { input, .. } => vec![input],
            LogicalPlan::Join { left, right, .. } => vec![left, right],
            LogicalPlan::Union { inputs } => inputs.iter().collect(),
        }
    }

    /// The node's output expression list as seen by a downstream consumer.
    /// For an `Aggregate` this is grouping expressions followed by aggregate
    /// expressions, matching output column order.
    pub fn output_exprs(&self) -> Vec<Expr> {
        match self {
            LogicalPlan::Scan { columns, .. } => columns.clone(),
            LogicalPlan::Projection { exprs, .. } => exprs.clone(),
            LogicalPlan::Aggregate {
                group_exprs,
                agg_exprs,
                ..
            } => {
                let mut out = group_exprs.clone();
                out.extend(agg_exprs.iter().cloned());
                out
            }
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::SubqueryAlias { input, .. } => input.output_exprs(),
            LogicalPlan::Join { left, right, .. } => {
                let mut out = left.output_exprs();
                out.extend(right.output_exprs());
                out
            }
            LogicalPlan::Union { inputs } => inputs
                .first()
                .map(|p| p.output_exprs())
                .unwrap_or_default(),
        }
    }

    /// Ordered `(name, type)` schema derived from the output expression list.
    pub fn output_schema(&self) -> Vec<(String, DataType)> {
        self.output_exprs()
            .iter()
            .map(|e| (e.output_name(), e.output_type()))
            .collect()
    }

    /// Collect the names of every base table scanned anywhere in the subtree.
    pub fn base_tables(&self, out: &mut BTreeSet<String>) {
        if let LogicalPlan::Scan { table, .. } = self {
            out.insert(table.to_ascii_lowercase());
        }
        for child in self.children() {
            child.base_tables(out);
        }
    }

    /// Visit every expression held by nodes in this subtree.
    pub fn for_each_expr(&self, f: &mut impl FnMut(&Expr)) {
        match self {
            LogicalPlan::Scan { columns, .. } => columns.iter().for_each(&mut *f),
            LogicalPlan::Filter { predicate, .. } => f(predicate),
            LogicalPlan::Projection { exprs, .. } => exprs.iter().for_each(&mut *f),
            LogicalPlan::Join { condition, .. } => f(condition),
            LogicalPlan::Aggregate {
                group_exprs,
                agg_exprs,
                ..
            } => {
                group_exprs.iter().for_each(&mut *f);
                agg_exprs.iter().for_each(&mut *f);
            }
            LogicalPlan::SubqueryAlias { .. } | LogicalPlan::Union { .. } => {}
        }
        for child in self.children() {
            child.for_each_expr(&mut *f);
        }
    }

    /// Rebuild the whole subtree with every held expression passed through
    /// `f`. Children are rebuilt first.
    pub fn map_exprs(&self, f: &impl Fn(&Expr) -> Expr) -> LogicalPlan {
        match self {
            LogicalPlan::Scan { table, columns } => LogicalPlan::Scan {
                table: table.clone(),
                columns: columns.iter().map(f).collect(),
            },
            LogicalPlan::Filter { input, predicate } => LogicalPlan::Filter {
                input: Box::new(input.map_exprs(f)),
                predicate: f(predicate),
            },
            LogicalPlan::Projection { input, exprs } => LogicalPlan::Projection {
                input: Box::new(input.map_exprs(f)),
                exprs: exprs.iter().map(f).collect(),
            },
            LogicalPlan::Join {
                left,
                right,
                join_type,
                condition,
            } => LogicalPlan::Join {
                left: Box::new(left.map_exprs(f)),
                right: Box::new(right.map_exprs(f)),
                join_type: *join_type,
                condition: f(condition),
            },
            LogicalPlan::Aggregate {
                input,
                group_exprs,
                agg_exprs,
            } => LogicalPlan::Aggregate {
                input: Box::new(input.map_exprs(f)),
                group_exprs: group_exprs.iter().map(f).collect(),
                agg_exprs: agg_exprs.iter().map(f).collect(),
            },
            LogicalPlan::SubqueryAlias { alias, input } => LogicalPlan::SubqueryAlias {
                alias: alias.clone(),
                input: Box::new(input.map_exprs(f)),
            },
            LogicalPlan::Union { inputs } => LogicalPlan::Union {
                inputs: inputs.iter().map(|p| p.map_exprs(f)).collect(),
            },
        }
    }
}
