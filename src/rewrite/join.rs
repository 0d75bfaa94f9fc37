// src/rewrite/join.rs

use crate::plan::expr::{BinaryOp, Expr};
use crate::plan::node::LogicalPlan;
use std::collections::BTreeSet;

////////////////////////////////////////////////////////////////////////////////
// Join Matcher
////////////////////////////////////////////////////////////////////////////////

/// One equi-join edge: an unordered pair of relation names joined on a
/// canonicalized `a = b` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinEdge {
    /// Lowercased relation names, lexicographically ordered.
    pub tables: (String, String),
    /// The equi-condition with its sides in canonical order.
    pub condition: Expr,
}

/// A plan's join structure, abstracted away from tree shape: the set of
/// joined relations plus the multiset of equi-join edges. A left-deep and a
/// right-deep chain over the same pairs extract to the same graph, which is
/// how commutativity and associativity of inner joins are honored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinGraph {
    pub tables: BTreeSet<String>,
    pub edges: Vec<JoinEdge>,
    /// Join conjuncts that do not form an equi-edge between two named
    /// relations. The driver treats these as ordinary filter conjuncts.
    pub residual_conditions: Vec<Expr>,
}

impl JoinGraph {
    /// Extract the join graph of an SPJG-shaped subtree.
    pub fn from_plan(plan: &LogicalPlan) -> JoinGraph {
        let mut graph = JoinGraph::default();
        collect(plan, &mut graph);
        graph
    }

    /// Whether a view with graph `self` covers a query with graph `query`:
    /// every relation the query joins must be present in the view, and every
    /// query edge must be matched by a semantically equal view edge. The view
    /// joining additional relations does not break coverage; the query
    /// needing a relation the view lacks does.
    pub fn covers(&self, query: &JoinGraph) -> bool {
        if !query.tables.is_subset(&self.tables) {
            return false;
        }
        query.edges.iter().all(|qe| {
            self.edges
                .iter()
                .any(|ve| ve.tables == qe.tables && ve.condition.semantic_eq(&qe.condition))
        })
    }
}

fn collect(plan: &LogicalPlan, graph: &mut JoinGraph) {
    match plan {
        LogicalPlan::Scan { table, .. } => {
            graph.tables.insert(table.to_ascii_lowercase());
        }
        LogicalPlan::SubqueryAlias { alias, .. } => {
            // The alias is the relation name join conditions refer to.
            graph.tables.insert(alias.to_ascii_lowercase());
        }
        LogicalPlan::Join {
            left,
            right,
            condition,
            ..
        } => {
            collect(left, graph);
            collect(right, graph);
            for conjunct in condition.split_conjuncts() {
                match canonical_edge(&conjunct) {
                    Some(edge) => graph.edges.push(edge),
                    None => graph.residual_conditions.push(conjunct),
                }
            }
        }
        LogicalPlan::Filter { input, .. }
        | LogicalPlan::Projection { input, .. }
        | LogicalPlan::Aggregate { input, .. } => collect(input, graph),
        LogicalPlan::Union { inputs } => {
            for input in inputs {
                collect(input, graph);
            }
        }
    }
}

/// Canonicalize `a = b` over two qualified columns into an edge with sides
/// ordered by `(qualifier, name)`, so the textual left/right ordering the
/// parser happened to produce does not matter.
fn canonical_edge(conjunct: &Expr) -> Option<JoinEdge> {
    let Expr::BinaryOp {
        op: BinaryOp::Eq,
        left,
        right,
    } = conjunct
    else {
        return None;
    };
    let (
        Expr::Column {
            qualifier: Some(lq),
            name: ln,
            ..
        },
        Expr::Column {
            qualifier: Some(rq),
            name: rn,
            ..
        },
    ) = (left.as_ref(), right.as_ref())
    else {
        return None;
    };

    let lq = lq.to_ascii_lowercase();
    let rq = rq.to_ascii_lowercase();
    let flip = (&lq, &ln.to_ascii_lowercase()) > (&rq, &rn.to_ascii_lowercase());
    let (first, second) = if flip {
        (right.clone(), left.clone())
    } else {
        (left.clone(), right.clone())
    };
    let tables = if lq <= rq { (lq, rq) } else { (rq, lq) };
    Some(JoinEdge {
        tables,
        condition: Expr::BinaryOp {
            op: BinaryOp::Eq,
            left: first,
            right: second,
        },
    })
}
