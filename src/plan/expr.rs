// src/plan/expr.rs

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

////////////////////////////////////////////////////////////////////////////////
// Column identity
////////////////////////////////////////////////////////////////////////////////

/// Opaque identity token for a resolved column reference.
///
/// Analysis assigns every column reference a unique token; two references with
/// the same token always denote the same physical column, even after the
/// subtree that produced them has been replaced. Token equality is the
/// *identity* notion of expression equality; [`Expr::semantic_eq`] is the
/// structural one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnId(pub u64);

static NEXT_COLUMN_ID: AtomicU64 = AtomicU64::new(1);

impl ColumnId {
    /// Sentinel for a reference the analyzer failed to bind. A reference
    /// carrying this token must never reach a matcher.
    pub const UNBOUND: ColumnId = ColumnId(0);

    /// Draw a fresh, globally unique token.
    pub fn fresh() -> Self {
        ColumnId(NEXT_COLUMN_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn is_bound(&self) -> bool {
        self.0 != 0
    }
}

////////////////////////////////////////////////////////////////////////////////
// Scalar types and values
////////////////////////////////////////////////////////////////////////////////

/// Supported column types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Int,
    Varchar,
    Bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    String(String),
    Bool(bool),
}

/// Binary operators over scalar expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Mul,
    Div,
}

/// Aggregate functions recognized in aggregate expression lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFunc {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl AggregateFunc {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "count",
            AggregateFunc::Sum => "sum",
            AggregateFunc::Min => "min",
            AggregateFunc::Max => "max",
            AggregateFunc::Avg => "avg",
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Expression tree
////////////////////////////////////////////////////////////////////////////////

/// A fully resolved scalar expression.
///
/// Plans own their expressions exclusively; rewriting builds new expressions
/// rather than mutating in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A reference to a column of some input relation.
    Column {
        qualifier: Option<String>,
        name: String,
        data_type: DataType,
        nullable: bool,
        id: ColumnId,
    },
    Literal {
        value: Value,
        data_type: DataType,
    },
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// N-ary conjunction. Kept flat; `split_conjuncts` flattens nested ANDs.
    And(Vec<Expr>),
    /// N-ary disjunction. Atomic for subsumption purposes.
    Or(Vec<Expr>),
    AggregateCall {
        func: AggregateFunc,
        arg: Option<Box<Expr>>,
        distinct: bool,
    },
    Cast {
        expr: Box<Expr>,
        data_type: DataType,
    },
    Function {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// A resolved column reference with a fresh identity token.
    pub fn column(qualifier: &str, name: &str, data_type: DataType) -> Expr {
        Expr::Column {
            qualifier: Some(qualifier.to_string()),
            name: name.to_string(),
            data_type,
            nullable: false,
            id: ColumnId::fresh(),
        }
    }

    pub fn int(v: i64) -> Expr {
        Expr::Literal {
            value: Value::Int(v),
            data_type: DataType::Int,
        }
    }

    pub fn string(v: &str) -> Expr {
        Expr::Literal {
            value: Value::String(v.to_string()),
            data_type: DataType::Varchar,
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Structural equality ignoring identity tokens and column qualifiers.
    ///
    /// This is the notion the matchers use: `emps.deptno` and `depts.deptno`
    /// do *not* match (different names would), but two references to `deptno`
    /// produced by different analysis runs do.
    pub fn semantic_eq(&self, other: &Expr) -> bool {
        match (self, other) {
            (
                Expr::Column {
                    name: a,
                    data_type: ta,
                    ..
                },
                Expr::Column {
                    name: b,
                    data_type: tb,
                    ..
                },
            ) => a.eq_ignore_ascii_case(b) && ta == tb,
            (
                Expr::Literal {
                    value: a,
                    data_type: ta,
                },
                Expr::Literal {
                    value: b,
                    data_type: tb,
                },
            ) => a == b && ta == tb,
            (
                Expr::BinaryOp {
                    op: oa,
                    left: la,
                    right: ra,
                },
                Expr::BinaryOp {
                    op: ob,
                    left: lb,
                    right: rb,
                },
            ) => oa == ob && la.semantic_eq(lb) && ra.semantic_eq(rb),
            (Expr::And(a), Expr::And(b)) | (Expr::Or(a), Expr::Or(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.semantic_eq(y))
            }
            (
                Expr::AggregateCall {
                    func: fa,
                    arg: aa,
                    distinct: da,
                },
                Expr::AggregateCall {
                    func: fb,
                    arg: ab,
                    distinct: db,
                },
            ) => {
                fa == fb
                    && da == db
                    && match (aa, ab) {
                        (Some(x), Some(y)) => x.semantic_eq(y),
                        (None, None) => true,
                        _ => false,
                    }
            }
            (
                Expr::Cast {
                    expr: ea,
                    data_type: ta,
                },
                Expr::Cast {
                    expr: eb,
                    data_type: tb,
                },
            ) => ta == tb && ea.semantic_eq(eb),
            (
                Expr::Function { name: na, args: aa },
                Expr::Function { name: nb, args: ab },
            ) => {
                na.eq_ignore_ascii_case(nb)
                    && aa.len() == ab.len()
                    && aa.iter().zip(ab).all(|(x, y)| x.semantic_eq(y))
            }
            _ => false,
        }
    }

    /// Split a predicate into its top-level conjuncts, flattening nested ANDs.
    /// OR stays atomic: `(a OR b) AND c` yields `[(a OR b), c]`.
    pub fn split_conjuncts(&self) -> Vec<Expr> {
        let mut out = Vec::new();
        self.collect_conjuncts(&mut out);
        out
    }

    fn collect_conjuncts(&self, out: &mut Vec<Expr>) {
        match self {
            Expr::And(children) => {
                for child in children {
                    child.collect_conjuncts(out);
                }
            }
            other => out.push(other.clone()),
        }
    }

    /// Rebuild a single predicate from a conjunct list.
    pub fn conjoin(mut conjuncts: Vec<Expr>) -> Option<Expr> {
        match conjuncts.len() {
            0 => None,
            1 => Some(conjuncts.remove(0)),
            _ => Some(Expr::And(conjuncts)),
        }
    }

    /// Collect every column reference in this expression, in left-to-right
    /// order.
    pub fn column_refs(&self, out: &mut Vec<Expr>) {
        match self {
            Expr::Column { .. } => out.push(self.clone()),
            Expr::Literal { .. } => {}
            Expr::BinaryOp { left, right, .. } => {
                left.column_refs(out);
                right.column_refs(out);
            }
            Expr::And(children) | Expr::Or(children) => {
                for child in children {
                    child.column_refs(out);
                }
            }
            Expr::AggregateCall { arg, .. } => {
                if let Some(arg) = arg {
                    arg.column_refs(out);
                }
            }
            Expr::Cast { expr, .. } => expr.column_refs(out),
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.column_refs(out);
                }
            }
        }
    }

    /// The name of the first unresolved column reference, if any. Analysis
    /// guarantees none exist; one reaching a matcher is a contract violation.
    pub fn find_unbound(&self) -> Option<String> {
        let mut refs = Vec::new();
        self.column_refs(&mut refs);
        refs.iter().find_map(|r| match r {
            Expr::Column { name, id, .. } if !id.is_bound() => Some(name.clone()),
            _ => None,
        })
    }

    /// Rebuild this expression with every column leaf replaced by `f(leaf)`.
    pub fn map_columns(&self, f: &impl Fn(&Expr) -> Expr) -> Expr {
        match self {
            Expr::Column { .. } => f(self),
            Expr::Literal { .. } => self.clone(),
            Expr::BinaryOp { op, left, right } => Expr::BinaryOp {
                op: *op,
                left: Box::new(left.map_columns(f)),
                right: Box::new(right.map_columns(f)),
            },
            Expr::And(children) => {
                Expr::And(children.iter().map(|c| c.map_columns(f)).collect())
            }
            Expr::Or(children) => Expr::Or(children.iter().map(|c| c.map_columns(f)).collect()),
            Expr::AggregateCall {
                func,
                arg,
                distinct,
            } => Expr::AggregateCall {
                func: *func,
                arg: arg.as_ref().map(|a| Box::new(a.map_columns(f))),
                distinct: *distinct,
            },
            Expr::Cast { expr, data_type } => Expr::Cast {
                expr: Box::new(expr.map_columns(f)),
                data_type: data_type.clone(),
            },
            Expr::Function { name, args } => Expr::Function {
                name: name.clone(),
                args: args.iter().map(|a| a.map_columns(f)).collect(),
            },
        }
    }

    /// Display-style name for schema derivation: `deptno`, `sum(salary)`, ...
    pub fn output_name(&self) -> String {
        match self {
            Expr::Column { name, .. } => name.clone(),
            Expr::AggregateCall { func, arg, .. } => match arg {
                Some(arg) => format!("{}({})", func.name(), arg.output_name()),
                None => format!("{}(*)", func.name()),
            },
            Expr::Cast { expr, .. } => expr.output_name(),
            other => format!("{:?}", other).to_ascii_lowercase(),
        }
    }

    /// Result type for schema derivation.
    pub fn output_type(&self) -> DataType {
        match self {
            Expr::Column { data_type, .. } => data_type.clone(),
            Expr::Literal { data_type, .. } => data_type.clone(),
            Expr::BinaryOp { op, left, .. } => match op {
                BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Mul | BinaryOp::Div => {
                    left.output_type()
                }
                _ => DataType::Bool,
            },
            Expr::And(_) | Expr::Or(_) => DataType::Bool,
            Expr::AggregateCall { func, arg, .. } => match (func, arg) {
                (AggregateFunc::Count, _) => DataType::Int,
                (_, Some(arg)) => arg.output_type(),
                (_, None) => DataType::Int,
            },
            Expr::Cast { data_type, .. } => data_type.clone(),
            Expr::Function { .. } => DataType::Varchar,
        }
    }
}
