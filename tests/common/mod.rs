#![allow(dead_code)]

use view_rewrite::plan::expr::{AggregateFunc, BinaryOp, DataType, Expr};
use view_rewrite::plan::node::{JoinType, LogicalPlan};

/// Scan of the sample `emps` table.
pub fn emps() -> LogicalPlan {
    scan(
        "emps",
        &[
            ("empid", DataType::Int),
            ("deptno", DataType::Int),
            ("name", DataType::Varchar),
            ("salary", DataType::Int),
        ],
    )
}

/// Scan of the sample `depts` table.
pub fn depts() -> LogicalPlan {
    scan(
        "depts",
        &[("deptno", DataType::Int), ("dept_name", DataType::Varchar)],
    )
}

/// Scan of the sample `bonus` table.
pub fn bonus() -> LogicalPlan {
    scan(
        "bonus",
        &[("empid", DataType::Int), ("amount", DataType::Int)],
    )
}

pub fn scan(table: &str, cols: &[(&str, DataType)]) -> LogicalPlan {
    let columns = cols
        .iter()
        .map(|(name, dt)| Expr::column(table, name, dt.clone()))
        .collect();
    LogicalPlan::Scan {
        table: table.to_string(),
        columns,
    }
}

/// Pull a named column reference out of a scan.
pub fn col(plan: &LogicalPlan, name: &str) -> Expr {
    match plan {
        LogicalPlan::Scan { columns, .. } => columns
            .iter()
            .find(|c| matches!(c, Expr::Column { name: n, .. } if n == name))
            .unwrap()
            .clone(),
        _ => panic!("col() expects a scan"),
    }
}

pub fn eq(left: Expr, right: Expr) -> Expr {
    Expr::binary(BinaryOp::Eq, left, right)
}

pub fn gt(left: Expr, right: Expr) -> Expr {
    Expr::binary(BinaryOp::Gt, left, right)
}

pub fn inner_join(left: LogicalPlan, right: LogicalPlan, condition: Expr) -> LogicalPlan {
    LogicalPlan::Join {
        left: Box::new(left),
        right: Box::new(right),
        join_type: JoinType::Inner,
        condition,
    }
}

pub fn filter(input: LogicalPlan, predicate: Expr) -> LogicalPlan {
    LogicalPlan::Filter {
        input: Box::new(input),
        predicate,
    }
}

pub fn project(input: LogicalPlan, exprs: Vec<Expr>) -> LogicalPlan {
    LogicalPlan::Projection {
        input: Box::new(input),
        exprs,
    }
}

pub fn aggregate(input: LogicalPlan, group_exprs: Vec<Expr>, agg_exprs: Vec<Expr>) -> LogicalPlan {
    LogicalPlan::Aggregate {
        input: Box::new(input),
        group_exprs,
        agg_exprs,
    }
}

pub fn sum(arg: Expr) -> Expr {
    Expr::AggregateCall {
        func: AggregateFunc::Sum,
        arg: Some(Box::new(arg)),
        distinct: false,
    }
}
