use criterion::{Criterion, criterion_group, criterion_main};
use view_rewrite::catalog::view::ViewCatalog;
use view_rewrite::plan::expr::{BinaryOp, DataType, Expr};
use view_rewrite::plan::node::{JoinType, LogicalPlan};
use view_rewrite::rewrite::driver::Rewriter;

fn scan(table: &str, cols: &[(&str, DataType)]) -> LogicalPlan {
    LogicalPlan::Scan {
        table: table.to_string(),
        columns: cols
            .iter()
            .map(|(n, t)| Expr::column(table, n, t.clone()))
            .collect(),
    }
}

fn col(plan: &LogicalPlan, name: &str) -> Expr {
    match plan {
        LogicalPlan::Scan { columns, .. } => columns
            .iter()
            .find(|c| matches!(c, Expr::Column { name: n, .. } if n == name))
            .unwrap()
            .clone(),
        _ => unreachable!(),
    }
}

fn emps() -> LogicalPlan {
    scan(
        "emps",
        &[("empid", DataType::Int), ("deptno", DataType::Int)],
    )
}

fn depts() -> LogicalPlan {
    scan("depts", &[("deptno", DataType::Int)])
}

fn join_view() -> LogicalPlan {
    let e = emps();
    let d = depts();
    let cond = Expr::binary(BinaryOp::Eq, col(&d, "deptno"), col(&e, "deptno"));
    let exprs = vec![col(&e, "empid"), col(&e, "deptno")];
    LogicalPlan::Projection {
        input: Box::new(LogicalPlan::Join {
            left: Box::new(e),
            right: Box::new(d),
            join_type: JoinType::Inner,
            condition: cond,
        }),
        exprs,
    }
}

fn join_query() -> LogicalPlan {
    let e = emps();
    let d = depts();
    let cond = Expr::binary(BinaryOp::Eq, col(&e, "deptno"), col(&d, "deptno"));
    let empid = col(&e, "empid");
    LogicalPlan::Projection {
        input: Box::new(LogicalPlan::Filter {
            input: Box::new(LogicalPlan::Join {
                left: Box::new(e),
                right: Box::new(d),
                join_type: JoinType::Inner,
                condition: cond,
            }),
            predicate: Expr::binary(BinaryOp::Eq, empid.clone(), Expr::int(1)),
        }),
        exprs: vec![empid],
    }
}

fn bench_join_rewrite(c: &mut Criterion) {
    let mut catalog = ViewCatalog::new();
    catalog.register("empdepts", join_view()).unwrap();
    let rewriter = Rewriter::new(&catalog);
    let query = join_query();
    c.bench_function("rewrite_join_query", |b| {
        b.iter(|| rewriter.rewrite(&query).unwrap());
    });
}

criterion_group!(benches, bench_join_rewrite);
criterion_main!(benches);
