use super::*;
use types::Value::*;

fn schema(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|s| s.to_string()).collect()
}

#[test]
fn eval_literals_and_columns() {
    let row = Row::new(1, vec![Int(1), Text("Will".into()), Bool(true)]);
    let schema = schema(&["id", "name", "active"]);
    let ctx = EvalContext::new(&schema);

    assert_eq!(ctx.eval(&Expr::Literal(Int(42)), &row).unwrap(), Int(42));
    assert_eq!(
        ctx.eval(&Expr::Column("name".into()), &row).unwrap(),
        Text("Will".into())
    );
}

#[test]
fn column_lookup_is_case_insensitive() {
    let row = Row::new(1, vec![Int(7)]);
    let schema = schema(&["ID"]);
    let ctx = EvalContext::new(&schema);

    assert_eq!(ctx.eval(&Expr::Column("id".into()), &row).unwrap(), Int(7));
}

#[test]
fn eval_comparisons() {
    let row = Row::new(1, vec![Int(10), Int(20)]);
    let schema = schema(&["a", "b"]);
    let ctx = EvalContext::new(&schema);

    let lt = Expr::Binary {
        left: Box::new(Expr::Column("a".into())),
        op: BinaryOp::Lt,
        right: Box::new(Expr::Column("b".into())),
    };
    assert_eq!(ctx.eval(&lt, &row).unwrap(), Bool(true));
}

#[test]
fn eval_logical_ops() {
    let row = Row::new(1, vec![Bool(true), Bool(false)]);
    let schema = schema(&["x", "y"]);
    let ctx = EvalContext::new(&schema);

    let expr = Expr::Binary {
        left: Box::new(Expr::Column("x".into())),
        op: BinaryOp::And,
        right: Box::new(Expr::Column("y".into())),
    };
    assert_eq!(ctx.eval(&expr, &row).unwrap(), Bool(false));
}

#[test]
fn mismatched_types_filter_the_row_instead_of_erroring() {
    let row = Row::new(1, vec![Int(1), Text("hi".into())]);
    let schema = schema(&["a", "b"]);
    let ctx = EvalContext::new(&schema);

    let expr = Expr::Binary {
        left: Box::new(Expr::Column("a".into())),
        op: BinaryOp::Eq,
        right: Box::new(Expr::Column("b".into())),
    };

    assert_eq!(ctx.eval(&expr, &row).unwrap(), Bool(false));
}

#[test]
fn unresolved_column_in_where_is_null_not_an_error() {
    let row = Row::new(1, vec![Int(1)]);
    let schema = schema(&["a"]);
    let ctx = EvalContext::new(&schema);

    assert_eq!(
        ctx.eval(&Expr::Column("ghost".into()), &row).unwrap(),
        Null
    );
}

#[test]
fn resolve_column_errors_on_unknown_name() {
    let schema = schema(&["a", "b"]);
    let ctx = EvalContext::new(&schema);
    assert!(ctx.resolve_column("c").is_err());
    assert_eq!(ctx.resolve_column("b").unwrap(), 1);
}
