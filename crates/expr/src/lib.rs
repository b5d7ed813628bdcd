#[cfg(test)]
mod tests;

use common::{DbError, DbResult, Row};
use std::cmp::Ordering;
use types::Value;

/// Binary comparison and logical operators recognized by the WHERE grammar
/// (spec §4.5): `AND`/`OR` bind loosest, comparisons bind tightest, and
/// comparisons do not chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// WHERE-clause expression tree: `ColumnRef | Literal` combined by
/// `BinaryOp` (spec §3 AST data model).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    Literal(Value),
    Column(String),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
}

/// Evaluation context: the row's schema, used to resolve `Column` references
/// by name rather than by hard-coded ordinal (spec §9 open question).
pub struct EvalContext<'a> {
    pub schema: &'a [String],
}

impl<'a> EvalContext<'a> {
    pub fn new(schema: &'a [String]) -> Self {
        Self { schema }
    }

    /// Evaluate an expression over a given row.
    ///
    /// Comparisons between incompatible types never error: per spec §4.6,
    /// an unsupported comparison simply evaluates to `false`, filtering the
    /// row out rather than aborting the scan.
    pub fn eval(&self, expr: &Expr, row: &Row) -> DbResult<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Column(name) => {
                let idx = self.find_column(name);
                Ok(idx
                    .and_then(|i| row.values.get(i))
                    .cloned()
                    .unwrap_or(Value::Null))
            }
            Expr::Binary { left, op, right } => {
                let lv = self.eval(left, row)?;
                let rv = self.eval(right, row)?;
                Ok(self.eval_binary(&lv, *op, &rv))
            }
        }
    }

    fn eval_binary(&self, l: &Value, op: BinaryOp, r: &Value) -> Value {
        use BinaryOp::*;

        match op {
            And | Or => {
                let (Some(lb), Some(rb)) = (l.as_bool(), r.as_bool()) else {
                    return Value::Bool(false);
                };
                Value::Bool(match op {
                    And => lb && rb,
                    Or => lb || rb,
                    _ => unreachable!(),
                })
            }
            Eq | Ne | Lt | Le | Gt | Ge => {
                let Some(ord) = l.cmp_same_type(r) else {
                    return Value::Bool(false);
                };
                Value::Bool(match op {
                    Eq => ord == Ordering::Equal,
                    Ne => ord != Ordering::Equal,
                    Lt => ord == Ordering::Less,
                    Le => ord != Ordering::Greater,
                    Gt => ord == Ordering::Greater,
                    Ge => ord != Ordering::Less,
                    _ => unreachable!(),
                })
            }
        }
    }

    /// Resolve a column name to its positional index via the schema,
    /// case-insensitively. Returns `None` for an unknown column rather than
    /// erroring — WHERE evaluation treats an unresolved column as
    /// `Value::Null` instead of aborting the scan.
    fn find_column(&self, name: &str) -> Option<usize> {
        self.schema.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Strict variant used by column projection (e.g. `SELECT col FROM t`),
    /// where an unknown column name is a hard error rather than a filter.
    pub fn resolve_column(&self, name: &str) -> DbResult<usize> {
        self.find_column(name)
            .ok_or_else(|| DbError::Internal(format!("column \"{name}\" does not exist")))
    }
}
