use expr::Expr;
pub use types::ColumnDef;
use types::Value;

/// A parsed SQL statement (spec §3 AST data model).
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Select {
        columns: Vec<SelectItem>,
        from: Option<String>,
        selection: Option<Expr>,
    },
    Insert {
        table: String,
        values: Vec<Value>,
    },
    Update {
        table: String,
        set: (String, Value),
        selection: Option<Expr>,
    },
    CreateTable {
        table: String,
        columns: Option<Vec<ColumnDef>>,
    },
}

/// One item in a `SELECT` projection list.
#[derive(Clone, Debug, PartialEq)]
pub enum SelectItem {
    Wildcard,
    Column(String),
    Literal(Value),
}
