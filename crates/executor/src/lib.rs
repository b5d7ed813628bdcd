//! Validates parsed statements against table schemas and dispatches them to
//! heap storage (spec §4.6).


use common::{DbError, DbResult};
use expr::EvalContext;
use heap::HeapStorage;
use parser::{ColumnDef, SelectItem, Statement};
use types::{ColumnType, Value};

/// One projected output column: a display name plus the type protocol
/// encoding needs to pick a wire type OID.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultColumn {
    pub name: String,
    pub ty: ColumnType,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<ResultColumn>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExecOutcome {
    Select(QueryResult),
    Insert,
    CreateTable,
    Update { count: u64 },
}

pub struct Executor {
    heap: HeapStorage,
}

impl Executor {
    pub fn new(heap: HeapStorage) -> Self {
        Self { heap }
    }

    pub fn execute(&self, stmt: Statement) -> DbResult<ExecOutcome> {
        match stmt {
            Statement::CreateTable { table, columns } => self.exec_create_table(table, columns),
            Statement::Insert { table, values } => self.exec_insert(table, values),
            Statement::Select {
                columns,
                from: None,
                selection,
            } => self.exec_select_literal(columns, selection),
            Statement::Select {
                columns,
                from: Some(table),
                selection,
            } => self.exec_select_from(table, columns, selection),
            Statement::Update {
                table,
                set,
                selection,
            } => self.exec_update(table, set, selection),
        }
    }

    fn exec_create_table(
        &self,
        table: String,
        columns: Option<Vec<ColumnDef>>,
    ) -> DbResult<ExecOutcome> {
        if self.heap.table_exists(&table) {
            return Err(DbError::TableAlreadyExists(table));
        }
        self.heap.create_table(&table, columns.unwrap_or_default())?;
        Ok(ExecOutcome::CreateTable)
    }

    fn exec_insert(&self, table: String, values: Vec<Value>) -> DbResult<ExecOutcome> {
        if !self.heap.table_exists(&table) {
            return Err(DbError::TableNotFound(table));
        }
        let schema = self.heap.get_schema(&table)?;
        if !schema.is_empty() {
            validate_insert(&schema, &values)?;
        }
        self.heap.insert_row(&table, values)?;
        Ok(ExecOutcome::Insert)
    }

    /// `SELECT` with no `FROM`: each item is evaluated independently with no
    /// row context, producing a single output row.
    fn exec_select_literal(
        &self,
        items: Vec<SelectItem>,
        selection: Option<expr::Expr>,
    ) -> DbResult<ExecOutcome> {
        let _ = selection; // a WHERE clause with no FROM has no rows to filter.
        let mut columns = Vec::with_capacity(items.len());
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match item {
                SelectItem::Literal(v) => {
                    columns.push(ResultColumn {
                        name: "?column?".to_string(),
                        ty: literal_column_type(&v),
                    });
                    values.push(v);
                }
                SelectItem::Column(name) => {
                    return Err(DbError::Internal(format!(
                        "column \"{name}\" does not exist"
                    )));
                }
                SelectItem::Wildcard => {
                    return Err(DbError::UnsupportedFeature(
                        "SELECT * requires a FROM clause".to_string(),
                    ));
                }
            }
        }
        Ok(ExecOutcome::Select(QueryResult {
            columns,
            rows: vec![values],
        }))
    }

    fn exec_select_from(
        &self,
        table: String,
        items: Vec<SelectItem>,
        selection: Option<expr::Expr>,
    ) -> DbResult<ExecOutcome> {
        if !self.heap.table_exists(&table) {
            return Err(DbError::TableNotFound(table));
        }
        let schema = self.heap.get_schema(&table)?;
        let schema_names: Vec<String> = schema.iter().map(|c| c.name.clone()).collect();
        let all_rows = self.heap.select_all_rows(&table)?;

        let ctx = EvalContext::new(&schema_names);
        let filtered: Vec<Vec<Value>> = match &selection {
            None => all_rows,
            Some(expr) => all_rows
                .into_iter()
                .filter(|values| {
                    let row = common::Row::new(0, values.clone());
                    ctx.eval(expr, &row)
                        .map(|v| v.as_bool().unwrap_or(false))
                        .unwrap_or(false)
                })
                .collect(),
        };

        let projection = resolve_projection(&items, &schema)?;
        let columns = projection
            .iter()
            .map(|p| ResultColumn {
                name: p.name.clone(),
                ty: p.ty.clone(),
            })
            .collect();
        let rows = filtered
            .iter()
            .map(|row| {
                projection
                    .iter()
                    .map(|p| match &p.source {
                        ColumnSource::Schema(idx) => row.get(*idx).cloned().unwrap_or(Value::Null),
                        ColumnSource::Literal(v) => v.clone(),
                    })
                    .collect()
            })
            .collect();

        Ok(ExecOutcome::Select(QueryResult { columns, rows }))
    }

    fn exec_update(
        &self,
        table: String,
        set: (String, Value),
        selection: Option<expr::Expr>,
    ) -> DbResult<ExecOutcome> {
        if !self.heap.table_exists(&table) {
            return Err(DbError::TableNotFound(table));
        }
        let (column, value) = set;
        let count = self
            .heap
            .update_row(&table, &column, value, selection.as_ref())?;
        Ok(ExecOutcome::Update { count })
    }
}

fn literal_column_type(value: &Value) -> ColumnType {
    match value {
        Value::Int(_) => ColumnType::Integer,
        Value::Text(_) => ColumnType::Text,
        Value::Bool(_) => ColumnType::Boolean,
        Value::Null => ColumnType::Text,
    }
}

fn validate_insert(schema: &[ColumnDef], values: &[Value]) -> DbResult<()> {
    if values.len() != schema.len() {
        return Err(DbError::ColumnCountMismatch {
            actual: values.len(),
            expected: schema.len(),
        });
    }
    for (col, value) in schema.iter().zip(values) {
        if !col.ty.accepts(value) {
            return Err(DbError::TypeMismatch {
                column: col.name.clone(),
                actual: value.type_name().to_string(),
                expected: col.ty.display_name(),
            });
        }
        if let (ColumnType::Varchar(limit), Value::Text(s)) = (&col.ty, value) {
            if s.len() > *limit as usize {
                return Err(DbError::ValueTooLong {
                    column: col.name.clone(),
                    actual_len: s.len(),
                    limit: *limit,
                });
            }
        }
    }
    Ok(())
}

enum ColumnSource {
    Schema(usize),
    Literal(Value),
}

struct Projection {
    name: String,
    ty: ColumnType,
    source: ColumnSource,
}

/// Expand `SELECT *`/named columns/literals into a flat projection list
/// against `schema`. Named columns resolve case-insensitively; legacy
/// tables with an empty schema reject named columns (there is nothing to
/// resolve them against) but still allow `*` and literals.
fn resolve_projection(items: &[SelectItem], schema: &[ColumnDef]) -> DbResult<Vec<Projection>> {
    let mut out = Vec::new();
    for item in items {
        match item {
            SelectItem::Wildcard => {
                for (idx, col) in schema.iter().enumerate() {
                    out.push(Projection {
                        name: col.name.clone(),
                        ty: col.ty.clone(),
                        source: ColumnSource::Schema(idx),
                    });
                }
            }
            SelectItem::Column(name) => {
                let idx = schema
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(name))
                    .ok_or_else(|| {
                        DbError::Internal(format!("column \"{name}\" does not exist"))
                    })?;
                out.push(Projection {
                    name: schema[idx].name.clone(),
                    ty: schema[idx].ty.clone(),
                    source: ColumnSource::Schema(idx),
                });
            }
            SelectItem::Literal(v) => {
                out.push(Projection {
                    name: "?column?".to_string(),
                    ty: literal_column_type(v),
                    source: ColumnSource::Literal(v.clone()),
                });
            }
        }
    }
    Ok(out)
}
