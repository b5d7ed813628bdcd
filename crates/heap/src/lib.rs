//! Table lifecycle and row operations over the buffer pool (spec §4.4).
//!
//! `HeapStorage` holds no pages itself; every page it touches is borrowed
//! from the [`BufferPool`] under a pin and returned promptly. The table's
//! schema and row count live in the metadata tuple on page 0, rewritten on
//! every `insert_row`.


use buffer::BufferPool;
use common::{DbError, DbResult, Row, TableId, TableMetadata};
use expr::{EvalContext, Expr};
use std::sync::Arc;
use storage::{PAGE_SIZE, Page, decode_tuple, encode_tuple};
use types::{ColumnDef, Value};

/// Snapshot returned by [`HeapStorage::table_info`].
#[derive(Clone, Debug, PartialEq)]
pub struct TableInfo {
    pub row_count: u64,
    pub page_count: u64,
    pub data_pages: u64,
    pub file_size: u64,
    pub created_at: i64,
    pub schema: Vec<ColumnDef>,
}

pub struct HeapStorage {
    pool: Arc<BufferPool>,
}

impl HeapStorage {
    pub fn new(pool: Arc<BufferPool>) -> Self {
        Self { pool }
    }

    pub fn create_table(&self, name: &str, columns: Vec<ColumnDef>) -> DbResult<()> {
        if self.pool.files().exists(name) {
            return Err(DbError::TableAlreadyExists(name.to_string()));
        }
        self.pool
            .files()
            .create(name, columns, chrono::Utc::now().timestamp())
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.pool.files().exists(name)
    }

    pub fn get_schema(&self, name: &str) -> DbResult<Vec<ColumnDef>> {
        Ok(self.load_metadata(&TableId::new(name))?.columns)
    }

    /// Insert a row, returning its freshly allocated `row_id`.
    pub fn insert_row(&self, name: &str, values: Vec<Value>) -> DbResult<u64> {
        let table = TableId::new(name);
        let mut metadata = self.load_metadata(&table)?;
        let row_id = metadata.total_tuples + 1;
        let row = Row::new(row_id, values);
        let bytes = encode_tuple(&row)?;

        let (page_no, mut page) = self.find_or_append_page_with_space(&table, bytes.len())?;
        page.add_tuple(&bytes)?;
        self.pool.mark_dirty(&table, page_no, page)?;
        self.pool.unpin_page(&table, page_no);

        metadata.total_tuples = row_id;
        self.rewrite_header(&table, &metadata)?;
        Ok(row_id)
    }

    /// Find a data page with room for `bytes_needed`, consulting the buffer
    /// pool rather than the on-disk file so a page that's full in cache but
    /// not yet flushed is seen as full. Appends a fresh page if none has
    /// space.
    fn find_or_append_page_with_space(
        &self,
        table: &TableId,
        bytes_needed: usize,
    ) -> DbResult<(u64, Page)> {
        let count = self.pool.files().page_count(table.as_str())?;
        for n in 1..count {
            let page = self.pool.get_page(table, n)?;
            if page.has_space_for(bytes_needed) {
                return Ok((n, page));
            }
            self.pool.unpin_page(table, n);
        }

        let new_index = count;
        self.pool
            .files()
            .append(table.as_str(), &Page::new(new_index))?;
        let page = self.pool.get_page(table, new_index)?;
        Ok((new_index, page))
    }

    /// Concatenate every data page's tuples, in page and insertion order.
    /// Unreadable pages and malformed tuples are skipped with a warning
    /// rather than failing the whole scan.
    pub fn select_all_rows(&self, name: &str) -> DbResult<Vec<Vec<Value>>> {
        let table = TableId::new(name);
        let count = self.pool.files().page_count(name)?;
        let mut rows = Vec::new();

        for n in 1..count {
            let page = match self.pool.get_page(&table, n) {
                Ok(page) => page,
                Err(err) => {
                    tracing::warn!(table = name, page = n, error = %err, "skipping unreadable page");
                    continue;
                }
            };
            for payload in page.tuple_payloads() {
                match decode_tuple::<Row>(payload) {
                    Ok(row) => rows.push(row.values),
                    Err(err) => {
                        tracing::warn!(table = name, page = n, error = %err, "skipping malformed tuple");
                    }
                }
            }
            self.pool.unpin_page(&table, n);
        }
        Ok(rows)
    }

    /// Rebuild every data page, replacing `column`'s value with
    /// `new_value` on rows matching `selection` (or all rows if `None`).
    /// Returns the number of rows updated.
    pub fn update_row(
        &self,
        name: &str,
        column: &str,
        new_value: Value,
        selection: Option<&Expr>,
    ) -> DbResult<u64> {
        let table = TableId::new(name);
        let metadata = self.load_metadata(&table)?;
        let schema_names: Vec<String> = metadata.columns.iter().map(|c| c.name.clone()).collect();
        let col_idx = schema_names
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .ok_or_else(|| DbError::Internal(format!("column \"{column}\" does not exist")))?;
        let ctx = EvalContext::new(&schema_names);

        let count = self.pool.files().page_count(name)?;
        let mut updated = 0u64;

        for n in 1..count {
            let page = match self.pool.get_page(&table, n) {
                Ok(page) => page,
                Err(err) => {
                    tracing::warn!(table = name, page = n, error = %err, "skipping unreadable page");
                    continue;
                }
            };

            let mut rebuilt = Page::new(n);
            let mut changed = false;
            for payload in page.tuple_payloads() {
                let mut row: Row = match decode_tuple(payload) {
                    Ok(row) => row,
                    Err(err) => {
                        tracing::warn!(table = name, page = n, error = %err, "skipping malformed tuple");
                        continue;
                    }
                };

                let matches = match selection {
                    None => true,
                    Some(expr) => ctx.eval(expr, &row)?.as_bool().unwrap_or(false),
                };
                if matches {
                    row.values[col_idx] = new_value.clone();
                    updated += 1;
                    changed = true;
                }

                let bytes = encode_tuple(&row)?;
                rebuilt
                    .add_tuple(&bytes)
                    .map_err(|_| DbError::Internal("row no longer fits after update".to_string()))?;
            }

            if changed {
                self.pool.mark_dirty(&table, n, rebuilt)?;
            }
            self.pool.unpin_page(&table, n);
        }

        Ok(updated)
    }

    pub fn table_info(&self, name: &str) -> DbResult<TableInfo> {
        let metadata = self.load_metadata(&TableId::new(name))?;
        let page_count = self.pool.files().page_count(name)?;
        Ok(TableInfo {
            row_count: metadata.total_tuples,
            page_count,
            data_pages: page_count.saturating_sub(1),
            file_size: page_count * PAGE_SIZE as u64,
            created_at: metadata.created_at,
            schema: metadata.columns,
        })
    }

    fn load_metadata(&self, table: &TableId) -> DbResult<TableMetadata> {
        let page = self.pool.get_page(table, 0)?;
        let payloads = page.tuple_payloads();
        let bytes = payloads
            .first()
            .ok_or_else(|| DbError::Internal("header page has no metadata tuple".to_string()))?;
        let metadata = decode_tuple(bytes)?;
        self.pool.unpin_page(table, 0);
        Ok(metadata)
    }

    fn rewrite_header(&self, table: &TableId, metadata: &TableMetadata) -> DbResult<()> {
        let _pinned = self.pool.get_page(table, 0)?;
        let mut page = Page::new(0);
        let bytes = encode_tuple(metadata)?;
        page.add_tuple(&bytes)?;
        self.pool.mark_dirty(table, 0, page)?;
        self.pool.unpin_page(table, 0);
        Ok(())
    }
}
