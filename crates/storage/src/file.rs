//! Per-table append-only page file I/O (spec §4.2).
//!
//! Layout: `<pages_dir>/<table>.pages`, a sequence of 8192-byte pages. Page
//! 0 is always the header page, written by `create` with a bootstrap
//! metadata tuple; pages 1.. hold rows.

use crate::page::{PAGE_SIZE, Page};
use common::{DbError, DbResult, PAGE_FORMAT_VERSION, TableMetadata};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use types::ColumnDef;

fn bincode_config() -> impl bincode::config::Config {
    bincode::config::legacy()
}

/// Serialize a value into a tuple payload for [`Page::add_tuple`].
pub fn encode_tuple<T: serde::Serialize>(value: &T) -> DbResult<Vec<u8>> {
    bincode::serde::encode_to_vec(value, bincode_config())
        .map_err(|e| DbError::Deserialize(format!("encode tuple failed: {e}")))
}

/// Decode a tuple payload produced by [`encode_tuple`].
pub fn decode_tuple<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    let (value, _) = bincode::serde::decode_from_slice(bytes, bincode_config())
        .map_err(|e| DbError::Deserialize(format!("decode tuple failed: {e}")))?;
    Ok(value)
}

pub struct PageFileManager {
    pages_dir: PathBuf,
}

impl PageFileManager {
    pub fn new(pages_dir: impl Into<PathBuf>) -> Self {
        Self {
            pages_dir: pages_dir.into(),
        }
    }

    fn path_for(&self, table: &str) -> PathBuf {
        self.pages_dir.join(format!("{table}.pages"))
    }

    pub fn exists(&self, table: &str) -> bool {
        self.path_for(table).is_file()
    }

    /// Create `table`'s page file and write its header page (page 0) with a
    /// bootstrap metadata tuple. Fails if the file already exists.
    pub fn create(&self, table: &str, columns: Vec<ColumnDef>, created_at: i64) -> DbResult<()> {
        if self.exists(table) {
            return Err(DbError::FileAlreadyExists(table.to_string()));
        }
        fs::create_dir_all(&self.pages_dir)?;

        let metadata = TableMetadata {
            table_name: table.to_string(),
            created_at,
            page_format_version: PAGE_FORMAT_VERSION,
            columns,
            total_tuples: 0,
        };
        let bytes = encode_tuple(&metadata)?;
        let mut page = Page::new(0);
        page.add_tuple(&bytes)?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(self.path_for(table))?;
        file.write_all(&page.serialize())?;
        file.flush()?;
        Ok(())
    }

    fn open_for_read(&self, table: &str) -> DbResult<File> {
        File::open(self.path_for(table)).map_err(|_| DbError::FileNotFound(table.to_string()))
    }

    fn open_for_write(&self, table: &str) -> DbResult<File> {
        OpenOptions::new()
            .write(true)
            .open(self.path_for(table))
            .map_err(|_| DbError::FileNotFound(table.to_string()))
    }

    fn page_count_of(file: &File) -> DbResult<u64> {
        Ok(file.metadata()?.len() / PAGE_SIZE as u64)
    }

    /// `file_size / 8192`.
    pub fn page_count(&self, table: &str) -> DbResult<u64> {
        Self::page_count_of(&self.open_for_read(table)?)
    }

    /// Positioned read of page `n`.
    pub fn read(&self, table: &str, n: u64) -> DbResult<Page> {
        let mut file = self.open_for_read(table)?;
        if n >= Self::page_count_of(&file)? {
            return Err(DbError::PageNotFound(n));
        }
        file.seek(SeekFrom::Start(n * PAGE_SIZE as u64))?;
        let mut buf = [0u8; PAGE_SIZE];
        file.read_exact(&mut buf)
            .map_err(|e| DbError::Deserialize(format!("short read on page {n}: {e}")))?;
        Ok(Page::deserialize(buf))
    }

    /// Positioned write of `page` at index `n`.
    pub fn write(&self, table: &str, n: u64, page: &Page) -> DbResult<()> {
        let bytes = page.serialize();
        if bytes.len() != PAGE_SIZE {
            return Err(DbError::InvalidPageSize(bytes.len()));
        }
        let mut file = self.open_for_write(table)?;
        file.seek(SeekFrom::Start(n * PAGE_SIZE as u64))?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(())
    }

    /// Append `page` at the end of the file; returns the old page count.
    pub fn append(&self, table: &str, page: &Page) -> DbResult<u64> {
        let mut file = self.open_for_write(table)?;
        let new_page_no = Self::page_count_of(&file)?;
        file.seek(SeekFrom::End(0))?;
        file.write_all(&page.serialize())?;
        file.flush()?;
        Ok(new_page_no)
    }

    /// First data page (1..N-1) with room for `bytes_needed`. Read failures
    /// on individual pages are skipped rather than failing the scan.
    pub fn find_page_with_space(&self, table: &str, bytes_needed: usize) -> DbResult<u64> {
        let count = self.page_count(table)?;
        if count <= 1 {
            return Err(DbError::NoDataPages);
        }
        for n in 1..count {
            if let Ok(page) = self.read(table, n) {
                if page.has_space_for(bytes_needed) {
                    return Ok(n);
                }
            }
        }
        Err(DbError::NoSpace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ColumnType;

    fn columns() -> Vec<ColumnDef> {
        vec![ColumnDef {
            name: "id".to_string(),
            ty: ColumnType::Integer,
        }]
    }

    #[test]
    fn create_writes_header_page_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = PageFileManager::new(dir.path());
        mgr.create("users", columns(), 0).unwrap();

        assert_eq!(mgr.page_count("users").unwrap(), 1);
        let header = mgr.read("users", 0).unwrap();
        let payloads = header.tuple_payloads();
        assert_eq!(payloads.len(), 1);
        let metadata: TableMetadata = decode_tuple(payloads[0]).unwrap();
        assert_eq!(metadata.table_name, "users");
        assert_eq!(metadata.total_tuples, 0);
    }

    #[test]
    fn create_twice_fails_with_file_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = PageFileManager::new(dir.path());
        mgr.create("users", columns(), 0).unwrap();
        assert!(matches!(
            mgr.create("users", columns(), 0),
            Err(DbError::FileAlreadyExists(_))
        ));
    }

    #[test]
    fn read_beyond_eof_is_page_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = PageFileManager::new(dir.path());
        mgr.create("users", columns(), 0).unwrap();
        assert!(matches!(
            mgr.read("users", 5),
            Err(DbError::PageNotFound(5))
        ));
    }

    #[test]
    fn read_missing_table_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = PageFileManager::new(dir.path());
        assert!(matches!(
            mgr.read("ghost", 0),
            Err(DbError::FileNotFound(_))
        ));
    }

    #[test]
    fn append_then_write_round_trips_page_contents() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = PageFileManager::new(dir.path());
        mgr.create("users", columns(), 0).unwrap();

        let mut page = Page::new(1);
        page.add_tuple(b"row-one").unwrap();
        let page_no = mgr.append("users", &page).unwrap();
        assert_eq!(page_no, 1);
        assert_eq!(mgr.page_count("users").unwrap(), 2);

        page.add_tuple(b"row-two").unwrap();
        mgr.write("users", page_no, &page).unwrap();

        let reread = mgr.read("users", page_no).unwrap();
        assert_eq!(reread.tuple_payloads(), page.tuple_payloads());
    }

    #[test]
    fn find_page_with_space_skips_full_pages() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = PageFileManager::new(dir.path());
        mgr.create("users", columns(), 0).unwrap();

        assert!(matches!(
            mgr.find_page_with_space("users", 10),
            Err(DbError::NoDataPages)
        ));

        let mut full = Page::new(1);
        while full.has_space_for(500) {
            full.add_tuple(&[0u8; 500]).unwrap();
        }
        mgr.append("users", &full).unwrap();

        let mut spacious = Page::new(2);
        spacious.add_tuple(b"tiny").unwrap();
        mgr.append("users", &spacious).unwrap();

        let found = mgr.find_page_with_space("users", 10).unwrap();
        assert_eq!(found, 2);
    }
}
