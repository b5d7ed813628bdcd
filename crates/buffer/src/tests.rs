use super::*;

fn pool(capacity: usize) -> (tempfile::TempDir, BufferPool) {
    let dir = tempfile::tempdir().unwrap();
    let pages_dir = dir.path().join("pages");
    let pool = BufferPool::new(&pages_dir, capacity);
    pool.files.create("users", vec![], 0).unwrap();
    (dir, pool)
}

#[test]
fn get_page_reads_through_on_miss() {
    let (_dir, pool) = pool(8);
    let table = TableId::new("users");
    let mut page = Page::new(1);
    page.add_tuple(b"row").unwrap();
    pool.files.append("users", &page).unwrap();

    let fetched = pool.get_page(&table, 1).unwrap();
    assert_eq!(fetched.tuple_payloads(), page.tuple_payloads());
}

#[test]
fn mark_dirty_requires_pin() {
    let (_dir, pool) = pool(8);
    let table = TableId::new("users");
    let err = pool
        .mark_dirty(&table, 0, Page::new(0))
        .expect_err("page 0 not yet fetched");
    assert!(matches!(err, DbError::PageNotCached));

    pool.get_page(&table, 0).unwrap();
    pool.mark_dirty(&table, 0, Page::new(0)).unwrap();
}

#[test]
fn flush_all_writes_dirty_pages_and_clears_flag() {
    let (_dir, pool) = pool(8);
    let table = TableId::new("users");
    pool.get_page(&table, 0).unwrap();
    let mut updated = Page::new(0);
    updated.add_tuple(b"metadata-ish").unwrap();
    pool.mark_dirty(&table, 0, updated.clone()).unwrap();

    let flushed = pool.flush_all().unwrap();
    assert_eq!(flushed, 1);

    let on_disk = pool.files.read("users", 0).unwrap();
    assert_eq!(on_disk.tuple_payloads(), updated.tuple_payloads());

    // Second flush has nothing dirty left to write.
    assert_eq!(pool.flush_all().unwrap(), 0);
}

#[test]
fn single_copy_per_key_after_repeat_misses() {
    let (_dir, pool) = pool(8);
    let table = TableId::new("users");
    let _ = pool.get_page(&table, 0).unwrap();
    let _ = pool.get_page(&table, 0).unwrap();
    assert_eq!(pool.map.lock().unwrap().len(), 1);
}

#[test]
fn eviction_skips_pinned_entries_and_grows_transiently() {
    let (_dir, pool) = pool(1);
    let table = TableId::new("users");
    // Page 0 stays pinned (never unpinned).
    pool.get_page(&table, 0).unwrap();

    let mut page1 = Page::new(1);
    page1.add_tuple(b"row").unwrap();
    pool.files.append("users", &page1).unwrap();

    pool.get_page(&table, 1).unwrap();
    assert_eq!(pool.map.lock().unwrap().len(), 2);
}

#[test]
fn unpin_of_uncached_page_is_a_no_op() {
    let (_dir, pool) = pool(8);
    let table = TableId::new("users");
    pool.unpin_page(&table, 99);
}

#[test]
fn eviction_flushes_dirty_victim_before_dropping_it() {
    let (_dir, pool) = pool(1);
    let table = TableId::new("users");

    pool.get_page(&table, 0).unwrap();
    let mut updated = Page::new(0);
    updated.add_tuple(b"dirty-header").unwrap();
    pool.mark_dirty(&table, 0, updated.clone()).unwrap();
    pool.unpin_page(&table, 0);

    let mut page1 = Page::new(1);
    page1.add_tuple(b"row").unwrap();
    pool.files.append("users", &page1).unwrap();

    // Capacity 1, page 0 unpinned and dirty: fetching page 1 evicts page 0,
    // flushing it first.
    pool.get_page(&table, 1).unwrap();

    let on_disk = pool.files.read("users", 0).unwrap();
    assert_eq!(on_disk.tuple_payloads(), updated.tuple_payloads());
}
