//! Bounded, concurrent page cache sitting between heap storage and the
//! page file manager (spec §4.3, §5).
//!
//! Synchronization follows discipline (a) from spec §5: a single
//! [`Mutex`] protects the key→entry map, while each entry's `pin_count`,
//! `dirty`, and `last_access` are per-entry atomics so a cache hit never
//! blocks on another hit. The slow path (disk read on a miss) runs in the
//! caller's own execution context, outside the map lock, so concurrent
//! misses on different keys never serialize on I/O.

#[cfg(test)]
mod tests;

use common::{DbError, DbResult, PageId, TableId};
use hashbrown::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use storage::{PageFileManager, Page};

type Key = (TableId, PageId);

struct BufferEntry {
    page: RwLock<Page>,
    pin_count: AtomicU32,
    dirty: AtomicBool,
    last_access: AtomicU64,
}

impl BufferEntry {
    fn new(page: Page, tick: u64) -> Self {
        Self {
            page: RwLock::new(page),
            pin_count: AtomicU32::new(1),
            dirty: AtomicBool::new(false),
            last_access: AtomicU64::new(tick),
        }
    }

    fn touch(&self, tick: u64) {
        self.last_access.store(tick, Ordering::SeqCst);
    }
}

/// Bounded cache of `(table, page_no) -> Page`, with pinning, dirty
/// tracking, and LRU eviction over unpinned entries.
pub struct BufferPool {
    capacity: usize,
    files: PageFileManager,
    map: Mutex<HashMap<Key, Arc<BufferEntry>>>,
    clock: AtomicU64,
}

impl BufferPool {
    pub fn new(pages_dir: impl Into<std::path::PathBuf>, capacity: usize) -> Self {
        Self {
            capacity,
            files: PageFileManager::new(pages_dir),
            map: Mutex::new(HashMap::new()),
            clock: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }

    /// Fetch a page, pinning it. Fast path on a cache hit; a cache miss
    /// reads through to the page file manager without holding the map
    /// lock during I/O.
    pub fn get_page(&self, table: &TableId, n: u64) -> DbResult<Page> {
        let key = (table.clone(), PageId(n));

        if let Some(entry) = self.map.lock().unwrap().get(&key) {
            entry.pin_count.fetch_add(1, Ordering::SeqCst);
            entry.touch(self.tick());
            return Ok(entry.page.read().unwrap().clone());
        }

        let loaded = self.files.read(table.as_str(), n)?;
        let entry = Arc::new(BufferEntry::new(loaded.clone(), self.tick()));

        let mut map = self.map.lock().unwrap();
        if map.len() >= self.capacity && !map.contains_key(&key) {
            self.evict_one_locked(&mut map);
        }
        // Insert regardless of a racing insert under the same key: both
        // callers then observe whichever page won the race, satisfying the
        // "exactly one entry for the key" invariant.
        map.insert(key, entry);
        Ok(loaded)
    }

    /// Replace the cached page for `(table, n)` and mark it dirty. Requires
    /// the entry to be currently pinned.
    pub fn mark_dirty(&self, table: &TableId, n: u64, updated_page: Page) -> DbResult<()> {
        let key = (table.clone(), PageId(n));
        let map = self.map.lock().unwrap();
        let entry = map.get(&key).ok_or(DbError::PageNotCached)?;
        if entry.pin_count.load(Ordering::SeqCst) == 0 {
            return Err(DbError::PageNotPinned);
        }
        *entry.page.write().unwrap() = updated_page;
        entry.dirty.store(true, Ordering::SeqCst);
        entry.touch(self.tick());
        Ok(())
    }

    /// Saturating decrement of the pin count. A no-op (with a logged
    /// warning) if the page is not cached.
    pub fn unpin_page(&self, table: &TableId, n: u64) {
        let key = (table.clone(), PageId(n));
        let map = self.map.lock().unwrap();
        match map.get(&key) {
            Some(entry) => {
                let _ = entry
                    .pin_count
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| {
                        Some(c.saturating_sub(1))
                    });
            }
            None => tracing::warn!(table = %table, page = n, "unpin of uncached page"),
        }
    }

    /// Write every dirty entry to disk and clear its dirty flag. Write
    /// errors are reported via a warning but do not abort the sweep.
    pub fn flush_all(&self) -> DbResult<usize> {
        let snapshot: Vec<(Key, Arc<BufferEntry>)> = self
            .map
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut flushed = 0;
        for ((table, page_id), entry) in snapshot {
            if !entry.dirty.load(Ordering::SeqCst) {
                continue;
            }
            let page = entry.page.read().unwrap().clone();
            match self.files.write(table.as_str(), page_id.0, &page) {
                Ok(()) => {
                    entry.dirty.store(false, Ordering::SeqCst);
                    flushed += 1;
                }
                Err(err) => {
                    tracing::warn!(table = %table, page = page_id.0, error = %err, "flush failed");
                }
            }
        }
        Ok(flushed)
    }

    /// Evict the unpinned entry with the oldest `last_access`. A no-op if
    /// every entry is pinned (capacity grows transiently, as permitted by
    /// spec §4.3).
    fn evict_one_locked(&self, map: &mut HashMap<Key, Arc<BufferEntry>>) {
        let victim = map
            .iter()
            .filter(|(_, entry)| entry.pin_count.load(Ordering::SeqCst) == 0)
            .min_by_key(|(_, entry)| entry.last_access.load(Ordering::SeqCst))
            .map(|(k, _)| k.clone());

        let Some(key) = victim else {
            tracing::warn!(capacity = self.capacity, "buffer pool full of pinned pages, growing transiently");
            return;
        };

        let entry = map.remove(&key).expect("victim key came from this map");
        if entry.dirty.load(Ordering::SeqCst) {
            let page = entry.page.read().unwrap().clone();
            match self.files.write(key.0.as_str(), key.1.0, &page) {
                Ok(()) | Err(DbError::FileNotFound(_)) => {}
                Err(err) => {
                    tracing::warn!(table = %key.0, page = key.1.0, error = %err, "eviction flush failed");
                }
            }
        }
    }

    /// The underlying page file manager, for operations the pool doesn't
    /// front (e.g. `create`, `append`, `find_page_with_space`).
    pub fn files(&self) -> &PageFileManager {
        &self.files
    }
}
