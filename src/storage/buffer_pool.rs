use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use lru::LruCache;

use crate::error::{DbError, DbResult};

use super::heap_file::HeapFile;
use super::heap_page::HeapPage;
use super::{BUFFER_POOL_SIZE, PageId, Permission, TransactionId};

/// Structural identity of a page: backing file path plus page number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub path: PathBuf,
    pub page_no: PageId,
}

/// A resident page. The pool hands out one shared handle per page, so
/// every requester sees the same object while the page stays resident.
pub type PageHandle = Arc<RwLock<HeapPage>>;

/// Bounded cache of heap pages, the sole conduit between operators and
/// the heap files on disk.
///
/// Recency is tracked with an LRU list, but eviction never touches a
/// dirty page: the victim is the least-recently-used clean page, and when
/// every resident page is dirty the pool reports `BufferFull` rather than
/// silently dropping modifications.
pub struct BufferPool {
    /// Unbounded cache; capacity is enforced by `make_room` so that the
    /// dirty-page rule is never bypassed by an automatic eviction.
    pages: LruCache<PageKey, PageHandle>,
    capacity: usize,
}

impl BufferPool {
    pub fn new(max_pages: usize) -> Self {
        Self {
            pages: LruCache::unbounded(),
            capacity: max_pages,
        }
    }

    /// Fetch a page, reading it through `file` on a miss.
    ///
    /// The transaction id and permission are recorded surfaces for a
    /// future lock manager; neither selects behavior here.
    pub fn get_page(
        &mut self,
        file: &HeapFile,
        page_no: PageId,
        _tid: TransactionId,
        _perm: Permission,
    ) -> DbResult<PageHandle> {
        let key = file.page_key(page_no);
        if let Some(page) = self.pages.get(&key) {
            return Ok(Arc::clone(page));
        }

        let page = file.read_page(page_no)?;
        let handle: PageHandle = Arc::new(RwLock::new(page));
        self.make_room()?;
        self.pages.put(key, Arc::clone(&handle));
        Ok(handle)
    }

    /// Admit a page the caller just flushed, if capacity allows. Lets the
    /// heap file keep a freshly allocated page resident without a
    /// re-read, while the residency decision stays inside the pool.
    pub fn cache_page(&mut self, key: PageKey, page: PageHandle) {
        if self.pages.len() < self.capacity {
            self.pages.put(key, page);
        }
    }

    /// Write every resident dirty page back to its backing file and clear
    /// its dirty flag.
    pub fn flush_all_pages(&mut self) -> DbResult<()> {
        for (_, handle) in self.pages.iter() {
            let mut page = handle.write().unwrap();
            if page.is_dirty() {
                write_back(&mut page)?;
            }
        }
        Ok(())
    }

    /// Flush a single resident page, if present and dirty
    pub fn flush_page(&mut self, key: &PageKey) -> DbResult<()> {
        if let Some(handle) = self.pages.peek(key) {
            let mut page = handle.write().unwrap();
            if page.is_dirty() {
                write_back(&mut page)?;
            }
        }
        Ok(())
    }

    /// Transaction commit hook. Flush-all semantics are all this engine
    /// needs; a lock manager will refine this per transaction.
    pub fn commit_transaction(&mut self, _tid: TransactionId) -> DbResult<()> {
        self.flush_all_pages()
    }

    /// Transaction abort hook; a placeholder until pages carry undo state
    pub fn abort_transaction(&mut self, _tid: TransactionId) {}

    pub fn resident_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn dirty_pages(&self) -> usize {
        self.pages
            .iter()
            .filter(|(_, p)| p.read().unwrap().is_dirty())
            .count()
    }

    pub fn contains(&self, key: &PageKey) -> bool {
        self.pages.contains(key)
    }

    /// Drop the least-recently-used clean page when the pool is at
    /// capacity. All-dirty residency is a `BufferFull` error.
    fn make_room(&mut self) -> DbResult<()> {
        if self.pages.len() < self.capacity {
            return Ok(());
        }

        // iter() walks from most to least recently used, so the last
        // clean entry is the LRU victim
        let victim = self
            .pages
            .iter()
            .filter(|(_, page)| !page.read().unwrap().is_dirty())
            .map(|(key, _)| key.clone())
            .last();

        match victim {
            Some(key) => {
                self.pages.pop(&key);
                Ok(())
            }
            None => Err(DbError::BufferFull),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(BUFFER_POOL_SIZE)
    }
}

/// Write a page at its recorded offset in its recorded backing file
fn write_back(page: &mut HeapPage) -> DbResult<()> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(page.backing_path())?;
    page.write_to_file(&mut file)?;
    page.set_dirty(false);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DataType, FieldDef, Tuple, TupleDesc, Value};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn int_desc() -> TupleDesc {
        TupleDesc::new(vec![FieldDef::new("x", "", DataType::Int)])
    }

    fn int_tuple(v: i64) -> Tuple {
        Tuple::new(int_desc(), vec![Value::Int(v)])
    }

    /// Seed `pages` full pages through a throwaway large pool, then open
    /// the file against a fresh pool of the requested capacity.
    fn setup(capacity: usize, pages: usize) -> (TempDir, Arc<Mutex<BufferPool>>, Arc<HeapFile>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.dat");

        {
            let seed_pool = Arc::new(Mutex::new(BufferPool::default()));
            let file = HeapFile::new(&path, int_desc(), Arc::clone(&seed_pool)).unwrap();
            let tid = TransactionId::new();
            let per_page = (crate::storage::PAGE_SIZE - 8) / 8;
            for i in 0..pages * per_page {
                file.insert_tuple(&mut int_tuple(i as i64), tid).unwrap();
            }
            seed_pool.lock().unwrap().flush_all_pages().unwrap();
        }

        let pool = Arc::new(Mutex::new(BufferPool::new(capacity)));
        let file = Arc::new(HeapFile::new(&path, int_desc(), Arc::clone(&pool)).unwrap());
        (dir, pool, file)
    }

    #[test]
    fn test_get_page_identity_preserved() {
        let (_dir, pool, file) = setup(4, 1);
        let tid = TransactionId::new();

        let mut pool = pool.lock().unwrap();
        let a = pool.get_page(&file, 0, tid, Permission::Read).unwrap();
        let b = pool.get_page(&file, 0, tid, Permission::Read).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_clean_page_evicted_when_full() {
        let (_dir, pool, file) = setup(2, 3);
        let tid = TransactionId::new();

        let mut pool = pool.lock().unwrap();
        pool.get_page(&file, 0, tid, Permission::Read).unwrap();
        pool.get_page(&file, 1, tid, Permission::Read).unwrap();
        pool.get_page(&file, 2, tid, Permission::Read).unwrap();

        assert_eq!(pool.resident_pages(), 2);
        assert!(!pool.contains(&file.page_key(0)));
        assert!(pool.contains(&file.page_key(1)));
        assert!(pool.contains(&file.page_key(2)));
    }

    #[test]
    fn test_recently_used_page_survives_eviction() {
        let (_dir, pool, file) = setup(2, 3);
        let tid = TransactionId::new();

        let mut pool = pool.lock().unwrap();
        pool.get_page(&file, 0, tid, Permission::Read).unwrap();
        pool.get_page(&file, 1, tid, Permission::Read).unwrap();
        // Touch page 0 so page 1 becomes the LRU victim
        pool.get_page(&file, 0, tid, Permission::Read).unwrap();
        pool.get_page(&file, 2, tid, Permission::Read).unwrap();

        assert!(pool.contains(&file.page_key(0)));
        assert!(!pool.contains(&file.page_key(1)));
    }

    #[test]
    fn test_all_dirty_reports_buffer_full() {
        let (_dir, pool, file) = setup(2, 3);
        let tid = TransactionId::new();

        let mut pool = pool.lock().unwrap();
        for page_no in 0..2 {
            let page = pool.get_page(&file, page_no, tid, Permission::Write).unwrap();
            page.write().unwrap().set_dirty(true);
        }

        let result = pool.get_page(&file, 2, tid, Permission::Read);
        assert!(matches!(result, Err(DbError::BufferFull)));
    }

    #[test]
    fn test_flush_all_clears_dirty_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(Mutex::new(BufferPool::new(4)));
        let file = Arc::new(
            HeapFile::new(dir.path().join("t.dat"), int_desc(), Arc::clone(&pool)).unwrap(),
        );
        let tid = TransactionId::new();
        file.insert_tuple(&mut int_tuple(1), tid).unwrap();

        {
            let mut pool = pool.lock().unwrap();
            let page = pool.get_page(&file, 0, tid, Permission::Write).unwrap();
            page.write().unwrap().insert(&mut int_tuple(12345)).unwrap();
        }

        let mut pool = pool.lock().unwrap();
        assert_eq!(pool.dirty_pages(), 1);
        pool.flush_all_pages().unwrap();
        assert_eq!(pool.dirty_pages(), 0);

        // A fresh read from disk must observe the new tuple
        let reread = file.read_page(0).unwrap();
        assert!(
            reread
                .tuples()
                .any(|t| t.values()[0] == Value::Int(12345))
        );
    }
}
