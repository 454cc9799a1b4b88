use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::vec::IntoIter;

use crate::error::{DbError, DbResult};
use crate::record::{DataType, Tuple, TupleDesc, Value, fixed_width_prefix};

use super::buffer_pool::{BufferPool, PageKey};
use super::heap_page::HeapPage;
use super::{PAGE_SIZE, PageId, Permission, TransactionId};

/// An unordered table stored as a sequence of fixed-size heap pages in one
/// OS file.
///
/// All page access is routed through the buffer pool; the file itself only
/// performs raw page reads on pool misses and page writes on flush. The
/// mutable bookkeeping (lazy file handle, free-slot hints, page count)
/// lives behind mutexes so one `Arc<HeapFile>` can serve as both a scan
/// source and an insert/delete sink within a single query plan.
pub struct HeapFile {
    path: PathBuf,
    desc: TupleDesc,
    pool: Arc<Mutex<BufferPool>>,
    /// Lazily opened handle used for page flushes
    file: Mutex<Option<File>>,
    /// Advisory set of pages believed to have free slots; entries are
    /// pruned when a page is observed full
    free_pages: Mutex<HashSet<PageId>>,
    page_count: Mutex<usize>,
}

impl HeapFile {
    /// Open or create the heap file at `path`. The page count is derived
    /// from the file length, rounded up to whole pages.
    pub fn new(
        path: impl AsRef<Path>,
        desc: TupleDesc,
        pool: Arc<Mutex<BufferPool>>,
    ) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_backing(&path)?;
        let page_count = file.metadata()?.len().div_ceil(PAGE_SIZE as u64) as usize;

        Ok(Self {
            path,
            desc,
            pool,
            file: Mutex::new(None),
            free_pages: Mutex::new(HashSet::new()),
            page_count: Mutex::new(page_count),
        })
    }

    pub fn descriptor(&self) -> &TupleDesc {
        &self.desc
    }

    pub fn backing_path(&self) -> &Path {
        &self.path
    }

    pub fn num_pages(&self) -> usize {
        *self.page_count.lock().unwrap()
    }

    /// Value-comparable key identifying one page of this file in the
    /// buffer pool
    pub fn page_key(&self, page_no: PageId) -> PageKey {
        PageKey {
            path: self.path.clone(),
            page_no,
        }
    }

    /// Read the page at `page_no` from disk. Short reads are zero-filled,
    /// so a page past the end of the file decodes as empty.
    ///
    /// Called by the buffer pool on a miss; everything else goes through
    /// `BufferPool::get_page`.
    pub fn read_page(&self, page_no: PageId) -> DbResult<HeapPage> {
        let mut file = open_backing(&self.path)?;
        file.seek(SeekFrom::Start((page_no * PAGE_SIZE) as u64))?;

        let mut buf = vec![0u8; PAGE_SIZE];
        let mut filled = 0;
        while filled < PAGE_SIZE {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        let mut page = HeapPage::new(self.desc.clone(), page_no, &self.path)?;
        page.init_from_buffer(&buf)?;
        Ok(page)
    }

    /// Write the page back at its offset and clear its dirty flag
    pub fn flush_page(&self, page: &mut HeapPage) -> DbResult<()> {
        let mut guard = self.file.lock().unwrap();
        if guard.is_none() {
            *guard = Some(open_backing(&self.path)?);
        }
        let file = guard.as_mut().expect("handle opened above");
        page.write_to_file(file)?;
        page.set_dirty(false);
        Ok(())
    }

    /// Insert a tuple, stamping its record id.
    ///
    /// Hinted pages with free slots are tried first through the buffer
    /// pool. When none admit the tuple, a fresh page is allocated at the
    /// end of the file, written out immediately, and offered to the pool.
    pub fn insert_tuple(&self, tuple: &mut Tuple, tid: TransactionId) -> DbResult<()> {
        if tuple.values().len() != tuple.desc().num_fields() {
            return Err(DbError::IllegalOperation(
                "tuple value count does not match its descriptor".to_string(),
            ));
        }
        if !self.desc.equals(tuple.desc()) {
            return Err(DbError::TypeMismatch(
                "tuple descriptor does not match the file".to_string(),
            ));
        }

        let mut candidates: Vec<PageId> =
            self.free_pages.lock().unwrap().iter().copied().collect();
        candidates.sort_unstable();

        for page_no in candidates {
            let handle =
                self.pool
                    .lock()
                    .unwrap()
                    .get_page(self, page_no, tid, Permission::Write)?;
            let mut page = handle.write().unwrap();
            if page.is_full() {
                drop(page);
                self.free_pages.lock().unwrap().remove(&page_no);
                continue;
            }
            page.insert(tuple)?;
            return Ok(());
        }

        // Every hinted page was full: allocate at the end of the file
        let page_no = self.num_pages();
        let mut page = HeapPage::new(self.desc.clone(), page_no, &self.path)?;
        page.insert(tuple)?;
        self.flush_page(&mut page)?;

        self.pool
            .lock()
            .unwrap()
            .cache_page(self.page_key(page_no), Arc::new(RwLock::new(page)));
        self.free_pages.lock().unwrap().insert(page_no);
        *self.page_count.lock().unwrap() += 1;
        Ok(())
    }

    /// Remove the tuple addressed by its record id and remember that its
    /// page has a free slot again
    pub fn delete_tuple(&self, tuple: &Tuple, tid: TransactionId) -> DbResult<()> {
        let rid = tuple
            .rid()
            .ok_or_else(|| DbError::TupleNotFound("tuple has no record id".to_string()))?;
        if rid.page_no >= self.num_pages() {
            return Err(DbError::TupleNotFound(format!(
                "page {} is out of range",
                rid.page_no
            )));
        }

        let handle = self
            .pool
            .lock()
            .unwrap()
            .get_page(self, rid.page_no, tid, Permission::Write)?;
        handle.write().unwrap().delete(rid)?;

        self.free_pages.lock().unwrap().insert(rid.page_no);
        Ok(())
    }

    /// Scan the file in (page, slot) order. The page range is fixed when
    /// the iterator is constructed; tuples inserted afterwards may or may
    /// not be observed.
    pub fn iterator(&self, tid: TransactionId) -> HeapFileIter<'_> {
        HeapFileIter {
            file: self,
            tid,
            page_count: self.num_pages(),
            next_page: 0,
            current: Vec::new().into_iter(),
            done: false,
        }
    }

    /// Bulk-load rows from CSV, one `insert_tuple` per row with a flush of
    /// all dirty pages after each.
    ///
    /// Integer fields are parsed through a float intermediate and
    /// truncated; string fields are cut to the fixed width. A row with the
    /// wrong field count aborts the load. `skip_last_field` drops the
    /// final field of every row, for data sets that end each line with a
    /// trailing separator. Returns the number of rows loaded.
    pub fn load_from_csv<R: Read>(
        &self,
        reader: R,
        has_header: bool,
        separator: u8,
        skip_last_field: bool,
    ) -> DbResult<usize> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(separator)
            .has_headers(has_header)
            .flexible(true)
            .from_reader(reader);

        let mut loaded = 0;
        for (line, record) in csv_reader.records().enumerate() {
            let record =
                record.map_err(|e| DbError::MalformedData(format!("CSV parse: {}", e)))?;
            let mut fields: Vec<&str> = record.iter().collect();
            if skip_last_field {
                fields.pop();
            }
            if fields.len() != self.desc.num_fields() {
                return Err(DbError::MalformedData(format!(
                    "line {}: expected {} fields, got {}",
                    line + 1,
                    self.desc.num_fields(),
                    fields.len()
                )));
            }

            let mut values = Vec::with_capacity(fields.len());
            for (field, def) in fields.iter().zip(self.desc.fields()) {
                match def.data_type {
                    DataType::Int => {
                        let trimmed = field.trim();
                        let parsed: f64 = trimmed.parse().map_err(|_| {
                            DbError::TypeMismatch(format!(
                                "line {}: cannot convert {:?} to int",
                                line + 1,
                                trimmed
                            ))
                        })?;
                        values.push(Value::Int(parsed as i64));
                    }
                    DataType::Char => {
                        values.push(Value::Str(fixed_width_prefix(field).to_string()));
                    }
                }
            }

            let mut tuple = Tuple::new(self.desc.clone(), values);
            self.insert_tuple(&mut tuple, TransactionId::new())?;
            self.pool.lock().unwrap().flush_all_pages()?;
            loaded += 1;
        }
        Ok(loaded)
    }
}

fn open_backing(path: &Path) -> DbResult<File> {
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?)
}

/// Streaming scan over a heap file, in ascending (page, slot) order.
///
/// Each page's occupied tuples are copied out under a short page lock, so
/// the scan never holds a page borrow across `next` calls and the same
/// file can be mutated while a scan is in flight.
pub struct HeapFileIter<'a> {
    file: &'a HeapFile,
    tid: TransactionId,
    page_count: usize,
    next_page: PageId,
    current: IntoIter<Tuple>,
    done: bool,
}

impl Iterator for HeapFileIter<'_> {
    type Item = DbResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if let Some(tuple) = self.current.next() {
                return Some(Ok(tuple));
            }

            if self.next_page >= self.page_count {
                self.done = true;
                return None;
            }

            let page_no = self.next_page;
            self.next_page += 1;

            let handle = match self.file.pool.lock().unwrap().get_page(
                self.file,
                page_no,
                self.tid,
                Permission::Read,
            ) {
                Ok(handle) => handle,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            let tuples: Vec<Tuple> = handle.read().unwrap().tuples().cloned().collect();
            self.current = tuples.into_iter();
        }
    }
}
