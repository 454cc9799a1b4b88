mod buffer_pool;
mod heap_file;
mod heap_page;

pub use buffer_pool::{BufferPool, PageHandle, PageKey};
pub use heap_file::{HeapFile, HeapFileIter};
pub use heap_page::HeapPage;

use std::sync::atomic::{AtomicU64, Ordering};

/// Page size in bytes
pub const PAGE_SIZE: usize = 4096;

/// Fixed width of serialized string fields, in bytes
pub const STRING_LENGTH: usize = 32;

/// Default number of pages in the buffer pool
pub const BUFFER_POOL_SIZE: usize = 50;

/// Page ID type
pub type PageId = usize;

/// Opaque transaction identifier threaded through every storage call.
/// Selects no behavior in this engine; it is the hook a future lock
/// manager will key page locks on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        TransactionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Access intent recorded when a page is requested from the buffer pool.
/// Not enforced in this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
}
