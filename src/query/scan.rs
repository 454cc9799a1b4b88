use std::sync::Arc;

use crate::error::DbResult;
use crate::record::TupleDesc;
use crate::storage::{HeapFile, TransactionId};

use super::{Operator, TupleIter};

/// Leaf operator: a full scan of one heap file in (page, slot) order
pub struct SeqScan {
    file: Arc<HeapFile>,
}

impl SeqScan {
    pub fn new(file: Arc<HeapFile>) -> Self {
        Self { file }
    }
}

impl Operator for SeqScan {
    fn descriptor(&self) -> TupleDesc {
        self.file.descriptor().clone()
    }

    fn iterator(&self, tid: TransactionId) -> DbResult<TupleIter<'_>> {
        Ok(Box::new(self.file.iterator(tid)))
    }
}
