use std::sync::Arc;

use crate::error::DbResult;
use crate::record::{Tuple, TupleDesc};
use crate::storage::{HeapFile, TransactionId};

use super::insert::{count_desc, count_tuple};
use super::{Operator, TupleIter};

/// Sink operator: deletes every child tuple from a heap file by record
/// id, then emits a single `(count: int)` tuple.
///
/// The child must yield tuples carrying rids, which a scan of the same
/// file provides.
pub struct DeleteOp {
    file: Arc<HeapFile>,
    child: Box<dyn Operator>,
}

impl DeleteOp {
    pub fn new(file: Arc<HeapFile>, child: Box<dyn Operator>) -> Self {
        Self { file, child }
    }
}

impl Operator for DeleteOp {
    fn descriptor(&self) -> TupleDesc {
        count_desc()
    }

    fn iterator(&self, tid: TransactionId) -> DbResult<TupleIter<'_>> {
        Ok(Box::new(DeleteIter {
            op: self,
            tid,
            finished: false,
        }))
    }
}

struct DeleteIter<'a> {
    op: &'a DeleteOp,
    tid: TransactionId,
    finished: bool,
}

impl Iterator for DeleteIter<'_> {
    type Item = DbResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        self.finished = true;

        let mut count = 0;
        let child = match self.op.child.iterator(self.tid) {
            Ok(child) => child,
            Err(e) => return Some(Err(e)),
        };
        for tuple in child {
            let tuple = match tuple {
                Ok(tuple) => tuple,
                Err(e) => return Some(Err(e)),
            };
            if let Err(e) = self.op.file.delete_tuple(&tuple, self.tid) {
                return Some(Err(e));
            }
            count += 1;
        }

        Some(Ok(count_tuple(count)))
    }
}
