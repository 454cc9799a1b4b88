use std::sync::Arc;

use crate::error::DbResult;
use crate::record::{DataType, FieldDef, Tuple, TupleDesc, Value};
use crate::storage::{HeapFile, TransactionId};

use super::{Operator, TupleIter};

/// Sink operator: drains its child into a heap file, then emits a single
/// `(count: int)` tuple with the number of rows inserted.
pub struct InsertOp {
    file: Arc<HeapFile>,
    child: Box<dyn Operator>,
}

impl InsertOp {
    pub fn new(file: Arc<HeapFile>, child: Box<dyn Operator>) -> Self {
        Self { file, child }
    }
}

/// Single-field `count:int` descriptor shared by the sink operators
pub(super) fn count_desc() -> TupleDesc {
    TupleDesc::new(vec![FieldDef::new("count", "", DataType::Int)])
}

pub(super) fn count_tuple(count: i64) -> Tuple {
    Tuple::new(count_desc(), vec![Value::Int(count)])
}

impl Operator for InsertOp {
    fn descriptor(&self) -> TupleDesc {
        count_desc()
    }

    fn iterator(&self, tid: TransactionId) -> DbResult<TupleIter<'_>> {
        Ok(Box::new(InsertIter {
            op: self,
            tid,
            finished: false,
        }))
    }
}

struct InsertIter<'a> {
    op: &'a InsertOp,
    tid: TransactionId,
    finished: bool,
}

impl Iterator for InsertIter<'_> {
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
            let mut tuple = match tuple {
                Ok(tuple) => tuple,
                Err(e) => return Some(Err(e)),
            };
            if let Err(e) = self.op.file.insert_tuple(&mut tuple, self.tid) {
                return Some(Err(e));
            }
            count += 1;
        }

        Some(Ok(count_tuple(count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::tests::support::{heap_file, int_rows};

    #[test]
    fn test_insert_reports_count_once() {
        let (_dir, _pool, file) = heap_file("t.dat");
        let child = int_rows("x", &[1, 2, 3]);
        let insert = InsertOp::new(Arc::clone(&file), Box::new(child));

        let mut iter = insert.iterator(TransactionId::new()).unwrap();
        let result = iter.next().unwrap().unwrap();
        assert_eq!(result.values(), &[Value::Int(3)]);
        assert!(iter.next().is_none());

        let stored: Vec<_> = file
            .iterator(TransactionId::new())
            .map(|t| t.unwrap().values()[0].clone())
            .collect();
        assert_eq!(stored, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_insert_empty_child() {
        let (_dir, _pool, file) = heap_file("t.dat");
        let child = int_rows("x", &[]);
        let insert = InsertOp::new(Arc::clone(&file), Box::new(child));

        let mut iter = insert.iterator(TransactionId::new()).unwrap();
        assert_eq!(iter.next().unwrap().unwrap().values(), &[Value::Int(0)]);
        assert!(iter.next().is_none());
    }
}
