use crate::error::DbResult;
use crate::record::{Predicate, Tuple, TupleDesc};
use crate::storage::TransactionId;

use super::expr::Expr;
use super::{Operator, TupleIter};

/// Emits the child tuples for which `left <pred> right` holds, with both
/// expressions evaluated against the same tuple
pub struct Filter {
    pred: Predicate,
    left: Expr,
    right: Expr,
    child: Box<dyn Operator>,
}

impl Filter {
    pub fn new(pred: Predicate, left: Expr, right: Expr, child: Box<dyn Operator>) -> Self {
        Self {
            pred,
            left,
            right,
            child,
        }
    }
}

impl Operator for Filter {
    fn descriptor(&self) -> TupleDesc {
        self.child.descriptor()
    }

    fn iterator(&self, tid: TransactionId) -> DbResult<TupleIter<'_>> {
        Ok(Box::new(FilterIter {
            op: self,
            child: self.child.iterator(tid)?,
            done: false,
        }))
    }
}

struct FilterIter<'a> {
    op: &'a Filter,
    child: TupleIter<'a>,
    done: bool,
}

impl Iterator for FilterIter<'_> {
    type Item = DbResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let tuple = match self.child.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(tuple)) => tuple,
            };

            let keep = self.op.left.eval(&tuple).and_then(|left| {
                let right = self.op.right.eval(&tuple)?;
                left.eval_pred(&right, self.op.pred)
            });
            match keep {
                Ok(true) => return Some(Ok(tuple)),
                Ok(false) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
