use std::collections::{HashMap, VecDeque};

use crate::error::{DbError, DbResult};
use crate::record::{Tuple, TupleDesc, Value};
use crate::storage::TransactionId;

use super::expr::Expr;
use super::{Operator, TupleIter};

/// Blocked hash equality join.
///
/// Up to `max_buffer_size` left tuples are hashed by join key into an
/// in-memory block; the right side is rescanned once per block and each
/// right tuple is probed against the block. Matches for one right tuple
/// queue in a FIFO so every `next` call emits exactly one joined tuple.
/// Peak memory is one left block plus that FIFO.
///
/// The right operator must support opening its iterator repeatedly within
/// one transaction.
pub struct EqualityJoin {
    left: Box<dyn Operator>,
    left_key: Expr,
    right: Box<dyn Operator>,
    right_key: Expr,
    max_buffer_size: usize,
}

impl EqualityJoin {
    pub fn new(
        left: Box<dyn Operator>,
        left_key: Expr,
        right: Box<dyn Operator>,
        right_key: Expr,
        max_buffer_size: usize,
    ) -> DbResult<Self> {
        if max_buffer_size == 0 {
            return Err(DbError::IllegalOperation(
                "join buffer must hold at least one tuple".to_string(),
            ));
        }
        Ok(Self {
            left,
            left_key,
            right,
            right_key,
            max_buffer_size,
        })
    }
}

impl Operator for EqualityJoin {
    fn descriptor(&self) -> TupleDesc {
        self.left.descriptor().merge(&self.right.descriptor())
    }

    fn iterator(&self, tid: TransactionId) -> DbResult<TupleIter<'_>> {
        Ok(Box::new(JoinIter {
            op: self,
            tid,
            left: self.left.iterator(tid)?,
            left_done: false,
            block: HashMap::new(),
            right: None,
            pending: VecDeque::new(),
            done: false,
        }))
    }
}

struct JoinIter<'a> {
    op: &'a EqualityJoin,
    tid: TransactionId,
    left: TupleIter<'a>,
    left_done: bool,
    /// Current left block, join key → tuples with that key
    block: HashMap<Value, Vec<Tuple>>,
    /// Scan of the right side for the current block; `None` between blocks
    right: Option<TupleIter<'a>>,
    /// Joined tuples produced by the last right match, emitted one per call
    pending: VecDeque<Tuple>,
    done: bool,
}

impl JoinIter<'_> {
    /// Pull the next left block into the hash map. Returns false when the
    /// left side is exhausted and the block came up empty.
    fn refill_block(&mut self) -> DbResult<bool> {
        self.block.clear();
        let mut filled = 0;
        while filled < self.op.max_buffer_size && !self.left_done {
            match self.left.next() {
                None => self.left_done = true,
                Some(Err(e)) => return Err(e),
                Some(Ok(tuple)) => {
                    let key = self.op.left_key.eval(&tuple)?;
                    self.block.entry(key).or_default().push(tuple);
                    filled += 1;
                }
            }
        }
        Ok(!self.block.is_empty())
    }
}

impl Iterator for JoinIter<'_> {
    type Item = DbResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if let Some(tuple) = self.pending.pop_front() {
                return Some(Ok(tuple));
            }

            if self.right.is_none() {
                match self.refill_block() {
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                    Ok(false) => {
                        self.done = true;
                        return None;
                    }
                    Ok(true) => match self.op.right.iterator(self.tid) {
                        Ok(iter) => self.right = Some(iter),
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e));
                        }
                    },
                }
            }

            match self.right.as_mut().and_then(|iter| iter.next()) {
                // Right side exhausted for this block; loop refills
                None => self.right = None,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(right_tuple)) => {
                    let key = match self.op.right_key.eval(&right_tuple) {
                        Ok(key) => key,
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e));
                        }
                    };
                    if let Some(matches) = self.block.get(&key) {
                        for left_tuple in matches {
                            self.pending.push_back(left_tuple.join(&right_tuple));
                        }
                    }
                }
            }
        }
    }
}
