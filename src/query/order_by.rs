use std::cmp::Ordering;

use crate::error::{DbError, DbResult};
use crate::record::{Tuple, TupleDesc, Value};
use crate::storage::TransactionId;

use super::expr::Expr;
use super::{Operator, TupleIter};

/// Blocking sort of the child stream under a lexicographic comparator.
///
/// The whole child output is materialized before the first tuple is
/// emitted; peak memory is the size of the child stream.
pub struct OrderBy {
    keys: Vec<Expr>,
    ascending: Vec<bool>,
    child: Box<dyn Operator>,
}

impl OrderBy {
    pub fn new(keys: Vec<Expr>, ascending: Vec<bool>, child: Box<dyn Operator>) -> DbResult<Self> {
        if keys.len() != ascending.len() {
            return Err(DbError::IllegalOperation(format!(
                "{} sort keys but {} ascending flags",
                keys.len(),
                ascending.len()
            )));
        }
        Ok(Self {
            keys,
            ascending,
            child,
        })
    }
}

impl Operator for OrderBy {
    fn descriptor(&self) -> TupleDesc {
        self.child.descriptor()
    }

    fn iterator(&self, tid: TransactionId) -> DbResult<TupleIter<'_>> {
        // Materialize and key every tuple up front so the comparator
        // itself cannot fail
        let mut keyed: Vec<(Vec<Value>, Tuple)> = Vec::new();
        for tuple in self.child.iterator(tid)? {
            let tuple = tuple?;
            let key: DbResult<Vec<Value>> = self.keys.iter().map(|e| e.eval(&tuple)).collect();
            keyed.push((key?, tuple));
        }

        // Stable sort: ties keep child order
        keyed.sort_by(|(a, _), (b, _)| {
            for (i, (x, y)) in a.iter().zip(b).enumerate() {
                let ord = x.cmp(y);
                if ord == Ordering::Equal {
                    continue;
                }
                return if self.ascending[i] { ord } else { ord.reverse() };
            }
            Ordering::Equal
        });

        Ok(Box::new(keyed.into_iter().map(|(_, tuple)| Ok(tuple))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::tests::support::{VecScan, int_rows, ints, rows};
    use crate::record::DataType;

    #[test]
    fn test_order_by_arity_mismatch() {
        let child = int_rows("v", &[1]);
        let result = OrderBy::new(
            vec![Expr::field("v", "", DataType::Int)],
            vec![true, false],
            Box::new(child),
        );
        assert!(matches!(result, Err(DbError::IllegalOperation(_))));
    }

    #[test]
    fn test_order_by_ascending() {
        let child = int_rows("v", &[3, 1, 2]);
        let order = OrderBy::new(
            vec![Expr::field("v", "", DataType::Int)],
            vec![true],
            Box::new(child),
        )
        .unwrap();
        assert_eq!(ints(&order), vec![1, 2, 3]);
    }

    #[test]
    fn test_order_by_descending() {
        let child = int_rows("v", &[3, 1, 2]);
        let order = OrderBy::new(
            vec![Expr::field("v", "", DataType::Int)],
            vec![false],
            Box::new(child),
        )
        .unwrap();
        assert_eq!(ints(&order), vec![3, 2, 1]);
    }

    #[test]
    fn test_order_by_composite_keys() {
        let child = VecScan::with_rows(
            vec![("k1", DataType::Int), ("k2", DataType::Int)],
            rows(&[(1, 9), (2, 1), (1, 5), (2, 1)]),
        );
        let order = OrderBy::new(
            vec![
                Expr::field("k1", "", DataType::Int),
                Expr::field("k2", "", DataType::Int),
            ],
            vec![true, false],
            Box::new(child),
        )
        .unwrap();

        let out: Vec<(i64, i64)> = order
            .iterator(TransactionId::new())
            .unwrap()
            .map(|t| {
                let t = t.unwrap();
                match (t.get(0), t.get(1)) {
                    (Some(Value::Int(a)), Some(Value::Int(b))) => (*a, *b),
                    _ => unreachable!(),
                }
            })
            .collect();
        assert_eq!(out, vec![(1, 9), (1, 5), (2, 1), (2, 1)]);
    }

    #[test]
    fn test_order_by_is_stable() {
        // Tuples with equal keys keep their child order: the second field
        // tracks arrival position and is not a sort key
        let child = VecScan::with_rows(
            vec![("k", DataType::Int), ("pos", DataType::Int)],
            rows(&[(1, 0), (0, 1), (1, 2), (0, 3), (1, 4)]),
        );
        let order = OrderBy::new(
            vec![Expr::field("k", "", DataType::Int)],
            vec![true],
            Box::new(child),
        )
        .unwrap();

        let positions: Vec<i64> = order
            .iterator(TransactionId::new())
            .unwrap()
            .map(|t| match t.unwrap().values()[1] {
                Value::Int(v) => v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(positions, vec![1, 3, 0, 2, 4]);
    }
}
