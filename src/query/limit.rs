use crate::error::{DbError, DbResult};
use crate::record::{Tuple, TupleDesc, Value};
use crate::storage::TransactionId;

use super::expr::Expr;
use super::{Operator, TupleIter};

/// Emits the first `limit` child tuples. The limit expression is
/// evaluated once at construction, against the empty tuple.
pub struct Limit {
    limit: u64,
    child: Box<dyn Operator>,
}

impl Limit {
    pub fn new(limit: Expr, child: Box<dyn Operator>) -> DbResult<Self> {
        let limit = match limit.eval(&Tuple::empty())? {
            Value::Int(n) if n >= 0 => n as u64,
            Value::Int(n) => {
                return Err(DbError::IllegalOperation(format!(
                    "negative limit {}",
                    n
                )));
            }
            other => {
                return Err(DbError::TypeMismatch(format!(
                    "limit must be an integer, got {:?}",
                    other
                )));
            }
        };
        Ok(Self { limit, child })
    }
}

impl Operator for Limit {
    fn descriptor(&self) -> TupleDesc {
        self.child.descriptor()
    }

    fn iterator(&self, tid: TransactionId) -> DbResult<TupleIter<'_>> {
        Ok(Box::new(
            self.child.iterator(tid)?.take(self.limit as usize),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::tests::support::{int_rows, ints};

    #[test]
    fn test_limit_truncates() {
        let child = int_rows("v", &[1, 2, 3, 4, 5]);
        let limit = Limit::new(Expr::int_const(3), Box::new(child)).unwrap();
        assert_eq!(ints(&limit), vec![1, 2, 3]);
    }

    #[test]
    fn test_limit_beyond_child_size() {
        let child = int_rows("v", &[1, 2]);
        let limit = Limit::new(Expr::int_const(10), Box::new(child)).unwrap();
        assert_eq!(ints(&limit), vec![1, 2]);
    }

    #[test]
    fn test_limit_zero() {
        let child = int_rows("v", &[1, 2]);
        let limit = Limit::new(Expr::int_const(0), Box::new(child)).unwrap();
        assert_eq!(ints(&limit), Vec::<i64>::new());
    }

    #[test]
    fn test_limit_rejects_string() {
        let child = int_rows("v", &[1]);
        let result = Limit::new(Expr::str_const("five"), Box::new(child));
        assert!(matches!(result, Err(DbError::TypeMismatch(_))));
    }

    #[test]
    fn test_limit_rejects_negative() {
        let child = int_rows("v", &[1]);
        let result = Limit::new(Expr::int_const(-1), Box::new(child));
        assert!(matches!(result, Err(DbError::IllegalOperation(_))));
    }
}
