mod agg_state;
mod aggregate;
mod delete;
mod expr;
mod filter;
mod insert;
mod join;
mod limit;
mod order_by;
mod project;
mod scan;


pub use agg_state::{AggState, AvgState, CountState, MaxState, MinState, SumState};
pub use aggregate::Aggregator;
pub use delete::DeleteOp;
pub use expr::{ArithOp, Expr};
pub use filter::Filter;
pub use insert::InsertOp;
pub use join::EqualityJoin;
pub use limit::Limit;
pub use order_by::OrderBy;
pub use project::Project;
pub use scan::SeqScan;

use std::io::Read;

use crate::error::{DbError, DbResult};
use crate::record::{DataType, Tuple, TupleDesc, Value};
use crate::storage::{HeapFile, TransactionId};

/// Stateful pull stream of tuples. Constructed once per query; each call
/// yields the next tuple, `None` at end-of-stream, and an `Err` item is
/// fatal to the stream.
pub type TupleIter<'a> = Box<dyn Iterator<Item = DbResult<Tuple>> + 'a>;

/// A node in a query plan: a result schema plus a pull-based iterator.
///
/// Plans are trees of boxed operators with a sequential scan at each leaf;
/// driving the root's iterator propagates `next` calls down the tree.
pub trait Operator {
    /// Schema of the tuples this operator produces
    fn descriptor(&self) -> TupleDesc;

    /// Open a fresh iterator over this operator's output
    fn iterator(&self, tid: TransactionId) -> DbResult<TupleIter<'_>>;
}

/// Load a comma-separated CSV with a header row into `file`, then sum the
/// integer field named `field_name` over a full scan.
pub fn compute_field_sum<R: Read>(
    file: &HeapFile,
    csv: R,
    field_name: &str,
) -> DbResult<i64> {
    let index = file.descriptor().find_field(field_name, "")?;
    if file.descriptor().fields()[index].data_type != DataType::Int {
        return Err(DbError::TypeMismatch(format!(
            "field {:?} is not an integer",
            field_name
        )));
    }

    file.load_from_csv(csv, true, b',', false)?;

    let mut sum = 0;
    for tuple in file.iterator(TransactionId::new()) {
        let tuple = tuple?;
        if let Some(Value::Int(v)) = tuple.get(index) {
            sum += v;
        }
    }
    Ok(sum)
}
