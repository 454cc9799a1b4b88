use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::error::DbResult;
use crate::record::{Tuple, TupleDesc, Value};
use crate::storage::TransactionId;

use super::agg_state::AggState;
use super::expr::Expr;
use super::{Operator, TupleIter};

/// Blocking aggregation, optionally grouped.
///
/// The supplied states act as templates: each newly seen group clones the
/// whole vector via `AggState::copy` and folds its tuples in. Output rows
/// are the group-by values followed by each state's finalized value, one
/// row per group in first-seen order. The ungrouped form always produces
/// exactly one row.
pub struct Aggregator {
    group_by: Vec<Expr>,
    templates: Vec<Box<dyn AggState>>,
    child: Box<dyn Operator>,
}

impl Aggregator {
    /// Ungrouped aggregation over the whole child stream
    pub fn new(templates: Vec<Box<dyn AggState>>, child: Box<dyn Operator>) -> Self {
        Self {
            group_by: Vec::new(),
            templates,
            child,
        }
    }

    /// One aggregate row per distinct group-by value sequence
    pub fn new_grouped(
        group_by: Vec<Expr>,
        templates: Vec<Box<dyn AggState>>,
        child: Box<dyn Operator>,
    ) -> Self {
        Self {
            group_by,
            templates,
            child,
        }
    }
}

impl Operator for Aggregator {
    fn descriptor(&self) -> TupleDesc {
        let mut desc = TupleDesc::new(
            self.group_by.iter().map(|e| e.result_type()).collect(),
        );
        for template in &self.templates {
            desc = desc.merge(&template.descriptor());
        }
        desc
    }

    fn iterator(&self, tid: TransactionId) -> DbResult<TupleIter<'_>> {
        // key → index into `groups`, which preserves first-seen order
        let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<Value>, Vec<Box<dyn AggState>>)> = Vec::new();

        if self.group_by.is_empty() {
            // The ungrouped form emits a row even for an empty child
            groups.push((Vec::new(), self.templates.iter().map(|t| t.copy()).collect()));
            index.insert(Vec::new(), 0);
        }

        for tuple in self.child.iterator(tid)? {
            let tuple = tuple?;
            let key: DbResult<Vec<Value>> =
                self.group_by.iter().map(|e| e.eval(&tuple)).collect();
            let key = key?;

            let slot = match index.entry(key) {
                Entry::Occupied(entry) => *entry.get(),
                Entry::Vacant(entry) => {
                    groups.push((
                        entry.key().clone(),
                        self.templates.iter().map(|t| t.copy()).collect(),
                    ));
                    let slot = groups.len() - 1;
                    entry.insert(slot);
                    slot
                }
            };

            for state in &mut groups[slot].1 {
                state.add(&tuple);
            }
        }

        let desc = self.descriptor();
        let rows: Vec<DbResult<Tuple>> = groups
            .into_iter()
            .map(|(key, states)| {
                let mut values = key;
                for state in &states {
                    values.extend(state.finalize().values().iter().cloned());
                }
                Ok(Tuple::new(desc.clone(), values))
            })
            .collect();

        Ok(Box::new(rows.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::agg_state::{AvgState, CountState, MaxState, MinState, SumState};
    use crate::query::tests::support::{VecScan, int_rows, rows};
    use crate::record::DataType;

    fn value_expr() -> Expr {
        Expr::field("v", "", DataType::Int)
    }

    fn collect(agg: &Aggregator) -> Vec<Vec<Value>> {
        agg.iterator(TransactionId::new())
            .unwrap()
            .map(|t| t.unwrap().values().to_vec())
            .collect()
    }

    #[test]
    fn test_ungrouped_aggregates() {
        let child = int_rows("v", &[10, 20, 30]);
        let agg = Aggregator::new(
            vec![
                Box::new(CountState::new("n")),
                Box::new(SumState::new("total", value_expr())),
                Box::new(AvgState::new("mean", value_expr())),
                Box::new(MinState::new("lo", value_expr())),
                Box::new(MaxState::new("hi", value_expr())),
            ],
            Box::new(child),
        );

        let desc = agg.descriptor();
        assert_eq!(desc.num_fields(), 5);
        assert_eq!(desc.fields()[0].name, "n");
        assert_eq!(desc.fields()[4].name, "hi");

        assert_eq!(
            collect(&agg),
            vec![vec![
                Value::Int(3),
                Value::Int(60),
                Value::Int(20),
                Value::Int(10),
                Value::Int(30),
            ]]
        );
    }

    #[test]
    fn test_ungrouped_empty_child_still_emits() {
        let child = int_rows("v", &[]);
        let agg = Aggregator::new(vec![Box::new(CountState::new("n"))], Box::new(child));
        assert_eq!(collect(&agg), vec![vec![Value::Int(0)]]);
    }

    #[test]
    fn test_grouped_count_and_avg() {
        let child = VecScan::with_rows(
            vec![("g", DataType::Int), ("v", DataType::Int)],
            rows(&[(1, 10), (1, 20), (2, 5), (2, 15), (2, 25)]),
        );
        let agg = Aggregator::new_grouped(
            vec![Expr::field("g", "", DataType::Int)],
            vec![
                Box::new(CountState::new("n")),
                Box::new(AvgState::new("mean", value_expr())),
            ],
            Box::new(child),
        );

        // Groups come out in first-seen order
        assert_eq!(
            collect(&agg),
            vec![
                vec![Value::Int(1), Value::Int(2), Value::Int(15)],
                vec![Value::Int(2), Value::Int(3), Value::Int(15)],
            ]
        );
    }

    #[test]
    fn test_grouped_empty_child_emits_nothing() {
        let child = VecScan::with_rows(
            vec![("g", DataType::Int), ("v", DataType::Int)],
            Vec::new(),
        );
        let agg = Aggregator::new_grouped(
            vec![Expr::field("g", "", DataType::Int)],
            vec![Box::new(CountState::new("n"))],
            Box::new(child),
        );
        assert!(collect(&agg).is_empty());
    }

    #[test]
    fn test_grouped_descriptor_layout() {
        let child = VecScan::with_rows(
            vec![("g", DataType::Int), ("v", DataType::Int)],
            Vec::new(),
        );
        let agg = Aggregator::new_grouped(
            vec![Expr::field("g", "", DataType::Int)],
            vec![Box::new(SumState::new("total", value_expr()))],
            Box::new(child),
        );

        let desc = agg.descriptor();
        assert_eq!(desc.num_fields(), 2);
        assert_eq!(desc.fields()[0].name, "g");
        assert_eq!(desc.fields()[1].name, "total");
    }
}
