use std::collections::HashSet;

use crate::error::{DbError, DbResult};
use crate::record::{FieldDef, Tuple, TupleDesc, Value};
use crate::storage::TransactionId;

use super::expr::Expr;
use super::{Operator, TupleIter};

/// Evaluates a list of select expressions per child tuple, renaming each
/// output field. With `distinct`, duplicate output rows are dropped.
pub struct Project {
    exprs: Vec<Expr>,
    output_names: Vec<String>,
    distinct: bool,
    child: Box<dyn Operator>,
}

impl Project {
    pub fn new(
        exprs: Vec<Expr>,
        output_names: Vec<String>,
        distinct: bool,
        child: Box<dyn Operator>,
    ) -> DbResult<Self> {
        if exprs.len() != output_names.len() {
            return Err(DbError::IllegalOperation(format!(
                "{} select expressions but {} output names",
                exprs.len(),
                output_names.len()
            )));
        }
        Ok(Self {
            exprs,
            output_names,
            distinct,
            child,
        })
    }
}

impl Operator for Project {
    fn descriptor(&self) -> TupleDesc {
        let fields = self
            .exprs
            .iter()
            .zip(&self.output_names)
            .map(|(expr, name)| {
                let def = expr.result_type();
                FieldDef::new(name, &def.qualifier, def.data_type)
            })
            .collect();
        TupleDesc::new(fields)
    }

    fn iterator(&self, tid: TransactionId) -> DbResult<TupleIter<'_>> {
        Ok(Box::new(ProjectIter {
            op: self,
            desc: self.descriptor(),
            child: self.child.iterator(tid)?,
            seen: self.distinct.then(HashSet::new),
            done: false,
        }))
    }
}

struct ProjectIter<'a> {
    op: &'a Project,
    desc: TupleDesc,
    child: TupleIter<'a>,
    /// Output rows already emitted, present only for DISTINCT
    seen: Option<HashSet<Vec<Value>>>,
    done: bool,
}

impl Iterator for ProjectIter<'_> {
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

            let values: DbResult<Vec<Value>> =
                self.op.exprs.iter().map(|e| e.eval(&tuple)).collect();
            let values = match values {
                Ok(values) => values,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            if let Some(seen) = &mut self.seen
                && !seen.insert(values.clone())
            {
                continue;
            }

            return Some(Ok(Tuple::new(self.desc.clone(), values)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::tests::support::{int_rows, ints};
    use crate::query::ArithOp;
    use crate::record::DataType;

    #[test]
    fn test_project_arity_mismatch() {
        let child = int_rows("v", &[1]);
        let result = Project::new(
            vec![Expr::field("v", "", DataType::Int)],
            vec!["a".to_string(), "b".to_string()],
            false,
            Box::new(child),
        );
        assert!(matches!(result, Err(DbError::IllegalOperation(_))));
    }

    #[test]
    fn test_project_renames_and_computes() {
        let child = int_rows("v", &[1, 2, 3]);
        let project = Project::new(
            vec![Expr::arith(
                ArithOp::Mul,
                Expr::field("v", "", DataType::Int),
                Expr::int_const(10),
            )],
            vec!["scaled".to_string()],
            false,
            Box::new(child),
        )
        .unwrap();

        let desc = project.descriptor();
        assert_eq!(desc.fields()[0].name, "scaled");
        assert_eq!(desc.fields()[0].data_type, DataType::Int);
        assert_eq!(ints(&project), vec![10, 20, 30]);
    }

    #[test]
    fn test_project_distinct() {
        let child = int_rows("v", &[1, 2, 1, 3, 2, 1]);
        let project = Project::new(
            vec![Expr::field("v", "", DataType::Int)],
            vec!["v".to_string()],
            true,
            Box::new(child),
        )
        .unwrap();

        assert_eq!(ints(&project), vec![1, 2, 3]);
    }

    #[test]
    fn test_project_keeps_duplicates_without_distinct() {
        let child = int_rows("v", &[1, 1, 1]);
        let project = Project::new(
            vec![Expr::field("v", "", DataType::Int)],
            vec!["v".to_string()],
            false,
            Box::new(child),
        )
        .unwrap();

        assert_eq!(ints(&project), vec![1, 1, 1]);
    }
}
