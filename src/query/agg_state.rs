use crate::record::{DataType, FieldDef, Predicate, Tuple, TupleDesc, Value};

use super::expr::Expr;

/// Streaming accumulator for one aggregate over one group.
///
/// `add` folds a tuple into the running state, `finalize` renders the
/// state as a one-field tuple, and `copy` clones the accumulator so a
/// template can seed the state vector of a newly seen group. Callers add
/// at least one tuple before finalizing.
pub trait AggState {
    fn add(&mut self, tuple: &Tuple);
    fn finalize(&self) -> Tuple;
    fn descriptor(&self) -> TupleDesc;
    fn copy(&self) -> Box<dyn AggState>;
}

fn int_output_desc(alias: &str) -> TupleDesc {
    TupleDesc::new(vec![FieldDef::new(alias, "", DataType::Int)])
}

/// COUNT: increments on every tuple, even when the expression fails
#[derive(Clone)]
pub struct CountState {
    alias: String,
    count: i64,
}

impl CountState {
    pub fn new(alias: &str) -> Self {
        Self {
            alias: alias.to_string(),
            count: 0,
        }
    }
}

impl AggState for CountState {
    fn add(&mut self, _tuple: &Tuple) {
        self.count += 1;
    }

    fn finalize(&self) -> Tuple {
        Tuple::new(self.descriptor(), vec![Value::Int(self.count)])
    }

    fn descriptor(&self) -> TupleDesc {
        int_output_desc(&self.alias)
    }

    fn copy(&self) -> Box<dyn AggState> {
        Box::new(self.clone())
    }
}

/// SUM over an integer expression; non-integer or failing evaluations are
/// skipped
#[derive(Clone)]
pub struct SumState {
    alias: String,
    expr: Expr,
    sum: i64,
}

impl SumState {
    pub fn new(alias: &str, expr: Expr) -> Self {
        Self {
            alias: alias.to_string(),
            expr,
            sum: 0,
        }
    }
}

impl AggState for SumState {
    fn add(&mut self, tuple: &Tuple) {
        if let Ok(Value::Int(v)) = self.expr.eval(tuple) {
            self.sum += v;
        }
    }

    fn finalize(&self) -> Tuple {
        Tuple::new(self.descriptor(), vec![Value::Int(self.sum)])
    }

    fn descriptor(&self) -> TupleDesc {
        int_output_desc(&self.alias)
    }

    fn copy(&self) -> Box<dyn AggState> {
        Box::new(self.clone())
    }
}

/// AVG over an integer expression, finalized with integer division
#[derive(Clone)]
pub struct AvgState {
    alias: String,
    expr: Expr,
    sum: i64,
    count: i64,
}

impl AvgState {
    pub fn new(alias: &str, expr: Expr) -> Self {
        Self {
            alias: alias.to_string(),
            expr,
            sum: 0,
            count: 0,
        }
    }
}

impl AggState for AvgState {
    fn add(&mut self, tuple: &Tuple) {
        if let Ok(Value::Int(v)) = self.expr.eval(tuple) {
            self.sum += v;
            self.count += 1;
        }
    }

    fn finalize(&self) -> Tuple {
        let avg = if self.count == 0 {
            0
        } else {
            self.sum / self.count
        };
        Tuple::new(self.descriptor(), vec![Value::Int(avg)])
    }

    fn descriptor(&self) -> TupleDesc {
        int_output_desc(&self.alias)
    }

    fn copy(&self) -> Box<dyn AggState> {
        Box::new(self.clone())
    }
}

/// MIN: the first successful evaluation seeds the extreme, later values
/// replace it when strictly smaller
#[derive(Clone)]
pub struct MinState {
    alias: String,
    expr: Expr,
    min: Option<Value>,
}

impl MinState {
    pub fn new(alias: &str, expr: Expr) -> Self {
        Self {
            alias: alias.to_string(),
            expr,
            min: None,
        }
    }
}

impl AggState for MinState {
    fn add(&mut self, tuple: &Tuple) {
        let Ok(value) = self.expr.eval(tuple) else {
            return;
        };
        match &self.min {
            None => self.min = Some(value),
            Some(current) => {
                if value.eval_pred(current, Predicate::Lt).unwrap_or(false) {
                    self.min = Some(value);
                }
            }
        }
    }

    fn finalize(&self) -> Tuple {
        let value = self.min.clone().unwrap_or(Value::Int(0));
        Tuple::new(self.descriptor(), vec![value])
    }

    fn descriptor(&self) -> TupleDesc {
        int_output_desc(&self.alias)
    }

    fn copy(&self) -> Box<dyn AggState> {
        Box::new(self.clone())
    }
}

/// MAX, symmetric with [`MinState`]
#[derive(Clone)]
pub struct MaxState {
    alias: String,
    expr: Expr,
    max: Option<Value>,
}

impl MaxState {
    pub fn new(alias: &str, expr: Expr) -> Self {
        Self {
            alias: alias.to_string(),
            expr,
            max: None,
        }
    }
}

impl AggState for MaxState {
    fn add(&mut self, tuple: &Tuple) {
        let Ok(value) = self.expr.eval(tuple) else {
            return;
        };
        match &self.max {
            None => self.max = Some(value),
            Some(current) => {
                if value.eval_pred(current, Predicate::Gt).unwrap_or(false) {
                    self.max = Some(value);
                }
            }
        }
    }

    fn finalize(&self) -> Tuple {
        let value = self.max.clone().unwrap_or(Value::Int(0));
        Tuple::new(self.descriptor(), vec![value])
    }

    fn descriptor(&self) -> TupleDesc {
        int_output_desc(&self.alias)
    }

    fn copy(&self) -> Box<dyn AggState> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DataType, FieldDef};

    fn int_tuple(v: i64) -> Tuple {
        Tuple::new(
            TupleDesc::new(vec![FieldDef::new("v", "", DataType::Int)]),
            vec![Value::Int(v)],
        )
    }

    fn value_expr() -> Expr {
        Expr::field("v", "", DataType::Int)
    }

    fn feed(state: &mut dyn AggState, values: &[i64]) {
        for &v in values {
            state.add(&int_tuple(v));
        }
    }

    #[test]
    fn test_count() {
        let mut state = CountState::new("n");
        feed(&mut state, &[5, 5, 5]);
        assert_eq!(state.finalize().values(), &[Value::Int(3)]);
        assert_eq!(state.descriptor().fields()[0].name, "n");
    }

    #[test]
    fn test_sum() {
        let mut state = SumState::new("total", value_expr());
        feed(&mut state, &[1, 2, 3, -6]);
        assert_eq!(state.finalize().values(), &[Value::Int(0)]);
    }

    #[test]
    fn test_avg_integer_division() {
        let mut state = AvgState::new("mean", value_expr());
        feed(&mut state, &[1, 2, 4]);
        // floor(7 / 3)
        assert_eq!(state.finalize().values(), &[Value::Int(2)]);
    }

    #[test]
    fn test_min_max() {
        let mut min = MinState::new("lo", value_expr());
        let mut max = MaxState::new("hi", value_expr());
        for v in [3, -1, 7, 0] {
            min.add(&int_tuple(v));
            max.add(&int_tuple(v));
        }
        assert_eq!(min.finalize().values(), &[Value::Int(-1)]);
        assert_eq!(max.finalize().values(), &[Value::Int(7)]);
    }

    #[test]
    fn test_min_on_strings() {
        let desc = TupleDesc::new(vec![FieldDef::new("s", "", DataType::Char)]);
        let mut min = MinState::new("first", Expr::field("s", "", DataType::Char));
        for s in ["pear", "apple", "plum"] {
            min.add(&Tuple::new(desc.clone(), vec![Value::Str(s.to_string())]));
        }
        assert_eq!(
            min.finalize().values(),
            &[Value::Str("apple".to_string())]
        );
    }

    #[test]
    fn test_copy_is_independent() {
        let mut state = CountState::new("n");
        feed(&mut state, &[1, 2]);

        let mut copied = state.copy();
        copied.add(&int_tuple(3));

        assert_eq!(state.finalize().values(), &[Value::Int(2)]);
        assert_eq!(copied.finalize().values(), &[Value::Int(3)]);
    }

    #[test]
    fn test_count_ignores_expression_errors() {
        // Count increments even when the tuple has no such field
        let mut count = CountState::new("n");
        let other = Tuple::new(
            TupleDesc::new(vec![FieldDef::new("w", "", DataType::Int)]),
            vec![Value::Int(1)],
        );
        count.add(&other);
        assert_eq!(count.finalize().values(), &[Value::Int(1)]);

        // Sum skips the same tuple
        let mut sum = SumState::new("s", value_expr());
        sum.add(&other);
        assert_eq!(sum.finalize().values(), &[Value::Int(0)]);
    }
}
