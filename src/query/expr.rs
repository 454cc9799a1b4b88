use crate::error::{DbError, DbResult};
use crate::record::{DataType, FieldDef, Tuple, Value};

/// Integer arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// An expression evaluated against one tuple at a time.
///
/// Field references resolve by (name, qualifier) against the input tuple's
/// descriptor, or by position. Arithmetic is defined over integer operands
/// only.
#[derive(Debug, Clone)]
pub enum Expr {
    Const(Value),
    Field(FieldDef),
    Position(usize, FieldDef),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn int_const(v: i64) -> Expr {
        Expr::Const(Value::Int(v))
    }

    pub fn str_const(s: &str) -> Expr {
        Expr::Const(Value::Str(s.to_string()))
    }

    pub fn field(name: &str, qualifier: &str, data_type: DataType) -> Expr {
        Expr::Field(FieldDef::new(name, qualifier, data_type))
    }

    pub fn arith(op: ArithOp, left: Expr, right: Expr) -> Expr {
        Expr::Arith(op, Box::new(left), Box::new(right))
    }

    /// Evaluate against a tuple
    pub fn eval(&self, tuple: &Tuple) -> DbResult<Value> {
        match self {
            Expr::Const(value) => Ok(value.clone()),
            Expr::Field(def) => {
                let index = tuple.desc().find_field(&def.name, &def.qualifier)?;
                Ok(tuple.values()[index].clone())
            }
            Expr::Position(index, _) => tuple
                .get(*index)
                .cloned()
                .ok_or_else(|| DbError::FieldNotFound(format!("no field at position {}", index))),
            Expr::Arith(op, left, right) => {
                let (l, r) = match (left.eval(tuple)?, right.eval(tuple)?) {
                    (Value::Int(l), Value::Int(r)) => (l, r),
                    _ => {
                        return Err(DbError::TypeMismatch(
                            "arithmetic requires integer operands".to_string(),
                        ));
                    }
                };
                let result = match op {
                    ArithOp::Add => l.wrapping_add(r),
                    ArithOp::Sub => l.wrapping_sub(r),
                    ArithOp::Mul => l.wrapping_mul(r),
                    ArithOp::Div => {
                        if r == 0 {
                            return Err(DbError::IllegalOperation(
                                "division by zero".to_string(),
                            ));
                        }
                        l / r
                    }
                };
                Ok(Value::Int(result))
            }
        }
    }

    /// The field this expression contributes to a result descriptor,
    /// computed without data
    pub fn result_type(&self) -> FieldDef {
        match self {
            Expr::Const(value) => FieldDef::new("const", "", value.data_type()),
            Expr::Field(def) => def.clone(),
            Expr::Position(_, def) => def.clone(),
            Expr::Arith(..) => FieldDef::new("expr", "", DataType::Int),
        }
    }
}
