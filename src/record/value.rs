use std::cmp::Ordering;

use regex::Regex;

use crate::error::{DbError, DbResult};
use crate::storage::STRING_LENGTH;

/// Represents a column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int,  // 8 bytes, little-endian
    Char, // STRING_LENGTH bytes (fixed width)
}

impl DataType {
    /// Get the on-disk size in bytes for this data type
    pub fn size(&self) -> usize {
        match self {
            DataType::Int => 8,
            DataType::Char => STRING_LENGTH,
        }
    }
}

/// Comparison operator applied between two values of the same type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Eq,
    Ne,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
}

/// Represents a single field value
///
/// The derived `Hash`/`Eq` make a value (or a `Vec<Value>` sequence) usable
/// directly as a hash-map key, which is how joins, DISTINCT, and GROUP BY
/// key their buffers. The derived `Ord` is total across variants so sort
/// comparators never fail; predicate evaluation still rejects mixed-variant
/// comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Int(i64),
    Str(String),
}

impl Value {
    /// Get the data type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int(_) => DataType::Int,
            Value::Str(_) => DataType::Char,
        }
    }

    /// Serialize this value onto the end of `buf`.
    ///
    /// Integers are written as 8 little-endian bytes. Strings are written as
    /// exactly `STRING_LENGTH` bytes: truncated on a char boundary when
    /// overlong, zero-padded when short.
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        match self {
            Value::Int(i) => buf.extend_from_slice(&i.to_le_bytes()),
            Value::Str(s) => {
                let bytes = fixed_width_prefix(s).as_bytes();
                buf.extend_from_slice(bytes);
                buf.resize(buf.len() + STRING_LENGTH - bytes.len(), 0);
            }
        }
    }

    /// Deserialize a value of the given type from `data`
    pub fn read_from(data: &[u8], data_type: DataType) -> DbResult<Self> {
        match data_type {
            DataType::Int => {
                let bytes: [u8; 8] = data.try_into().map_err(|_| {
                    DbError::MalformedData(format!("expected 8 bytes for int, got {}", data.len()))
                })?;
                Ok(Value::Int(i64::from_le_bytes(bytes)))
            }
            DataType::Char => {
                if data.len() != STRING_LENGTH {
                    return Err(DbError::MalformedData(format!(
                        "expected {} bytes for string, got {}",
                        STRING_LENGTH,
                        data.len()
                    )));
                }
                // The first NUL byte terminates the padded string
                let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
                let s = String::from_utf8(data[..end].to_vec())
                    .map_err(|e| DbError::MalformedData(format!("invalid UTF-8: {}", e)))?;
                Ok(Value::Str(s))
            }
        }
    }

    /// Evaluate a comparison predicate against another value.
    ///
    /// Both values must share a variant; mixed-variant comparisons are a
    /// `TypeMismatch`. `Like` applies only to strings and matches SQL
    /// patterns (`%` any run, `_` any single char).
    pub fn eval_pred(&self, other: &Value, pred: Predicate) -> DbResult<bool> {
        if pred == Predicate::Like {
            return match (self, other) {
                (Value::Str(l), Value::Str(r)) => like_match(l, r),
                _ => Err(DbError::TypeMismatch(
                    "LIKE requires string operands".to_string(),
                )),
            };
        }

        let cmp = match (self, other) {
            (Value::Int(l), Value::Int(r)) => l.cmp(r),
            (Value::Str(l), Value::Str(r)) => l.cmp(r),
            (l, r) => {
                return Err(DbError::TypeMismatch(format!(
                    "cannot compare {:?} with {:?}",
                    l, r
                )));
            }
        };
        Ok(ordering_holds(pred, cmp))
    }
}

/// Whether an ordering predicate accepts the given comparison result.
/// LIKE is not an ordering predicate; callers route it to the pattern
/// matcher first.
fn ordering_holds(pred: Predicate, cmp: Ordering) -> bool {
    match pred {
        Predicate::Eq => cmp == Ordering::Equal,
        Predicate::Ne => cmp != Ordering::Equal,
        Predicate::Lt => cmp == Ordering::Less,
        Predicate::LtEq => cmp != Ordering::Greater,
        Predicate::Gt => cmp == Ordering::Greater,
        Predicate::GtEq => cmp != Ordering::Less,
        Predicate::Like => false,
    }
}

/// Largest prefix of `s` that fits the fixed string width without splitting
/// a character
pub(crate) fn fixed_width_prefix(s: &str) -> &str {
    if s.len() <= STRING_LENGTH {
        return s;
    }
    let mut end = STRING_LENGTH;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn like_match(value: &str, pattern: &str) -> DbResult<bool> {
    let regex = Regex::new(&like_pattern_to_regex(pattern))
        .map_err(|e| DbError::MalformedData(format!("invalid LIKE pattern: {}", e)))?;
    Ok(regex.is_match(value))
}

fn like_pattern_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() * 2 + 2);
    regex.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '\\' => {
                regex.push('\\');
                regex.push(ch);
            }
            _ => regex.push(ch),
        }
    }
    regex.push('$');
    regex
}
