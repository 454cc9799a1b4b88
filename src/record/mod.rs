mod schema;
mod tuple;
mod value;

pub use schema::{FieldDef, TupleDesc};
pub use tuple::{RecordId, SlotId, Tuple};
pub use value::{DataType, Predicate, Value};

pub(crate) use value::fixed_width_prefix;
