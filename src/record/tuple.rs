use crate::error::{DbError, DbResult};
use crate::storage::PageId;

use super::schema::TupleDesc;
use super::value::Value;

/// Slot identifier within a page
pub type SlotId = usize;

/// Physical identifier for a tuple (page + slot). Issued by the heap page
/// on insert and consumed by the heap file on delete; opaque to everything
/// above the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_no: PageId,
    pub slot: SlotId,
}

impl RecordId {
    pub fn new(page_no: PageId, slot: SlotId) -> Self {
        Self { page_no, slot }
    }
}

/// A single row: a descriptor, its values in descriptor order, and the
/// record id stamped when the tuple is read from or written to storage.
#[derive(Debug, Clone)]
pub struct Tuple {
    desc: TupleDesc,
    values: Vec<Value>,
    rid: Option<RecordId>,
}

impl Tuple {
    pub fn new(desc: TupleDesc, values: Vec<Value>) -> Self {
        Self {
            desc,
            values,
            rid: None,
        }
    }

    /// Zero-field tuple, used to evaluate constant expressions without data
    pub fn empty() -> Self {
        Self::new(TupleDesc::new(Vec::new()), Vec::new())
    }

    pub fn desc(&self) -> &TupleDesc {
        &self.desc
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn rid(&self) -> Option<RecordId> {
        self.rid
    }

    pub fn set_rid(&mut self, rid: Option<RecordId>) {
        self.rid = rid;
    }

    /// Serialize the tuple onto `buf` in descriptor order
    pub fn write_to(&self, buf: &mut Vec<u8>) {
        for value in &self.values {
            value.write_to(buf);
        }
    }

    /// Deserialize a tuple from `data` according to `desc`
    pub fn read_from(data: &[u8], desc: &TupleDesc) -> DbResult<Self> {
        let mut values = Vec::with_capacity(desc.num_fields());
        let mut offset = 0;
        for field in desc.fields() {
            let size = field.size();
            let chunk = data.get(offset..offset + size).ok_or_else(|| {
                DbError::MalformedData(format!(
                    "tuple data truncated: need {} bytes at offset {}, have {}",
                    size,
                    offset,
                    data.len()
                ))
            })?;
            values.push(Value::read_from(chunk, field.data_type)?);
            offset += size;
        }
        Ok(Tuple::new(desc.clone(), values))
    }

    /// Concatenate this tuple with another: merged descriptor, left values
    /// first, record id cleared. Used by the join operator.
    pub fn join(&self, other: &Tuple) -> Tuple {
        let mut values = self.values.clone();
        values.extend(other.values.iter().cloned());
        Tuple::new(self.desc.merge(&other.desc), values)
    }
}

/// Tuples compare by descriptor shape and values; the record id is storage
/// bookkeeping and never part of equality.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.desc.equals(&other.desc) && self.values == other.values
    }
}
