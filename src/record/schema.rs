use crate::error::{DbError, DbResult};

use super::value::DataType;

/// Field definition with its display name and optional table qualifier
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub qualifier: String,
    pub data_type: DataType,
}

impl FieldDef {
    pub fn new(name: &str, qualifier: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            qualifier: qualifier.to_string(),
            data_type,
        }
    }

    /// Get the on-disk size of this field in bytes
    pub fn size(&self) -> usize {
        self.data_type.size()
    }

    /// Whether a lookup for (name, qualifier) resolves to this field.
    /// An empty probe qualifier matches any qualifier.
    fn matches(&self, name: &str, qualifier: &str) -> bool {
        self.name == name && (qualifier.is_empty() || self.qualifier == qualifier)
    }
}

/// Ordered sequence of field definitions describing a tuple's layout
#[derive(Debug, Clone)]
pub struct TupleDesc {
    fields: Vec<FieldDef>,
}

impl TupleDesc {
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Per-tuple on-disk size: the sum of the field sizes
    pub fn byte_size(&self) -> usize {
        self.fields.iter().map(|f| f.size()).sum()
    }

    /// Concatenate two descriptors, left fields first. Used to build the
    /// schema of joined tuples.
    pub fn merge(&self, other: &TupleDesc) -> TupleDesc {
        let mut fields = self.fields.clone();
        fields.extend(other.fields.iter().cloned());
        TupleDesc::new(fields)
    }

    /// Structural equality: same arity and the same data type at every
    /// position. Names and qualifiers are presentation and are ignored.
    pub fn equals(&self, other: &TupleDesc) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.data_type == b.data_type)
    }

    /// Find the index of the field matching (name, qualifier).
    ///
    /// An empty qualifier matches any field with that name, but is an error
    /// when more than one field carries the name.
    pub fn find_field(&self, name: &str, qualifier: &str) -> DbResult<usize> {
        let mut matched = self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.matches(name, qualifier));

        let (index, _) = matched
            .next()
            .ok_or_else(|| DbError::FieldNotFound(format!("no field named {:?}", name)))?;

        if qualifier.is_empty() && matched.next().is_some() {
            return Err(DbError::IllegalOperation(format!(
                "field name {:?} is ambiguous without a qualifier",
                name
            )));
        }

        Ok(index)
    }
}
