//! Typed column containers the row parser writes into.

use crate::{data::Value, schema::ColumnType};

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    datatype: ColumnType,
    values: Vec<Option<Value>>,
}

impl Column {
    pub fn new(datatype: ColumnType) -> Self {
        Self {
            datatype,
            values: Vec::new(),
        }
    }

    pub fn datatype(&self) -> &ColumnType {
        &self.datatype
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(Some(value));
    }

    pub fn push_null(&mut self) {
        self.values.push(None);
    }

    /// Appends the default of the column type (NULL for nullable types).
    pub fn insert_default(&mut self) {
        self.values.push(self.datatype.default_value());
    }

    pub fn get(&self, row: usize) -> Option<&Value> {
        self.values.get(row).and_then(|value| value.as_ref())
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    /// Drops rows past `len`; used to discard a partially parsed row.
    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    pub fn append(&mut self, other: &mut Column) {
        self.values.append(&mut other.values);
    }
}

pub fn columns_for(types: &[ColumnType]) -> Vec<Column> {
    types.iter().cloned().map(Column::new).collect()
}
